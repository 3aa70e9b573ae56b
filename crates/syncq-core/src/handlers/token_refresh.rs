//! Token refresh handler. Fails (and so retries) while no valid token can be
//! obtained. The token itself never lands in the job result.

use std::sync::Arc;

use serde_json::json;

use crate::engine::{HandlerFuture, JobContext, JobHandler};
use crate::error::HandlerError;
use crate::job::job_data;

use super::TokenManager;

pub struct TokenRefreshHandler<T> {
    tokens: Arc<T>,
}

impl<T: TokenManager> TokenRefreshHandler<T> {
    pub fn new(tokens: Arc<T>) -> Self {
        Self { tokens }
    }
}

impl<T: TokenManager> JobHandler for TokenRefreshHandler<T> {
    fn handle(&self, _ctx: JobContext) -> HandlerFuture {
        let tokens = Arc::clone(&self.tokens);
        Box::pin(async move {
            match tokens.get_valid_token().await {
                Some(_) => Ok(job_data(json!({ "token_valid": true }))),
                None => Err(HandlerError::failed("no valid access token available")),
            }
        })
    }
}
