//! Handlers that announce when they start and block until the test releases them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use syncq_core::{handler_fn, HandlerError, JobContext, JobData, JobHandler};
use tokio::sync::{mpsc, oneshot};

use super::WAIT;

/// Start events plus per-job release switches, keyed by the payload's `name`.
pub struct Gate {
    started: mpsc::UnboundedReceiver<String>,
    releases: Arc<Mutex<HashMap<String, oneshot::Receiver<()>>>>,
    senders: HashMap<String, oneshot::Sender<()>>,
    started_tx: mpsc::UnboundedSender<String>,
}

impl Gate {
    pub fn new() -> Self {
        let (started_tx, started) = mpsc::unbounded_channel();
        Self {
            started,
            releases: Arc::new(Mutex::new(HashMap::new())),
            senders: HashMap::new(),
            started_tx,
        }
    }

    /// Arm a release switch for the job named `name`. Must be called before
    /// that job can start.
    pub fn arm(&mut self, name: &str) {
        let (tx, rx) = oneshot::channel();
        self.releases.lock().unwrap().insert(name.to_string(), rx);
        self.senders.insert(name.to_string(), tx);
    }

    /// Handler that reports its start and waits for `release(name)`.
    pub fn handler(&self) -> impl JobHandler {
        let releases = Arc::clone(&self.releases);
        let started = self.started_tx.clone();
        handler_fn(move |ctx: JobContext| {
            let releases = Arc::clone(&releases);
            let started = started.clone();
            async move {
                let name = ctx.payload_str("name")?.to_string();
                let release = releases.lock().unwrap().remove(&name);
                let _ = started.send(name.clone());
                if let Some(release) = release {
                    let _ = release.await;
                }
                Ok::<JobData, HandlerError>(JobData::new())
            }
        })
    }

    /// Next job name to start; panics if nothing starts in time.
    pub async fn next_started(&mut self) -> String {
        tokio::time::timeout(WAIT, self.started.recv())
            .await
            .expect("timed out waiting for a job to start")
            .expect("gate channel closed")
    }

    /// Panics if a job started that has not been taken with `next_started`.
    pub fn assert_nothing_started(&mut self) {
        if let Ok(name) = self.started.try_recv() {
            panic!("unexpected start of {name}");
        }
    }

    pub fn release(&mut self, name: &str) {
        if let Some(tx) = self.senders.remove(name) {
            let _ = tx.send(());
        }
    }

    pub fn release_all(&mut self) {
        for (_, tx) in self.senders.drain() {
            let _ = tx.send(());
        }
    }
}
