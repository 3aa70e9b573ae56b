//! Control socket: server (during `syncq run`) and client (every other command).
//!
//! Protocol: one request line, one JSON response line.
//!
//! ```text
//! enqueue <type> <priority> <max_retries|-> <payload json>
//! status [id]
//! list [status=<s>] [type=<t>]
//! pause | resume
//! cancel <id>
//! ```
//!
//! Responses are `{"ok": true, ...}` or `{"ok": false, "error": "..."}`.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::path::Path;
use syncq_core::{EnqueueOptions, JobData, JobEngine, JobId, JobStatus, JobType};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    Enqueue {
        job_type: JobType,
        priority: i32,
        max_retries: Option<u32>,
        payload: JobData,
    },
    Status {
        id: Option<JobId>,
    },
    List {
        status: Option<JobStatus>,
        job_type: Option<JobType>,
    },
    Pause,
    Resume,
    Cancel {
        id: JobId,
    },
}

impl ControlRequest {
    /// Encode as one protocol line (without the trailing newline).
    pub fn to_line(&self) -> Result<String> {
        Ok(match self {
            ControlRequest::Enqueue {
                job_type,
                priority,
                max_retries,
                payload,
            } => {
                let retries = max_retries
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let payload = serde_json::to_string(payload)?;
                format!("enqueue {job_type} {priority} {retries} {payload}")
            }
            ControlRequest::Status { id: None } => "status".to_string(),
            ControlRequest::Status { id: Some(id) } => format!("status {id}"),
            ControlRequest::List { status, job_type } => {
                let mut line = "list".to_string();
                if let Some(s) = status {
                    line.push_str(&format!(" status={s}"));
                }
                if let Some(t) = job_type {
                    line.push_str(&format!(" type={t}"));
                }
                line
            }
            ControlRequest::Pause => "pause".to_string(),
            ControlRequest::Resume => "resume".to_string(),
            ControlRequest::Cancel { id } => format!("cancel {id}"),
        })
    }

    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (cmd, rest) = next_token(line).unwrap_or((line, ""));
        let rest = rest.trim();
        match cmd {
            "enqueue" => parse_enqueue(rest),
            "status" if rest.is_empty() => Ok(ControlRequest::Status { id: None }),
            "status" => Ok(ControlRequest::Status {
                id: Some(JobId::from(rest)),
            }),
            "list" => {
                let mut status = None;
                let mut job_type = None;
                for filter in rest.split_whitespace() {
                    match filter.split_once('=') {
                        Some(("status", v)) => status = Some(v.parse::<JobStatus>()?),
                        Some(("type", v)) => job_type = Some(v.parse::<JobType>()?),
                        _ => bail!("bad list filter: {filter}"),
                    }
                }
                Ok(ControlRequest::List { status, job_type })
            }
            "pause" => Ok(ControlRequest::Pause),
            "resume" => Ok(ControlRequest::Resume),
            "cancel" if !rest.is_empty() => Ok(ControlRequest::Cancel {
                id: JobId::from(rest),
            }),
            _ => bail!("unknown command: {line}"),
        }
    }
}

/// Split off the first whitespace-delimited token; the remainder keeps its
/// inner spacing.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Some(s.split_at(s.find(char::is_whitespace).unwrap_or(s.len())))
}

fn parse_enqueue(rest: &str) -> Result<ControlRequest> {
    const USAGE: &str = "usage: enqueue <type> <priority> <max_retries|-> [payload]";
    let (job_type, rest) = next_token(rest).context(USAGE)?;
    let (priority, rest) = next_token(rest).context(USAGE)?;
    let (retries, payload) = next_token(rest).context(USAGE)?;
    let job_type = job_type.parse::<JobType>()?;
    let priority = priority.parse::<i32>().context("priority")?;
    let max_retries = match retries {
        "-" => None,
        n => Some(n.parse::<u32>().context("max_retries")?),
    };
    let payload = match payload.trim() {
        "" => JobData::new(),
        json => serde_json::from_str(json).context("payload must be a JSON object")?,
    };
    Ok(ControlRequest::Enqueue {
        job_type,
        priority,
        max_retries,
        payload,
    })
}

fn error_response(msg: impl std::fmt::Display) -> Value {
    json!({ "ok": false, "error": msg.to_string() })
}

/// Apply one request to the engine and build the response.
pub fn dispatch(engine: &JobEngine, request: ControlRequest) -> Value {
    match request {
        ControlRequest::Enqueue {
            job_type,
            priority,
            max_retries,
            payload,
        } => {
            let mut opts = EnqueueOptions::priority(priority);
            opts.max_retries = max_retries;
            match engine.enqueue(job_type, payload, opts) {
                Ok(id) => json!({ "ok": true, "id": id }),
                Err(e) => error_response(e),
            }
        }
        ControlRequest::Status { id: None } => json!({
            "ok": true,
            "paused": engine.is_paused(),
            "running": engine.is_running(),
            "stats": engine.get_stats(),
        }),
        ControlRequest::Status { id: Some(id) } => match engine.get_job(&id) {
            Some(job) => json!({ "ok": true, "job": job }),
            None => error_response(format!("no such job: {id}")),
        },
        ControlRequest::List { status, job_type } => {
            json!({ "ok": true, "jobs": engine.list_jobs(status, job_type) })
        }
        ControlRequest::Pause => {
            engine.pause();
            json!({ "ok": true, "paused": true })
        }
        ControlRequest::Resume => {
            engine.resume();
            json!({ "ok": true, "paused": false })
        }
        ControlRequest::Cancel { id } => {
            let known = engine.get_job(&id).is_some();
            if !known {
                return error_response(format!("no such job: {id}"));
            }
            let cancelled = engine.cancel(&id);
            json!({ "ok": true, "cancelled": cancelled, "signalled": !cancelled })
        }
    }
}

/// Spawns a task that serves control requests on `path` until the task is aborted.
pub fn spawn_control_listener(
    engine: JobEngine,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    // A stale socket from a crashed run blocks bind.
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&engine, stream).await {
                            tracing::debug!("control connection: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(engine: &JobEngine, stream: UnixStream) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match ControlRequest::parse(&line) {
            Ok(request) => {
                tracing::debug!(request = %line.trim(), "control request");
                dispatch(engine, request)
            }
            Err(e) => error_response(format!("{e:#}")),
        };
        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        write.write_all(out.as_bytes()).await?;
    }
    Ok(())
}

/// Send one request and return the `ok: true` response body.
pub async fn send_request(socket_path: &Path, request: &ControlRequest) -> Result<Value> {
    let stream = UnixStream::connect(socket_path).await.with_context(|| {
        format!(
            "no running engine at {} (start one with `syncq run`)",
            socket_path.display()
        )
    })?;
    let (read, mut write) = stream.into_split();
    let mut line = request.to_line()?;
    line.push('\n');
    write.write_all(line.as_bytes()).await?;

    let mut lines = BufReader::new(read).lines();
    let Some(reply) = lines.next_line().await? else {
        bail!("control socket closed without a reply");
    };
    let response: Value = serde_json::from_str(&reply).context("parse control reply")?;
    if response.get("ok").and_then(Value::as_bool) != Some(true) {
        let msg = response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        bail!("{msg}");
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncq_core::job_data;

    #[test]
    fn parse_enqueue_with_payload() {
        let req = ControlRequest::parse(r#"enqueue library_scan 5 - {"path": "/music lib"}"#).unwrap();
        assert_eq!(
            req,
            ControlRequest::Enqueue {
                job_type: JobType::LibraryScan,
                priority: 5,
                max_retries: None,
                payload: job_data(json!({ "path": "/music lib" })),
            }
        );
    }

    #[test]
    fn enqueue_tolerates_repeated_whitespace() {
        let req = ControlRequest::parse("enqueue  download   5\t-   {\"query\": \"a  b\"}").unwrap();
        assert_eq!(
            req,
            ControlRequest::Enqueue {
                job_type: JobType::Download,
                priority: 5,
                max_retries: None,
                payload: job_data(json!({ "query": "a  b" })),
            }
        );
        assert!(matches!(
            ControlRequest::parse("enqueue download  5  2").unwrap(),
            ControlRequest::Enqueue { max_retries: Some(2), .. }
        ));
    }

    #[test]
    fn enqueue_line_parses_back() {
        let req = ControlRequest::Enqueue {
            job_type: JobType::Download,
            priority: -2,
            max_retries: Some(0),
            payload: job_data(json!({ "query": "a b c" })),
        };
        assert_eq!(ControlRequest::parse(&req.to_line().unwrap()).unwrap(), req);
    }

    #[test]
    fn parse_list_filters() {
        assert_eq!(
            ControlRequest::parse("list status=failed type=token_refresh").unwrap(),
            ControlRequest::List {
                status: Some(JobStatus::Failed),
                job_type: Some(JobType::TokenRefresh),
            }
        );
        assert!(ControlRequest::parse("list colour=red").is_err());
        assert!(ControlRequest::parse("list status=sleeping").is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ControlRequest::parse("explode").is_err());
        assert!(ControlRequest::parse("cancel").is_err());
        assert!(ControlRequest::parse("enqueue download").is_err());
        assert!(ControlRequest::parse("enqueue download x -").is_err());
        assert!(ControlRequest::parse("enqueue download 0 - [1,2]").is_err());
    }

    #[tokio::test]
    async fn dispatch_enqueue_status_cancel() {
        let engine = JobEngine::default();
        let reply = dispatch(
            &engine,
            ControlRequest::Enqueue {
                job_type: JobType::MetadataEnrichment,
                priority: 1,
                max_retries: Some(2),
                payload: JobData::new(),
            },
        );
        assert_eq!(reply["ok"], true);
        let id = JobId::from(reply["id"].as_str().unwrap());

        let status = dispatch(&engine, ControlRequest::Status { id: Some(id.clone()) });
        assert_eq!(status["job"]["status"], "pending");
        assert_eq!(status["job"]["max_retries"], 2);

        let cancel = dispatch(&engine, ControlRequest::Cancel { id });
        assert_eq!(cancel["cancelled"], true);

        let missing = dispatch(&engine, ControlRequest::Cancel { id: JobId::from("nope") });
        assert_eq!(missing["ok"], false);
    }

    #[tokio::test]
    async fn socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let engine = JobEngine::default();
        let server = spawn_control_listener(engine.clone(), &path).unwrap();

        let reply = send_request(&path, &ControlRequest::Pause).await.unwrap();
        assert_eq!(reply["paused"], true);
        assert!(engine.is_paused());

        let stats = send_request(&path, &ControlRequest::Status { id: None }).await.unwrap();
        assert_eq!(stats["paused"], true);
        assert_eq!(stats["stats"]["total"], 0);

        let err = send_request(&path, &ControlRequest::Status { id: Some(JobId::from("x")) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such job"));
        server.abort();
    }

    #[tokio::test]
    async fn client_reports_missing_engine() {
        let dir = tempfile::tempdir().unwrap();
        let err = send_request(&dir.path().join("absent.sock"), &ControlRequest::Resume)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no running engine"));
    }
}
