//! HTTP/JSON job queue

use eco_protocol::{CompileErrorReport, ErrorReason, ErrorReport, Job, ReadyReport, PACKAGES_PATH};
use serde::Serialize;

use super::{Acknowledgement, JobQueue, QueueError};
use crate::http_client::{self, MAX_API_RESPONSE_BYTES};

/// Job queue reached over HTTP
///
/// - `GET  {api_root}/packages/nextjob`
/// - `POST {api_root}/packages/{seq}/error`
/// - `POST {api_root}/packages/{seq}/ready`
#[derive(Debug, Clone)]
pub struct HttpJobQueue {
    api_root: String,
}

impl HttpJobQueue {
    pub fn new(api_root: &str) -> Self {
        Self {
            api_root: api_root.trim_end_matches('/').to_string(),
        }
    }

    pub fn next_job_url(&self) -> String {
        format!("{}/{}/nextjob", self.api_root, PACKAGES_PATH)
    }

    pub fn error_url(&self, seq: u64) -> String {
        format!("{}/{}/{}/error", self.api_root, PACKAGES_PATH, seq)
    }

    pub fn ready_url(&self, seq: u64) -> String {
        format!("{}/{}/{}/ready", self.api_root, PACKAGES_PATH, seq)
    }

    fn post(&self, url: &str, body: &impl Serialize) -> Result<Acknowledgement, QueueError> {
        match http_client::agent().post(url).send_json(body) {
            Ok(_) => Ok(Acknowledgement::Accepted),
            Err(ureq::Error::Status(status, response)) => {
                let body = read_body(response);
                if status == 500 {
                    Err(QueueError::Server { status, body })
                } else {
                    Ok(Acknowledgement::Rejected { status, body })
                }
            }
            Err(err) => Err(QueueError::Transport(err.to_string())),
        }
    }
}

impl JobQueue for HttpJobQueue {
    fn next_job(&self) -> Result<Option<Job>, QueueError> {
        let response = match http_client::agent().get(&self.next_job_url()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                tracing::debug!(status, "no job available");
                return Ok(None);
            }
            Err(err) => return Err(QueueError::Transport(err.to_string())),
        };

        // 2xx other than 200 carries no job
        if response.status() != 200 {
            tracing::debug!(status = response.status(), "no job available");
            return Ok(None);
        }

        let bytes = http_client::read_response_bytes(response, MAX_API_RESPONSE_BYTES)
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        let job = serde_json::from_slice(&bytes).map_err(|e| QueueError::Decode(e.to_string()))?;
        Ok(Some(job))
    }

    fn report_error(&self, seq: u64, reason: ErrorReason) -> Result<Acknowledgement, QueueError> {
        self.post(&self.error_url(seq), &ErrorReport::new(reason))
    }

    fn report_compile_error(
        &self,
        seq: u64,
        report: &CompileErrorReport,
    ) -> Result<Acknowledgement, QueueError> {
        self.post(&self.error_url(seq), report)
    }

    fn report_ready(&self, seq: u64, report: &ReadyReport) -> Result<Acknowledgement, QueueError> {
        self.post(&self.ready_url(seq), report)
    }
}

fn read_body(response: ureq::Response) -> String {
    http_client::read_response_bytes(response, MAX_API_RESPONSE_BYTES)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
