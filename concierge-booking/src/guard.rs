use concierge_core::{parse_nlu_reply, CollaboratorError, CollaboratorResult, NluClient, NluReply, NluRequest};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs a collaborator call under a deadline. An elapsed deadline is
/// reported as [`CollaboratorError::Timeout`] and handled like any failure.
pub async fn with_timeout<T, F>(service: &'static str, limit: Duration, call: F) -> CollaboratorResult<T>
where
    F: Future<Output = CollaboratorResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(service, millis = limit.as_millis() as u64, "collaborator call timed out");
            Err(CollaboratorError::Timeout {
                service,
                millis: limit.as_millis() as u64,
            })
        }
    }
}

/// Result of asking the NLU collaborator for structured fields.
#[derive(Debug, Clone)]
pub enum Extraction {
    Parsed(NluReply),
    /// The collaborator answered but not in the agreed shape; carries the raw text.
    Malformed(String),
    Failed(CollaboratorError),
}

pub async fn extract(nlu: &dyn NluClient, request: &NluRequest, limit: Duration) -> Extraction {
    match with_timeout("nlu", limit, nlu.complete(request)).await {
        Ok(raw) => match parse_nlu_reply(&raw) {
            Ok(reply) => {
                debug!(task = ?request.task, fields = reply.fields.len(), "nlu reply parsed");
                Extraction::Parsed(reply)
            }
            Err(e) => {
                debug!(task = ?request.task, error = %e, "nlu reply was not structured");
                Extraction::Malformed(raw)
            }
        },
        Err(e) => {
            warn!(task = ?request.task, error = %e, "nlu call failed");
            Extraction::Failed(e)
        }
    }
}
