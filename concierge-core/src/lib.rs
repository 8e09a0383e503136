pub mod intent;
pub mod inventory;
pub mod nlu;
pub mod prompts;
pub mod reservation;

pub use intent::{classify, Intent};
pub use inventory::{InventoryClient, ScheduleQuery, ScheduleRecord};
pub use nlu::{parse_nlu_reply, NluClient, NluReply, NluRequest, NluTask};
pub use reservation::{ContactClient, ReservationClient, ReservationRecord, ReservationRequest};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Malformed collaborator reply: {0}")]
    MalformedReply(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Failure of any external collaborator call.
///
/// Every collaborator method returns this instead of a boxed error so callers
/// have to turn failures into local outcomes explicitly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
    #[error("{service} did not answer within {millis}ms")]
    Timeout {
        service: &'static str,
        millis: u64,
    },
    #[error("{service} rejected the request ({status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} returned an unexpected response: {detail}")]
    UnexpectedResponse {
        service: &'static str,
        detail: String,
    },
}

impl CollaboratorError {
    pub fn service(&self) -> &'static str {
        match self {
            CollaboratorError::Unavailable { service, .. }
            | CollaboratorError::Timeout { service, .. }
            | CollaboratorError::Rejected { service, .. }
            | CollaboratorError::UnexpectedResponse { service, .. } => service,
        }
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;
