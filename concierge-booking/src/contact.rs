use concierge_core::{prompts, NluClient, NluReply, NluRequest, NluTask};
use concierge_shared::{ContactField, ContactInfo};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::guard::{extract, Extraction};

#[derive(Debug, Clone, Serialize)]
pub struct ContactTurn {
    pub contact: ContactInfo,
    pub complete: bool,
    pub message: String,
}

/// Fills in checkout contact details. Holds no state of its own; the
/// contact being built is passed in and handed back every call.
pub struct ContactCollector {
    nlu: Arc<dyn NluClient>,
    call_timeout: Duration,
}

impl ContactCollector {
    pub fn new(nlu: Arc<dyn NluClient>, call_timeout: Duration) -> Self {
        Self { nlu, call_timeout }
    }

    pub async fn collect(&self, user_text: &str, mut contact: ContactInfo) -> ContactTurn {
        let request = NluRequest {
            task: NluTask::Contact,
            instructions: prompts::contact_prompt(&contact.missing_fields()),
            user_text: user_text.to_string(),
            state: serde_json::to_value(&contact).unwrap_or_default(),
        };

        let message = match extract(self.nlu.as_ref(), &request, self.call_timeout).await {
            Extraction::Parsed(reply) => {
                let changed = merge_contact(&mut contact, &reply);
                debug!(changed, missing = contact.missing_fields().len(), "contact merged");
                reply.message
            }
            Extraction::Malformed(raw) => raw,
            Extraction::Failed(_) => String::new(),
        };

        let complete = contact.is_complete();
        let message = if !message.trim().is_empty() {
            message
        } else if complete {
            "Thanks, I have your contact details.".to_string()
        } else {
            missing_question(&contact)
        };

        ContactTurn {
            contact,
            complete,
            message,
        }
    }
}

/// Copies non-blank fields from the reply. Returns how many changed.
pub fn merge_contact(contact: &mut ContactInfo, reply: &NluReply) -> usize {
    let mut changed = 0;
    for field in ContactField::ALL {
        if let Some(value) = reply.field_str(field.aliases()) {
            if contact.set(field, &value) {
                changed += 1;
            }
        }
    }
    changed
}

pub fn missing_question(contact: &ContactInfo) -> String {
    let labels = contact
        .missing_fields()
        .iter()
        .map(|f| f.key().replace('_', " "))
        .collect::<Vec<_>>()
        .join(", ");
    format!("To finish your booking I still need your {}.", labels)
}
