//! Instruction prompts sent to the NLU collaborator.

use concierge_shared::{ContactField, Direction, ProductType};

pub const AGENT_INTRO: &str =
    "You are a friendly airport concierge booking assistant. \
     You collect booking details step by step and never invent values the user did not give.";

const REPLY_FORMAT: &str =
    "Respond with ONLY a JSON object of the form \
     {\"message\": \"<your reply to the user>\", \"done\": true|false, \"fields\": {<extracted fields>}}. \
     Leave out any field the user has not provided.";

/// Prompt for choosing between the three products.
pub fn product_prompt() -> String {
    let choices = ProductType::ALL
        .iter()
        .map(|p| format!("- {}: {}", p.as_str(), p.description()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{AGENT_INTRO}\n\n\
         First determine which product the user wants:\n{choices}\n\n\
         Put the chosen product under \"product_type\" using exactly one of the names above.\n\
         If the user has not chosen yet, ask which one they would like.\n\n{REPLY_FORMAT}"
    )
}

/// Leg fields, with the keys the collector reads back.
pub const LEG_FIELDS: [(&str, &str); 5] = [
    ("origin_airport_id", "Airport ID"),
    ("travel_date", "Travel date (YYYY-MM-DD)"),
    ("flight_id", "Flight ID"),
    ("adult_tickets", "Number of adult tickets"),
    ("child_tickets", "Number of child tickets (0 if none)"),
];

/// Prompt scoped to a single leg. `missing` holds the keys still outstanding.
pub fn leg_prompt(direction: Direction, missing: &[&str]) -> String {
    let wanted = LEG_FIELDS
        .iter()
        .filter(|(key, _)| missing.contains(key))
        .map(|(key, label)| format!("- {label} (\"{key}\")"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{AGENT_INTRO}\n\n\
         You are collecting {direction} flight information only. Do not ask about any other flight.\n\
         Still needed:\n{wanted}\n\n\
         Set \"done\" to true only when every field above is known.\n\n{REPLY_FORMAT}"
    )
}

/// Prompt for the checkout contact details.
pub fn contact_prompt(missing: &[ContactField]) -> String {
    let wanted = missing
        .iter()
        .map(|f| format!("- \"{}\"", f.key()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{AGENT_INTRO}\n\n\
         You are collecting contact information for the booking: \
         title (Mr./Ms./Mrs.), first name, last name, email address and phone number.\n\
         Still needed:\n{wanted}\n\n\
         Use the keys \"title\", \"first_name\", \"last_name\", \"email\" and \"phone\".\n\n{REPLY_FORMAT}"
    )
}
