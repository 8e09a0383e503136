//! Slot model shared by every concierge crate: products, legs, tickets and
//! contact details, plus the PII wrapper used for contact fields.

pub mod models;
pub mod pii;

pub use models::{
    parse_travel_date, ContactField, ContactInfo, Direction, FlightRequest, ProductType,
    SlotError, TicketCount,
};
pub use pii::Masked;
