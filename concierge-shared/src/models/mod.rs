pub mod contact;
pub mod flight;
pub mod product;

pub use contact::{ContactField, ContactInfo};
pub use flight::{parse_travel_date, Direction, FlightRequest, SlotError, TicketCount};
pub use product::ProductType;
