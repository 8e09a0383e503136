use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side of the trip a leg covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Arrival,
    Departure,
}

impl Direction {
    /// Collection order for multi-leg products. Arrival is always asked first.
    pub const ORDERED: [Direction; 2] = [Direction::Arrival, Direction::Departure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Arrival => "ARRIVAL",
            Direction::Departure => "DEPARTURE",
        }
    }

    /// Single-letter code used by the inventory backend.
    pub fn code(&self) -> &'static str {
        match self {
            Direction::Arrival => "A",
            Direction::Departure => "D",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" | "ARRIVAL" => Ok(Direction::Arrival),
            "D" | "DEPARTURE" => Ok(Direction::Departure),
            _ => Err(SlotError::InvalidValue {
                field: "direction",
                value: s.to_string(),
            }),
        }
    }
}

/// Ticket counts for one leg. Replaced wholesale, never incremented in place.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketCount {
    pub adults: u32,
    pub children: u32,
}

impl TicketCount {
    /// Upper bound for adults or children on a single leg.
    pub const MAX_PER_CATEGORY: u32 = 99;

    pub fn new(adults: u32, children: u32) -> Self {
        Self { adults, children }
    }

    pub fn total(&self) -> u32 {
        self.adults.saturating_add(self.children)
    }

    /// Accepts a single adult or child count if it is within bounds.
    pub fn checked_count(field: &'static str, value: u32) -> Result<u32, SlotError> {
        if value > Self::MAX_PER_CATEGORY {
            return Err(SlotError::InvalidValue {
                field,
                value: value.to_string(),
            });
        }
        Ok(value)
    }
}

impl std::ops::Add for TicketCount {
    type Output = TicketCount;

    fn add(self, rhs: TicketCount) -> TicketCount {
        TicketCount {
            adults: self.adults.saturating_add(rhs.adults),
            children: self.children.saturating_add(rhs.children),
        }
    }
}

/// A fully slot-filled request for one leg.
///
/// Only built through [`FlightRequest::new`], which rejects blank fields and
/// empty ticket counts. Partially collected legs live in a staging draft
/// until every field is known.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlightRequest {
    direction: Direction,
    origin_airport_id: String,
    travel_date: NaiveDate,
    flight_id: String,
    tickets: TicketCount,
}

impl FlightRequest {
    pub fn new(
        direction: Direction,
        origin_airport_id: impl Into<String>,
        travel_date: NaiveDate,
        flight_id: impl Into<String>,
        tickets: TicketCount,
    ) -> Result<Self, SlotError> {
        let origin_airport_id = origin_airport_id.into().trim().to_string();
        let flight_id = flight_id.into().trim().to_string();

        if origin_airport_id.is_empty() {
            return Err(SlotError::MissingField("origin_airport_id"));
        }
        if flight_id.is_empty() {
            return Err(SlotError::MissingField("flight_id"));
        }
        TicketCount::checked_count("adult_tickets", tickets.adults)?;
        TicketCount::checked_count("child_tickets", tickets.children)?;
        if tickets.total() == 0 {
            return Err(SlotError::NoTickets);
        }

        Ok(Self {
            direction,
            origin_airport_id,
            travel_date,
            flight_id,
            tickets,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn origin_airport_id(&self) -> &str {
        &self.origin_airport_id
    }

    pub fn travel_date(&self) -> NaiveDate {
        self.travel_date
    }

    /// ISO-8601 calendar date, e.g. `2025-06-21`.
    pub fn travel_date_iso(&self) -> String {
        self.travel_date.format("%Y-%m-%d").to_string()
    }

    pub fn flight_id(&self) -> &str {
        &self.flight_id
    }

    pub fn tickets(&self) -> TicketCount {
        self.tickets
    }
}

/// Parses the date formats users and the NLU collaborator tend to produce.
pub fn parse_travel_date(raw: &str) -> Result<NaiveDate, SlotError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y%m%d"))
        .map_err(|_| SlotError::InvalidValue {
            field: "travel_date",
            value: raw.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        field: &'static str,
        value: String,
    },

    #[error("At least one ticket is required")]
    NoTickets,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_flight_request_validation() {
        let ok = FlightRequest::new(
            Direction::Arrival,
            " JFK ",
            date(2025, 6, 21),
            "AA100",
            TicketCount::new(2, 0),
        )
        .unwrap();
        assert_eq!(ok.origin_airport_id(), "JFK");
        assert_eq!(ok.travel_date_iso(), "2025-06-21");
        assert_eq!(ok.tickets().total(), 2);

        let blank = FlightRequest::new(
            Direction::Arrival,
            "  ",
            date(2025, 6, 21),
            "AA100",
            TicketCount::new(1, 0),
        );
        assert_eq!(blank, Err(SlotError::MissingField("origin_airport_id")));

        let no_tickets = FlightRequest::new(
            Direction::Departure,
            "SIA",
            date(2025, 6, 21),
            "JM7",
            TicketCount::default(),
        );
        assert_eq!(no_tickets, Err(SlotError::NoTickets));
    }

    #[test]
    fn test_oversized_ticket_counts_are_rejected() {
        let huge = FlightRequest::new(
            Direction::Arrival,
            "JFK",
            date(2025, 6, 21),
            "AA100",
            TicketCount::new(u32::MAX, 1),
        );
        assert_eq!(
            huge,
            Err(SlotError::InvalidValue {
                field: "adult_tickets",
                value: u32::MAX.to_string(),
            })
        );

        assert_eq!(TicketCount::new(u32::MAX, 1).total(), u32::MAX);
        let summed = TicketCount::new(u32::MAX, 0) + TicketCount::new(1, 2);
        assert_eq!(summed, TicketCount::new(u32::MAX, 2));
        assert_eq!(TicketCount::checked_count("child_tickets", 99), Ok(99));
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("a".parse::<Direction>().unwrap(), Direction::Arrival);
        assert_eq!("Departure".parse::<Direction>().unwrap(), Direction::Departure);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Departure.code(), "D");
    }

    #[test]
    fn test_travel_date_formats() {
        assert_eq!(parse_travel_date("2025-05-31").unwrap(), date(2025, 5, 31));
        assert_eq!(parse_travel_date("20250531").unwrap(), date(2025, 5, 31));
        assert!(parse_travel_date("next tuesday").is_err());
    }

    #[test]
    fn test_ticket_totals_add() {
        let sum = TicketCount::new(2, 1) + TicketCount::new(1, 0);
        assert_eq!(sum, TicketCount::new(3, 1));
        assert_eq!(sum.total(), 4);
    }
}
