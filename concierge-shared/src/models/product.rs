use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::flight::{Direction, SlotError};

/// Bookable airport services. Decides which legs an item needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    ArrivalOnly,
    DepartureOnly,
    ArrivalDepartureBundle,
}

impl ProductType {
    pub const ALL: [ProductType; 3] = [
        ProductType::ArrivalOnly,
        ProductType::DepartureOnly,
        ProductType::ArrivalDepartureBundle,
    ];

    /// Required legs, in collection order.
    pub fn required_legs(&self) -> &'static [Direction] {
        match self {
            ProductType::ArrivalOnly => &[Direction::Arrival],
            ProductType::DepartureOnly => &[Direction::Departure],
            ProductType::ArrivalDepartureBundle => &[Direction::Arrival, Direction::Departure],
        }
    }

    pub fn requires(&self, direction: Direction) -> bool {
        self.required_legs().contains(&direction)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::ArrivalOnly => "ARRIVAL_ONLY",
            ProductType::DepartureOnly => "DEPARTURE_ONLY",
            ProductType::ArrivalDepartureBundle => "ARRIVAL_DEPARTURE_BUNDLE",
        }
    }

    /// Product code understood by the reservation backend.
    pub fn product_id(&self) -> &'static str {
        match self {
            ProductType::ArrivalOnly => "ARRIVALONLY",
            ProductType::DepartureOnly => "DEPARTURELOUNGE",
            ProductType::ArrivalDepartureBundle => "ARRIVALBUNDLE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProductType::ArrivalOnly => "Arrival service only",
            ProductType::DepartureOnly => "Departure service only",
            ProductType::ArrivalDepartureBundle => "Arrival and departure services together",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = SlotError;

    /// Accepts our own names, the backend product codes and a few loose aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "ARRIVALONLY" | "ARRIVAL" => Ok(ProductType::ArrivalOnly),
            "DEPARTUREONLY" | "DEPARTURE" | "DEPARTURELOUNGE" => Ok(ProductType::DepartureOnly),
            "ARRIVALDEPARTUREBUNDLE" | "ARRIVALBUNDLE" | "BUNDLE" => {
                Ok(ProductType::ArrivalDepartureBundle)
            }
            _ => Err(SlotError::InvalidValue {
                field: "product_type",
                value: s.to_string(),
            }),
        }
    }
}
