use async_trait::async_trait;
use chrono::NaiveDate;
use concierge_shared::Direction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CollaboratorResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleQuery {
    pub direction: Direction,
    pub origin_airport_id: String,
    pub travel_date: NaiveDate,
}

/// One schedule entry from the inventory service. Only `flightId` and
/// `scheduleId` are interpreted; everything else is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub flight_id: String,
    pub schedule_id: i64,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ScheduleRecord {
    pub fn new(flight_id: impl Into<String>, schedule_id: i64) -> Self {
        Self {
            flight_id: flight_id.into(),
            schedule_id,
            details: Map::new(),
        }
    }
}

/// Inventory lookup collaborator.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// All schedules for a direction, airport and day. May be empty.
    async fn lookup_schedules(&self, query: &ScheduleQuery) -> CollaboratorResult<Vec<ScheduleRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_record_deserialization() {
        let json = r#"
            {
                "flightId": "AA100",
                "scheduleId": 55,
                "airline": "American",
                "flightTime": "14:05"
            }
        "#;
        let record: ScheduleRecord = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(record.flight_id, "AA100");
        assert_eq!(record.schedule_id, 55);
        assert_eq!(record.details.get("airline").and_then(|v| v.as_str()), Some("American"));
    }
}
