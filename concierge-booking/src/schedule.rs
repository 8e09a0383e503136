use concierge_core::{InventoryClient, ScheduleQuery, ScheduleRecord};
use concierge_shared::{Direction, FlightRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::guard::with_timeout;
use crate::models::CartItem;

/// Checks proposed flights against the inventory service.
pub struct ScheduleResolver {
    inventory: Arc<dyn InventoryClient>,
    call_timeout: Duration,
}

impl ScheduleResolver {
    pub fn new(inventory: Arc<dyn InventoryClient>, call_timeout: Duration) -> Self {
        Self {
            inventory,
            call_timeout,
        }
    }

    /// Records matching the leg's flight. An unreachable service yields an
    /// empty list, the same as a flight that does not exist.
    pub async fn resolve(&self, leg: &FlightRequest) -> Vec<ScheduleRecord> {
        let query = ScheduleQuery {
            direction: leg.direction(),
            origin_airport_id: leg.origin_airport_id().to_string(),
            travel_date: leg.travel_date(),
        };

        let candidates = match with_timeout(
            "inventory",
            self.call_timeout,
            self.inventory.lookup_schedules(&query),
        )
        .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    direction = %query.direction,
                    airport = %query.origin_airport_id,
                    error = %e,
                    "schedule lookup failed"
                );
                return Vec::new();
            }
        };

        let total = candidates.len();
        let matched: Vec<ScheduleRecord> = candidates
            .into_iter()
            .filter(|record| record.flight_id.trim().eq_ignore_ascii_case(leg.flight_id()))
            .collect();

        info!(
            direction = %query.direction,
            flight_id = %leg.flight_id(),
            candidates = total,
            matched = matched.len(),
            "schedule resolved"
        );
        matched
    }

    /// Resolves every required leg of the item and stores the results.
    /// Returns the directions that found no matching flight.
    pub async fn resolve_item(&self, item: &mut CartItem) -> Vec<Direction> {
        let mut unresolved = Vec::new();
        for direction in item.required_legs() {
            let Some(leg) = item.leg(*direction).cloned() else {
                unresolved.push(*direction);
                continue;
            };
            let records = self.resolve(&leg).await;
            if records.is_empty() {
                unresolved.push(*direction);
            }
            item.set_schedule(*direction, records);
        }
        unresolved
    }
}
