use async_trait::async_trait;
use concierge_shared::{ContactInfo, ProductType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CollaboratorResult;

/// Aggregated reservation request for one cart item. Schedule ids are 0 for
/// directions the product does not cover.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReservationRequest {
    pub adult_tickets: u32,
    pub child_tickets: u32,
    pub arrival_schedule_id: i64,
    pub departure_schedule_id: i64,
    pub product_type: ProductType,
}

impl ReservationRequest {
    pub fn tickets_requested(&self) -> u32 {
        self.adult_tickets.saturating_add(self.child_tickets)
    }
}

/// Confirmation returned by the reservation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationRecord {
    #[serde(rename = "cartitemid")]
    pub cart_item_id: i64,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ReservationRecord {
    pub fn new(cart_item_id: i64) -> Self {
        Self {
            cart_item_id,
            details: Map::new(),
        }
    }
}

/// Reservation collaborator.
#[async_trait]
pub trait ReservationClient: Send + Sync {
    async fn reserve(&self, request: &ReservationRequest) -> CollaboratorResult<ReservationRecord>;
}

/// Contact-submission collaborator. Correlates through the reservation record.
#[async_trait]
pub trait ContactClient: Send + Sync {
    async fn submit_contact(
        &self,
        reservation: &ReservationRecord,
        contact: &ContactInfo,
    ) -> CollaboratorResult<()>;
}
