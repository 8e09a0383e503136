use concierge_core::{CollaboratorError, ReservationClient, ReservationRecord, ReservationRequest};
use concierge_shared::Direction;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cart::CartError;
use crate::guard::with_timeout;
use crate::models::{CartItem, ItemId, ItemStatus};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReservationFailure {
    /// The item was not in a reservable shape; the service was never called.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Reservation service failed: {0}")]
    Service(#[from] CollaboratorError),

    #[error(transparent)]
    InvalidState(#[from] CartError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    Reserved(ReservationRecord),
    Failed(ReservationFailure),
}

impl ReservationOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReservationResult {
    pub item_id: ItemId,
    pub outcome: ReservationOutcome,
}

/// Counts over one `reserve_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReservationTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl ReservationTally {
    pub fn of(results: &[ReservationResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.outcome.is_reserved()).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

/// Turns ready cart items into reservations, one independent call per item.
pub struct ReservationCoordinator {
    reservations: Arc<dyn ReservationClient>,
    call_timeout: Duration,
    max_parallel: usize,
}

impl ReservationCoordinator {
    pub fn new(reservations: Arc<dyn ReservationClient>, call_timeout: Duration, max_parallel: usize) -> Self {
        Self {
            reservations,
            call_timeout,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Aggregates tickets over the required legs and picks the first matched
    /// schedule per direction. Directions the product does not cover get 0.
    pub fn build_request(item: &CartItem) -> Result<ReservationRequest, ReservationFailure> {
        if item.status() != ItemStatus::ReadyForReservation {
            return Err(ReservationFailure::PreconditionViolation(format!(
                "item {} is {}",
                item.id(),
                item.status()
            )));
        }
        let product_type = item.product_type().ok_or_else(|| {
            ReservationFailure::PreconditionViolation("no product selected".to_string())
        })?;

        let mut schedule_ids = [0i64; 2];
        for direction in product_type.required_legs() {
            let id = item.schedule_id(*direction).ok_or_else(|| {
                ReservationFailure::PreconditionViolation(format!(
                    "no schedule resolved for the {} leg",
                    direction
                ))
            })?;
            match direction {
                Direction::Arrival => schedule_ids[0] = id,
                Direction::Departure => schedule_ids[1] = id,
            }
        }

        let tickets = item.aggregate_tickets();
        Ok(ReservationRequest {
            adult_tickets: tickets.adults,
            child_tickets: tickets.children,
            arrival_schedule_id: schedule_ids[0],
            departure_schedule_id: schedule_ids[1],
            product_type,
        })
    }

    /// Reserves every item given. A failure is recorded against its own item
    /// and never stops the others; failed items keep their status.
    pub async fn reserve_all(&self, items: Vec<&mut CartItem>) -> Vec<ReservationResult> {
        let futures: Vec<_> = items.into_iter().map(|item| self.reserve_one(item)).collect();
        stream::iter(futures)
            .buffered(self.max_parallel)
            .collect::<Vec<_>>()
            .await
    }

    async fn reserve_one(&self, item: &mut CartItem) -> ReservationResult {
        let item_id = item.id();
        let outcome = match self.try_reserve(item).await {
            Ok(record) => {
                info!(item_id = %item_id, cart_item_id = record.cart_item_id, "item reserved");
                ReservationOutcome::Reserved(record)
            }
            Err(failure) => {
                warn!(item_id = %item_id, error = %failure, "reservation failed");
                ReservationOutcome::Failed(failure)
            }
        };
        ReservationResult { item_id, outcome }
    }

    async fn try_reserve(&self, item: &mut CartItem) -> Result<ReservationRecord, ReservationFailure> {
        let request = Self::build_request(item)?;
        let record = with_timeout(
            "reservation",
            self.call_timeout,
            self.reservations.reserve(&request),
        )
        .await?;
        item.mark_reserved(record.clone())?;
        Ok(record)
    }
}
