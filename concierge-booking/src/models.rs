use chrono::{DateTime, Utc};
use concierge_core::{ReservationRecord, ScheduleRecord};
use concierge_shared::{Direction, FlightRequest, ProductType, TicketCount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::cart::CartError;
use crate::slots::LegDraft;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cart item lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    CollectingProduct,
    CollectingSchedule,
    ReadyForReservation,
    Reserved,
    Completed,
    Cancelled,
}

impl ItemStatus {
    /// Transition table. Forward steps are strictly one at a time; any
    /// non-terminal state may be cancelled.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        match (*self, next) {
            (CollectingProduct, CollectingSchedule)
            | (CollectingSchedule, ReadyForReservation)
            | (ReadyForReservation, Reserved)
            | (Reserved, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::CollectingProduct => "COLLECTING_PRODUCT",
            ItemStatus::CollectingSchedule => "COLLECTING_SCHEDULE",
            ItemStatus::ReadyForReservation => "READY_FOR_RESERVATION",
            ItemStatus::Reserved => "RESERVED",
            ItemStatus::Completed => "COMPLETED",
            ItemStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved inventory records per direction.
pub type ScheduleData = BTreeMap<Direction, Vec<ScheduleRecord>>;

/// One product selection in the cart, from first mention to completion.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    id: ItemId,
    product_type: Option<ProductType>,
    arrival_leg: Option<FlightRequest>,
    departure_leg: Option<FlightRequest>,
    schedule_data: ScheduleData,
    reservation: Option<ReservationRecord>,
    status: ItemStatus,
    #[serde(skip)]
    pub(crate) staging: Option<LegDraft>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            product_type: None,
            arrival_leg: None,
            departure_leg: None,
            schedule_data: ScheduleData::new(),
            reservation: None,
            status: ItemStatus::CollectingProduct,
            staging: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ItemId) {
        self.id = id;
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn product_type(&self) -> Option<ProductType> {
        self.product_type
    }

    pub fn leg(&self, direction: Direction) -> Option<&FlightRequest> {
        match direction {
            Direction::Arrival => self.arrival_leg.as_ref(),
            Direction::Departure => self.departure_leg.as_ref(),
        }
    }

    pub fn schedule_data(&self) -> &ScheduleData {
        &self.schedule_data
    }

    pub fn reservation(&self) -> Option<&ReservationRecord> {
        self.reservation.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn required_legs(&self) -> &'static [Direction] {
        self.product_type.map(|p| p.required_legs()).unwrap_or(&[])
    }

    /// First required leg not yet attached, in ARRIVAL → DEPARTURE order.
    pub fn next_outstanding_leg(&self) -> Option<Direction> {
        self.required_legs()
            .iter()
            .copied()
            .find(|d| self.leg(*d).is_none())
    }

    /// Product chosen and every required leg present. Pure; no side effects.
    pub fn legs_complete(&self) -> bool {
        self.product_type.is_some() && self.next_outstanding_leg().is_none()
    }

    /// Every required direction has at least one resolved schedule record.
    pub fn schedule_resolved(&self) -> bool {
        self.product_type.is_some()
            && self.required_legs().iter().all(|d| {
                self.schedule_data
                    .get(d)
                    .map(|records| !records.is_empty())
                    .unwrap_or(false)
            })
    }

    /// Schedule id of the first matched record for a direction.
    pub fn schedule_id(&self, direction: Direction) -> Option<i64> {
        self.schedule_data
            .get(&direction)
            .and_then(|records| records.first())
            .map(|r| r.schedule_id)
    }

    /// Sum of ticket totals over the legs present.
    pub fn total_tickets(&self) -> u32 {
        Direction::ORDERED
            .iter()
            .filter_map(|d| self.leg(*d))
            .fold(0u32, |total, leg| total.saturating_add(leg.tickets().total()))
    }

    /// Adults and children summed over the required legs only.
    pub fn aggregate_tickets(&self) -> TicketCount {
        self.required_legs()
            .iter()
            .filter_map(|d| self.leg(*d))
            .fold(TicketCount::default(), |acc, leg| acc + leg.tickets())
    }

    /// COLLECTING_PRODUCT → COLLECTING_SCHEDULE
    pub fn select_product(&mut self, product_type: ProductType) -> Result<(), CartError> {
        self.ensure_transition(ItemStatus::CollectingSchedule)?;
        self.product_type = Some(product_type);
        self.apply(ItemStatus::CollectingSchedule);
        Ok(())
    }

    /// Attaches a completed leg. Only legs the product requires are accepted.
    pub fn attach_leg(&mut self, request: FlightRequest) -> Result<(), CartError> {
        if self.status != ItemStatus::CollectingSchedule {
            return Err(CartError::PreconditionViolation(format!(
                "cannot attach a leg while {}",
                self.status
            )));
        }
        let direction = request.direction();
        let product_type = self.product_type.ok_or_else(|| {
            CartError::PreconditionViolation("no product selected".to_string())
        })?;
        if !product_type.requires(direction) {
            return Err(CartError::LegNotRequired {
                direction,
                product_type,
            });
        }

        match direction {
            Direction::Arrival => self.arrival_leg = Some(request),
            Direction::Departure => self.departure_leg = Some(request),
        }
        self.schedule_data.remove(&direction);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Drops a leg whose flight could not be found so it gets collected again.
    pub fn discard_leg(&mut self, direction: Direction) {
        if self.status != ItemStatus::CollectingSchedule {
            return;
        }
        match direction {
            Direction::Arrival => self.arrival_leg = None,
            Direction::Departure => self.departure_leg = None,
        }
        self.schedule_data.remove(&direction);
        self.updated_at = Utc::now();
    }

    pub fn set_schedule(&mut self, direction: Direction, records: Vec<ScheduleRecord>) {
        self.schedule_data.insert(direction, records);
        self.updated_at = Utc::now();
    }

    /// COLLECTING_SCHEDULE → READY_FOR_RESERVATION, gated on legs and schedules.
    pub fn mark_ready(&mut self) -> Result<(), CartError> {
        self.ensure_transition(ItemStatus::ReadyForReservation)?;
        if !self.legs_complete() {
            return Err(CartError::PreconditionViolation(
                "required legs are missing".to_string(),
            ));
        }
        if !self.schedule_resolved() {
            return Err(CartError::PreconditionViolation(
                "schedule data is missing for a required leg".to_string(),
            ));
        }
        self.staging = None;
        self.apply(ItemStatus::ReadyForReservation);
        Ok(())
    }

    /// READY_FOR_RESERVATION → RESERVED
    pub fn mark_reserved(&mut self, record: ReservationRecord) -> Result<(), CartError> {
        self.ensure_transition(ItemStatus::Reserved)?;
        self.reservation = Some(record);
        self.apply(ItemStatus::Reserved);
        Ok(())
    }

    /// RESERVED → COMPLETED
    pub fn mark_completed(&mut self) -> Result<(), CartError> {
        self.ensure_transition(ItemStatus::Completed)?;
        self.apply(ItemStatus::Completed);
        Ok(())
    }

    /// Any non-terminal state → CANCELLED
    pub fn cancel(&mut self) -> Result<(), CartError> {
        self.ensure_transition(ItemStatus::Cancelled)?;
        self.staging = None;
        self.apply(ItemStatus::Cancelled);
        Ok(())
    }

    fn ensure_transition(&self, next: ItemStatus) -> Result<(), CartError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(CartError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    fn apply(&mut self, next: ItemStatus) {
        tracing::debug!(item_id = %self.id, from = %self.status, to = %next, "item transition");
        self.status = next;
        self.updated_at = Utc::now();
    }
}

impl Default for CartItem {
    fn default() -> Self {
        Self::new()
    }
}
