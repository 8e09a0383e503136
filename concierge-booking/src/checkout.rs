use async_trait::async_trait;
use concierge_core::{CollaboratorError, ContactClient};
use concierge_shared::{ContactField, ContactInfo, ProductType};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cart::{CartError, CartStore};
use crate::contact::{missing_question, ContactCollector};
use crate::guard::with_timeout;
use crate::models::{CartItem, ItemId, ItemStatus};
use crate::reservation::{ReservationCoordinator, ReservationOutcome, ReservationResult, ReservationTally};

/// Where checkout gets contact answers from while it blocks on the user.
#[async_trait]
pub trait ContactSource: Send {
    /// Asks `prompt` and waits for an answer. `None` means the user gave up.
    async fn next_input(&mut self, prompt: &str) -> Option<String>;
}

/// Answers from a fixed list. Used by the HTTP surface and tests.
#[derive(Debug, Default)]
pub struct ScriptedContactSource {
    inputs: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedContactSource {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Every prompt asked so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

#[async_trait]
impl ContactSource for ScriptedContactSource {
    async fn next_input(&mut self, prompt: &str) -> Option<String> {
        self.prompts.push(prompt.to_string());
        self.inputs.pop_front()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionFailure {
    #[error("Item has no reservation to attach contact details to")]
    MissingReservation,

    #[error("Contact submission failed: {0}")]
    Service(#[from] CollaboratorError),

    #[error(transparent)]
    InvalidState(#[from] CartError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub item_id: ItemId,
    pub outcome: Result<(), SubmissionFailure>,
}

/// Per-item line of the checkout summary.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub item_id: ItemId,
    pub product_type: Option<ProductType>,
    pub status: ItemStatus,
    pub cart_item_id: Option<i64>,
    pub reservation_error: Option<String>,
    pub contact_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSummary {
    pub reservations_succeeded: usize,
    pub reservations_failed: usize,
    pub submissions_succeeded: usize,
    pub submissions_failed: usize,
    pub items: Vec<ItemReport>,
    pub cart_cleared: bool,
}

impl CheckoutSummary {
    pub fn is_full_success(&self) -> bool {
        self.reservations_failed == 0 && self.submissions_failed == 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    NothingToCheckOut,
    /// The user stopped answering before the contact was complete. Nothing
    /// was reserved.
    ContactIncomplete {
        message: String,
        missing: Vec<ContactField>,
    },
    Completed(CheckoutSummary),
}

impl CheckoutOutcome {
    /// Text for the user.
    pub fn message(&self) -> String {
        match self {
            CheckoutOutcome::NothingToCheckOut => "There is nothing to check out yet.".to_string(),
            CheckoutOutcome::ContactIncomplete { message, .. } => message.clone(),
            CheckoutOutcome::Completed(summary) if summary.is_full_success() => format!(
                "All done! {} booking(s) reserved and confirmed.",
                summary.reservations_succeeded.max(summary.submissions_succeeded)
            ),
            CheckoutOutcome::Completed(summary) => format!(
                "Reservations: {} succeeded, {} failed. Contact details: {} sent, {} failed. \
                 Items that failed are still in your cart; check out again to retry them.",
                summary.reservations_succeeded,
                summary.reservations_failed,
                summary.submissions_succeeded,
                summary.submissions_failed
            ),
        }
    }
}

pub struct CheckoutOrchestrator {
    contact_collector: ContactCollector,
    coordinator: ReservationCoordinator,
    contacts: Arc<dyn ContactClient>,
    call_timeout: Duration,
    max_parallel: usize,
}

impl CheckoutOrchestrator {
    pub fn new(
        contact_collector: ContactCollector,
        coordinator: ReservationCoordinator,
        contacts: Arc<dyn ContactClient>,
        call_timeout: Duration,
        max_parallel: usize,
    ) -> Self {
        Self {
            contact_collector,
            coordinator,
            contacts,
            call_timeout,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Collects contact details, reserves every ready item, then submits the
    /// contact for every reserved item. Failures stay per item.
    ///
    /// Reserved items left over from an earlier partial checkout have their
    /// contact submission retried here as well.
    pub async fn run(
        &self,
        cart: &mut CartStore,
        contact: &mut Option<ContactInfo>,
        source: &mut dyn ContactSource,
    ) -> CheckoutOutcome {
        if cart.list_ready().is_empty() && !cart.has_awaiting_contact() {
            info!(items = cart.len(), "nothing to check out");
            return CheckoutOutcome::NothingToCheckOut;
        }

        let mut current = contact.take().unwrap_or_default();
        let mut question = missing_question(&current);
        while !current.is_complete() {
            let Some(input) = source.next_input(&question).await else {
                let missing = current.missing_fields();
                *contact = Some(current);
                info!(missing = missing.len(), "checkout stopped before contact was complete");
                return CheckoutOutcome::ContactIncomplete {
                    message: question,
                    missing,
                };
            };
            let turn = self.contact_collector.collect(&input, current).await;
            current = turn.contact;
            question = turn.message;
        }
        *contact = Some(current.clone());

        let reservations = self.coordinator.reserve_all(cart.ready_items_mut()).await;
        let submissions = self.submit_all(cart.awaiting_contact_mut(), &current).await;

        let tally = ReservationTally::of(&reservations);
        let submissions_succeeded = submissions.iter().filter(|s| s.outcome.is_ok()).count();
        let submissions_failed = submissions.len() - submissions_succeeded;

        let items = reports(cart, &reservations, &submissions);
        let full_success = tally.failed == 0 && submissions_failed == 0;

        if full_success {
            cart.clear();
            *contact = None;
        } else {
            cart.remove_finished();
        }

        info!(
            reserved = tally.succeeded,
            reservation_failures = tally.failed,
            submitted = submissions_succeeded,
            submission_failures = submissions_failed,
            cart_cleared = full_success,
            "checkout finished"
        );

        CheckoutOutcome::Completed(CheckoutSummary {
            reservations_succeeded: tally.succeeded,
            reservations_failed: tally.failed,
            submissions_succeeded,
            submissions_failed,
            items,
            cart_cleared: full_success,
        })
    }

    async fn submit_all(&self, items: Vec<&mut CartItem>, contact: &ContactInfo) -> Vec<SubmissionResult> {
        let futures: Vec<_> = items.into_iter().map(|item| self.submit_one(item, contact)).collect();
        stream::iter(futures)
            .buffered(self.max_parallel)
            .collect::<Vec<_>>()
            .await
    }

    async fn submit_one(&self, item: &mut CartItem, contact: &ContactInfo) -> SubmissionResult {
        let item_id = item.id();
        let outcome = self.try_submit(item, contact).await;
        match &outcome {
            Ok(()) => info!(item_id = %item_id, "contact submitted"),
            Err(e) => warn!(item_id = %item_id, error = %e, "contact submission failed"),
        }
        SubmissionResult { item_id, outcome }
    }

    async fn try_submit(&self, item: &mut CartItem, contact: &ContactInfo) -> Result<(), SubmissionFailure> {
        let record = item
            .reservation()
            .cloned()
            .ok_or(SubmissionFailure::MissingReservation)?;
        with_timeout(
            "contact",
            self.call_timeout,
            self.contacts.submit_contact(&record, contact),
        )
        .await?;
        item.mark_completed()?;
        Ok(())
    }
}

fn reports(
    cart: &CartStore,
    reservations: &[ReservationResult],
    submissions: &[SubmissionResult],
) -> Vec<ItemReport> {
    cart.iter()
        .filter_map(|item| {
            let reservation = reservations.iter().find(|r| r.item_id == item.id());
            let submission = submissions.iter().find(|s| s.item_id == item.id());
            if reservation.is_none() && submission.is_none() {
                return None;
            }
            Some(ItemReport {
                item_id: item.id(),
                product_type: item.product_type(),
                status: item.status(),
                cart_item_id: item.reservation().map(|r| r.cart_item_id),
                reservation_error: reservation.and_then(|r| match &r.outcome {
                    ReservationOutcome::Failed(e) => Some(e.to_string()),
                    ReservationOutcome::Reserved(_) => None,
                }),
                contact_error: submission.and_then(|s| s.outcome.as_ref().err().map(|e| e.to_string())),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use concierge_core::{
        CollaboratorResult, NluClient, NluRequest, ReservationClient, ReservationRecord, ReservationRequest,
        ScheduleRecord,
    };
    use concierge_shared::{Direction, FlightRequest, TicketCount};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        nlu: AtomicUsize,
        reserve: AtomicUsize,
        contact: AtomicUsize,
    }

    struct Fakes {
        calls: Arc<Calls>,
        nlu_replies: Mutex<VecDeque<String>>,
        failing_contact: Vec<i64>,
    }

    #[async_trait]
    impl NluClient for Fakes {
        async fn complete(&self, _request: &NluRequest) -> CollaboratorResult<String> {
            self.calls.nlu.fetch_add(1, Ordering::SeqCst);
            Ok(self.nlu_replies.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    #[async_trait]
    impl ReservationClient for Fakes {
        async fn reserve(&self, request: &ReservationRequest) -> CollaboratorResult<ReservationRecord> {
            self.calls.reserve.fetch_add(1, Ordering::SeqCst);
            Ok(ReservationRecord::new(request.arrival_schedule_id * 10))
        }
    }

    #[async_trait]
    impl ContactClient for Fakes {
        async fn submit_contact(&self, reservation: &ReservationRecord, _contact: &ContactInfo) -> CollaboratorResult<()> {
            self.calls.contact.fetch_add(1, Ordering::SeqCst);
            if self.failing_contact.contains(&reservation.cart_item_id) {
                return Err(CollaboratorError::Timeout {
                    service: "contact",
                    millis: 5,
                });
            }
            Ok(())
        }
    }

    fn orchestrator(nlu_replies: &[&str], failing_contact: Vec<i64>) -> (CheckoutOrchestrator, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let fakes = Arc::new(Fakes {
            calls: calls.clone(),
            nlu_replies: Mutex::new(nlu_replies.iter().map(|s| s.to_string()).collect()),
            failing_contact,
        });
        let timeout = Duration::from_secs(1);
        let orchestrator = CheckoutOrchestrator::new(
            ContactCollector::new(fakes.clone(), timeout),
            ReservationCoordinator::new(fakes.clone(), timeout, 4),
            fakes,
            timeout,
            4,
        );
        (orchestrator, calls)
    }

    fn ready_arrival(schedule_id: i64) -> CartItem {
        let mut item = CartItem::new();
        item.select_product(ProductType::ArrivalOnly).unwrap();
        item.attach_leg(
            FlightRequest::new(
                Direction::Arrival,
                "JFK",
                NaiveDate::from_ymd_opt(2025, 6, 21).unwrap(),
                "AA100",
                TicketCount::new(2, 0),
            )
            .unwrap(),
        )
        .unwrap();
        item.set_schedule(Direction::Arrival, vec![ScheduleRecord::new("AA100", schedule_id)]);
        item.mark_ready().unwrap();
        item
    }

    fn complete_contact() -> ContactInfo {
        let mut contact = ContactInfo::new();
        contact.set(ContactField::FirstName, "Jane");
        contact.set(ContactField::LastName, "Doe");
        contact.set(ContactField::Email, "jane@example.com");
        contact.set(ContactField::Phone, "5550100");
        contact
    }

    #[tokio::test]
    async fn test_empty_cart_makes_no_calls() {
        let (orchestrator, calls) = orchestrator(&[], vec![]);
        let mut cart = CartStore::new();
        let mut contact = None;
        let mut source = ScriptedContactSource::new(["Jane Doe"]);

        let outcome = orchestrator.run(&mut cart, &mut contact, &mut source).await;

        assert!(matches!(outcome, CheckoutOutcome::NothingToCheckOut));
        assert_eq!(calls.nlu.load(Ordering::SeqCst), 0);
        assert_eq!(calls.reserve.load(Ordering::SeqCst), 0);
        assert_eq!(calls.contact.load(Ordering::SeqCst), 0);
        assert!(source.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_cart_without_ready_items_has_nothing_to_check_out() {
        let (orchestrator, calls) = orchestrator(&[], vec![]);
        let mut cart = CartStore::new();
        cart.add(CartItem::new());

        let outcome = orchestrator
            .run(&mut cart, &mut None, &mut ScriptedContactSource::default())
            .await;

        assert!(matches!(outcome, CheckoutOutcome::NothingToCheckOut));
        assert_eq!(cart.len(), 1);
        assert_eq!(calls.reserve.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_contact_is_collected_then_items_complete() {
        let (orchestrator, calls) = orchestrator(
            &[
                r#"{"message": "Email and phone please", "fields": {"first_name": "Jane", "last_name": "Doe"}}"#,
                r#"{"message": "", "fields": {"email": "jane@example.com", "phone": "5550100"}}"#,
            ],
            vec![],
        );
        let mut cart = CartStore::new();
        cart.add(ready_arrival(55));
        cart.add(ready_arrival(56));
        let mut contact = None;
        let mut source = ScriptedContactSource::new(["Jane Doe", "jane@example.com 5550100"]);

        let outcome = orchestrator.run(&mut cart, &mut contact, &mut source).await;

        let CheckoutOutcome::Completed(summary) = outcome else {
            panic!("expected a completed checkout");
        };
        assert_eq!(summary.reservations_succeeded, 2);
        assert_eq!(summary.submissions_succeeded, 2);
        assert!(summary.cart_cleared);
        assert!(summary.items.iter().all(|i| i.status == ItemStatus::Completed));
        assert!(cart.is_empty());
        assert!(contact.is_none());
        assert_eq!(source.prompts().len(), 2);
        assert_eq!(source.prompts()[1], "Email and phone please");
        assert_eq!(calls.nlu.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_user_giving_up_reserves_nothing() {
        let (orchestrator, calls) = orchestrator(&[], vec![]);
        let mut cart = CartStore::new();
        cart.add(ready_arrival(55));
        let mut contact = None;

        let outcome = orchestrator
            .run(&mut cart, &mut contact, &mut ScriptedContactSource::default())
            .await;

        assert!(matches!(outcome, CheckoutOutcome::ContactIncomplete { ref missing, .. } if missing.len() == 4));
        assert_eq!(calls.reserve.load(Ordering::SeqCst), 0);
        assert_eq!(cart.list_ready().len(), 1);
        assert!(contact.is_some());
    }

    #[tokio::test]
    async fn test_failed_submission_is_retried_on_next_checkout() {
        let (first, calls) = orchestrator(&[], vec![560]);
        let mut cart = CartStore::new();
        cart.add(ready_arrival(55));
        let stuck = cart.add(ready_arrival(56));
        let mut contact = Some(complete_contact());

        let outcome = first
            .run(&mut cart, &mut contact, &mut ScriptedContactSource::default())
            .await;

        let CheckoutOutcome::Completed(summary) = outcome else {
            panic!("expected a completed checkout");
        };
        assert_eq!(summary.reservations_succeeded, 2);
        assert_eq!(summary.submissions_failed, 1);
        assert!(!summary.cart_cleared);
        // The completed item is gone; the stuck one stays reserved.
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(&stuck).unwrap().status(), ItemStatus::Reserved);
        assert!(contact.is_some());
        assert_eq!(calls.nlu.load(Ordering::SeqCst), 0);

        // Second run: no new reservation, only the pending submission.
        let (retry, retry_calls) = orchestrator(&[], vec![]);
        let outcome = retry
            .run(&mut cart, &mut contact, &mut ScriptedContactSource::default())
            .await;
        let CheckoutOutcome::Completed(summary) = outcome else {
            panic!("expected a completed checkout");
        };
        assert_eq!(summary.reservations_succeeded, 0);
        assert_eq!(summary.submissions_succeeded, 1);
        assert!(summary.cart_cleared);
        assert_eq!(retry_calls.reserve.load(Ordering::SeqCst), 0);
        assert_eq!(retry_calls.contact.load(Ordering::SeqCst), 1);
        assert!(cart.is_empty());
    }
}
