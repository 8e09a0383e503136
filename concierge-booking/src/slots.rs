use chrono::NaiveDate;
use concierge_core::{prompts, NluClient, NluReply, NluRequest, NluTask};
use concierge_shared::{parse_travel_date, Direction, FlightRequest, ProductType, SlotError, TicketCount};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::guard::{extract, Extraction};
use crate::models::{CartItem, ItemStatus};

const RETRY_MESSAGE: &str = "Sorry, I couldn't process that just now. Could you say it again?";

const ORIGIN_KEYS: [&str; 4] = ["origin_airport_id", "airport_id", "airportid", "airport"];
const DATE_KEYS: [&str; 3] = ["travel_date", "traveldate", "date"];
const FLIGHT_KEYS: [&str; 4] = ["flight_id", "flightId", "flightid", "flight"];
const ADULT_KEYS: [&str; 3] = ["adult_tickets", "adulttickets", "adults"];
const CHILD_KEYS: [&str; 3] = ["child_tickets", "childtickets", "children"];
const PRODUCT_KEYS: [&str; 4] = ["product_type", "productid", "product_id", "product"];

/// Staging form for a leg that is still being filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegDraft {
    pub direction: Direction,
    pub origin_airport_id: Option<String>,
    pub travel_date: Option<NaiveDate>,
    pub flight_id: Option<String>,
    pub adult_tickets: Option<u32>,
    pub child_tickets: Option<u32>,
}

impl LegDraft {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            origin_airport_id: None,
            travel_date: None,
            flight_id: None,
            adult_tickets: None,
            child_tickets: None,
        }
    }

    /// Merges whatever the reply carries. Returns the number of fields taken
    /// and the values that were present but unusable.
    pub fn merge(&mut self, reply: &NluReply) -> (usize, Vec<SlotError>) {
        let mut accepted = 0;
        let mut rejected = Vec::new();

        if let Some(origin) = reply.field_str(&ORIGIN_KEYS) {
            self.origin_airport_id = Some(origin.to_ascii_uppercase());
            accepted += 1;
        }
        if let Some(raw) = reply.field_str(&DATE_KEYS) {
            match parse_travel_date(&raw) {
                Ok(date) => {
                    self.travel_date = Some(date);
                    accepted += 1;
                }
                Err(e) => rejected.push(e),
            }
        }
        if let Some(flight) = reply.field_str(&FLIGHT_KEYS) {
            self.flight_id = Some(flight.to_ascii_uppercase());
            accepted += 1;
        }
        if let Some(adults) = reply.field_u32(&ADULT_KEYS) {
            match TicketCount::checked_count("adult_tickets", adults) {
                Ok(adults) => {
                    self.adult_tickets = Some(adults);
                    accepted += 1;
                }
                Err(e) => rejected.push(e),
            }
        }
        if let Some(children) = reply.field_u32(&CHILD_KEYS) {
            match TicketCount::checked_count("child_tickets", children) {
                Ok(children) => {
                    self.child_tickets = Some(children);
                    accepted += 1;
                }
                Err(e) => rejected.push(e),
            }
        }

        (accepted, rejected)
    }

    /// Keys still needed, in prompt order. Children default to zero once
    /// the adult count is known.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.origin_airport_id.is_none() {
            missing.push("origin_airport_id");
        }
        if self.travel_date.is_none() {
            missing.push("travel_date");
        }
        if self.flight_id.is_none() {
            missing.push("flight_id");
        }
        if self.adult_tickets.is_none() {
            missing.push("adult_tickets");
            if self.child_tickets.is_none() {
                missing.push("child_tickets");
            }
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn materialize(&self) -> Result<FlightRequest, SlotError> {
        let origin = self
            .origin_airport_id
            .clone()
            .ok_or(SlotError::MissingField("origin_airport_id"))?;
        let travel_date = self.travel_date.ok_or(SlotError::MissingField("travel_date"))?;
        let flight_id = self.flight_id.clone().ok_or(SlotError::MissingField("flight_id"))?;
        let adults = self.adult_tickets.ok_or(SlotError::MissingField("adult_tickets"))?;
        let children = self.child_tickets.unwrap_or(0);

        FlightRequest::new(
            self.direction,
            origin,
            travel_date,
            flight_id,
            TicketCount::new(adults, children),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SlotProgress {
    /// Nothing usable was extracted; the item is unchanged.
    NoProgress,
    ProductSelected(ProductType),
    /// Some fields of the leg were staged but it is not complete yet.
    FieldsCaptured(Direction),
    /// The leg was completed and attached; other legs remain.
    LegCaptured(Direction),
    /// Every required leg is present. Schedule resolution is up to the caller.
    LegsComplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotTurn {
    pub message: String,
    pub progress: SlotProgress,
    /// What the collaborator was asked for this turn, if anything.
    pub requested: Option<NluTask>,
}

impl SlotTurn {
    fn no_progress(message: impl Into<String>, requested: Option<NluTask>) -> Self {
        Self {
            message: message.into(),
            progress: SlotProgress::NoProgress,
            requested,
        }
    }
}

/// Per-item slot filling. Knows nothing about inventory: it reports when the
/// legs are complete and leaves schedule resolution to the caller.
pub struct SlotCollector {
    nlu: Arc<dyn NluClient>,
    call_timeout: Duration,
}

impl SlotCollector {
    pub fn new(nlu: Arc<dyn NluClient>, call_timeout: Duration) -> Self {
        Self { nlu, call_timeout }
    }

    pub async fn collect(&self, item: &mut CartItem, user_text: &str) -> SlotTurn {
        match item.status() {
            ItemStatus::CollectingProduct => self.collect_product(item, user_text).await,
            ItemStatus::CollectingSchedule => self.collect_schedule(item, user_text).await,
            other => SlotTurn::no_progress(format!("This booking is already {}.", other), None),
        }
    }

    async fn collect_product(&self, item: &mut CartItem, user_text: &str) -> SlotTurn {
        let task = NluTask::ProductSelection;
        let request = NluRequest {
            task,
            instructions: prompts::product_prompt(),
            user_text: user_text.to_string(),
            state: json!({ "product_type": Value::Null }),
        };

        let reply = match extract(self.nlu.as_ref(), &request, self.call_timeout).await {
            Extraction::Parsed(reply) => reply,
            Extraction::Malformed(raw) => return SlotTurn::no_progress(raw, Some(task)),
            Extraction::Failed(_) => return SlotTurn::no_progress(RETRY_MESSAGE, Some(task)),
        };

        let selected = reply
            .field_str(&PRODUCT_KEYS)
            .and_then(|raw| raw.parse::<ProductType>().ok());

        let Some(product_type) = selected else {
            debug!(item_id = %item.id(), "no product selected yet");
            return SlotTurn::no_progress(or_default(&reply.message, product_question), Some(task));
        };

        if let Err(e) = item.select_product(product_type) {
            warn!(item_id = %item.id(), error = %e, "product selection rejected");
            return SlotTurn::no_progress(e.to_string(), Some(task));
        }
        info!(item_id = %item.id(), product = %product_type, "product selected");

        let next_hint = item
            .next_outstanding_leg()
            .map(|d| leg_question(d, &LegDraft::new(d).missing()))
            .unwrap_or_default();
        SlotTurn {
            message: join_messages(&reply.message, &next_hint),
            progress: SlotProgress::ProductSelected(product_type),
            requested: Some(task),
        }
    }

    async fn collect_schedule(&self, item: &mut CartItem, user_text: &str) -> SlotTurn {
        let Some(direction) = item.next_outstanding_leg() else {
            return SlotTurn {
                message: "All flight details are in.".to_string(),
                progress: SlotProgress::LegsComplete,
                requested: None,
            };
        };

        let mut draft = match item.staging.take() {
            Some(draft) if draft.direction == direction => draft,
            _ => LegDraft::new(direction),
        };

        let task = NluTask::FlightLeg(direction);
        let missing = draft.missing();
        let request = NluRequest {
            task,
            instructions: prompts::leg_prompt(direction, &missing),
            user_text: user_text.to_string(),
            state: serde_json::to_value(&draft).unwrap_or(Value::Null),
        };

        let reply = match extract(self.nlu.as_ref(), &request, self.call_timeout).await {
            Extraction::Parsed(reply) => reply,
            Extraction::Malformed(raw) => {
                item.staging = Some(draft);
                return SlotTurn::no_progress(raw, Some(task));
            }
            Extraction::Failed(_) => {
                item.staging = Some(draft);
                return SlotTurn::no_progress(RETRY_MESSAGE, Some(task));
            }
        };

        // Data for the other leg is ignored; legs are collected one at a time.
        if let Some(other) = reply
            .field_str(&["direction"])
            .and_then(|raw| raw.parse::<Direction>().ok())
            .filter(|d| *d != direction)
        {
            debug!(item_id = %item.id(), expected = %direction, got = %other, "reply for the wrong leg");
            item.staging = Some(draft);
            return SlotTurn::no_progress(leg_question(direction, &missing), Some(task));
        }

        let (accepted, rejected) = draft.merge(&reply);

        if !draft.is_complete() {
            let mut message = or_default(&reply.message, || leg_question(direction, &draft.missing()));
            for problem in &rejected {
                message = join_messages(&message, &problem.to_string());
            }
            let progress = if accepted > 0 {
                SlotProgress::FieldsCaptured(direction)
            } else {
                SlotProgress::NoProgress
            };
            item.staging = Some(draft);
            return SlotTurn {
                message,
                progress,
                requested: Some(task),
            };
        }

        let leg = match draft.materialize() {
            Ok(leg) => leg,
            Err(e) => {
                item.staging = Some(draft);
                return SlotTurn {
                    message: join_messages(&reply.message, &e.to_string()),
                    progress: SlotProgress::NoProgress,
                    requested: Some(task),
                };
            }
        };

        if let Err(e) = item.attach_leg(leg) {
            warn!(item_id = %item.id(), error = %e, "leg rejected");
            return SlotTurn::no_progress(e.to_string(), Some(task));
        }
        info!(item_id = %item.id(), direction = %direction, "leg captured");

        if item.legs_complete() {
            SlotTurn {
                message: or_default(&reply.message, || "Thanks, I have all the flight details.".to_string()),
                progress: SlotProgress::LegsComplete,
                requested: Some(task),
            }
        } else {
            let next_hint = item
                .next_outstanding_leg()
                .map(|d| leg_question(d, &LegDraft::new(d).missing()))
                .unwrap_or_default();
            SlotTurn {
                message: join_messages(&reply.message, &next_hint),
                progress: SlotProgress::LegCaptured(direction),
                requested: Some(task),
            }
        }
    }
}

fn product_question() -> String {
    let choices = ProductType::ALL
        .iter()
        .map(|p| format!("{} ({})", p.description(), p.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Which service would you like: {}?", choices)
}

fn leg_question(direction: Direction, missing: &[&str]) -> String {
    let labels = prompts::LEG_FIELDS
        .iter()
        .filter(|(key, _)| missing.contains(key))
        .map(|(_, label)| label.to_lowercase())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "For your {} flight, please tell me the {}.",
        direction.as_str().to_lowercase(),
        labels
    )
}

fn or_default(message: &str, fallback: impl FnOnce() -> String) -> String {
    if message.trim().is_empty() {
        fallback()
    } else {
        message.to_string()
    }
}

fn join_messages(first: &str, second: &str) -> String {
    match (first.trim().is_empty(), second.trim().is_empty()) {
        (true, _) => second.to_string(),
        (false, true) => first.to_string(),
        (false, false) => format!("{} {}", first.trim(), second.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concierge_core::{CollaboratorError, CollaboratorResult};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions and records every request it sees.
    struct ScriptedNlu {
        replies: Mutex<VecDeque<CollaboratorResult<String>>>,
        seen: Mutex<Vec<NluTask>>,
    }

    impl ScriptedNlu {
        fn new(replies: Vec<CollaboratorResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<NluTask> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NluClient for ScriptedNlu {
        async fn complete(&self, request: &NluRequest) -> CollaboratorResult<String> {
            self.seen.lock().unwrap().push(request.task);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("{\"message\": \"\"}".to_string()))
        }
    }

    fn ok(raw: &str) -> CollaboratorResult<String> {
        Ok(raw.to_string())
    }

    fn collector(nlu: Arc<ScriptedNlu>) -> SlotCollector {
        SlotCollector::new(nlu, Duration::from_secs(1))
    }

    const ARRIVAL_LEG: &str = r#"{"message": "Got it", "done": true, "fields": {"direction": "ARRIVAL", "airport_id": "JFK", "travel_date": "2025-06-21", "flight_id": "AA100", "adult_tickets": 2, "child_tickets": 0}}"#;
    const DEPARTURE_LEG: &str = r#"{"message": "Got it", "done": true, "fields": {"direction": "DEPARTURE", "airport_id": "JFK", "travel_date": "2025-06-28", "flight_id": "AA200", "adult_tickets": 2, "child_tickets": 0}}"#;

    #[tokio::test]
    async fn test_product_selection_advances_item() {
        let nlu = ScriptedNlu::new(vec![ok(
            r#"{"message": "Arrival it is.", "done": true, "fields": {"product_type": "ARRIVALONLY"}}"#,
        )]);
        let collector = collector(nlu.clone());
        let mut item = CartItem::new();

        let turn = collector.collect(&mut item, "just arrival please").await;

        assert_eq!(turn.progress, SlotProgress::ProductSelected(ProductType::ArrivalOnly));
        assert_eq!(item.status(), ItemStatus::CollectingSchedule);
        assert!(turn.message.starts_with("Arrival it is."));
        assert_eq!(nlu.seen(), vec![NluTask::ProductSelection]);
    }

    #[tokio::test]
    async fn test_unclear_product_keeps_state_and_relays_question() {
        let nlu = ScriptedNlu::new(vec![ok(
            r#"{"message": "Would you like arrival, departure or both?", "done": false}"#,
        )]);
        let collector = collector(nlu);
        let mut item = CartItem::new();

        let turn = collector.collect(&mut item, "hmm not sure").await;

        assert_eq!(turn.progress, SlotProgress::NoProgress);
        assert_eq!(turn.message, "Would you like arrival, departure or both?");
        assert_eq!(item.status(), ItemStatus::CollectingProduct);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_relayed_verbatim() {
        let nlu = ScriptedNlu::new(vec![ok("I'm not sure what you mean.")]);
        let collector = collector(nlu);
        let mut item = CartItem::new();

        let turn = collector.collect(&mut item, "blah").await;

        assert_eq!(turn.progress, SlotProgress::NoProgress);
        assert_eq!(turn.message, "I'm not sure what you mean.");
        assert_eq!(item.status(), ItemStatus::CollectingProduct);
    }

    #[tokio::test]
    async fn test_service_failure_does_not_fail_the_turn() {
        let nlu = ScriptedNlu::new(vec![Err(CollaboratorError::Unavailable {
            service: "nlu",
            reason: "connection refused".to_string(),
        })]);
        let collector = collector(nlu);
        let mut item = CartItem::new();

        let turn = collector.collect(&mut item, "book arrival").await;

        assert_eq!(turn.progress, SlotProgress::NoProgress);
        assert_eq!(turn.message, RETRY_MESSAGE);
    }

    #[tokio::test]
    async fn test_bundle_collects_arrival_then_departure() {
        let nlu = ScriptedNlu::new(vec![
            ok(r#"{"message": "Bundle.", "fields": {"product_type": "ARRIVALBUNDLE"}}"#),
            ok(ARRIVAL_LEG),
            ok(DEPARTURE_LEG),
        ]);
        let collector = collector(nlu.clone());
        let mut item = CartItem::new();

        collector.collect(&mut item, "both please").await;

        let turn = collector.collect(&mut item, "arrival details").await;
        assert_eq!(turn.progress, SlotProgress::LegCaptured(Direction::Arrival));
        assert_eq!(item.status(), ItemStatus::CollectingSchedule);
        assert!(item.leg(Direction::Arrival).is_some());
        assert!(item.leg(Direction::Departure).is_none());

        let turn = collector.collect(&mut item, "departure details").await;
        assert_eq!(turn.progress, SlotProgress::LegsComplete);
        assert!(item.legs_complete());

        assert_eq!(
            nlu.seen(),
            vec![
                NluTask::ProductSelection,
                NluTask::FlightLeg(Direction::Arrival),
                NluTask::FlightLeg(Direction::Departure),
            ]
        );
    }

    #[tokio::test]
    async fn test_done_flag_alone_does_not_complete_a_bundle() {
        let nlu = ScriptedNlu::new(vec![
            ok(r#"{"message": "Bundle.", "fields": {"product_type": "ARRIVALBUNDLE"}}"#),
            ok(ARRIVAL_LEG),
        ]);
        let collector = collector(nlu);
        let mut item = CartItem::new();

        collector.collect(&mut item, "bundle").await;
        let turn = collector.collect(&mut item, "arrival details").await;

        // The reply says done, but the departure leg is still missing.
        assert_ne!(turn.progress, SlotProgress::LegsComplete);
        assert!(!item.legs_complete());
        assert_eq!(item.next_outstanding_leg(), Some(Direction::Departure));
    }

    #[tokio::test]
    async fn test_partial_leg_is_staged_across_turns() {
        let nlu = ScriptedNlu::new(vec![
            ok(r#"{"message": "Arrival.", "fields": {"product_type": "ARRIVAL_ONLY"}}"#),
            ok(r#"{"message": "Which flight?", "fields": {"airport_id": "jfk", "travel_date": "2025-06-21"}}"#),
            ok(r#"{"message": "How many?", "fields": {"flight_id": "aa100"}}"#),
            ok(r#"{"message": "Done.", "fields": {"adult_tickets": "2"}}"#),
        ]);
        let collector = collector(nlu);
        let mut item = CartItem::new();

        collector.collect(&mut item, "arrival").await;

        let turn = collector.collect(&mut item, "JFK on June 21").await;
        assert_eq!(turn.progress, SlotProgress::FieldsCaptured(Direction::Arrival));
        let staged = item.staging.clone().unwrap();
        assert_eq!(staged.origin_airport_id.as_deref(), Some("JFK"));
        assert_eq!(staged.missing(), vec!["flight_id", "adult_tickets", "child_tickets"]);

        collector.collect(&mut item, "AA100").await;
        let turn = collector.collect(&mut item, "two adults").await;

        assert_eq!(turn.progress, SlotProgress::LegsComplete);
        let leg = item.leg(Direction::Arrival).unwrap();
        assert_eq!(leg.flight_id(), "AA100");
        assert_eq!(leg.tickets(), TicketCount::new(2, 0));
        assert!(item.staging.is_none());
    }

    #[tokio::test]
    async fn test_bad_date_is_rejected_and_reported() {
        let nlu = ScriptedNlu::new(vec![
            ok(r#"{"message": "Arrival.", "fields": {"product_type": "ARRIVAL_ONLY"}}"#),
            ok(r#"{"message": "", "fields": {"travel_date": "someday"}}"#),
        ]);
        let collector = collector(nlu);
        let mut item = CartItem::new();

        collector.collect(&mut item, "arrival").await;
        let turn = collector.collect(&mut item, "someday").await;

        assert_eq!(turn.progress, SlotProgress::NoProgress);
        assert!(turn.message.contains("travel_date"));
        assert!(item.staging.as_ref().unwrap().travel_date.is_none());
    }

    #[tokio::test]
    async fn test_oversized_ticket_count_is_rejected() {
        let nlu = ScriptedNlu::new(vec![
            ok(r#"{"message": "Arrival.", "fields": {"product_type": "ARRIVAL_ONLY"}}"#),
            ok(r#"{"message": "", "fields": {"airport_id": "JFK", "travel_date": "2025-06-21",
                "flight_id": "AA100", "adult_tickets": 4294967295, "child_tickets": 1}}"#),
        ]);
        let collector = collector(nlu);
        let mut item = CartItem::new();

        collector.collect(&mut item, "arrival").await;
        let turn = collector.collect(&mut item, "a lot of adults").await;

        assert_eq!(turn.progress, SlotProgress::FieldsCaptured(Direction::Arrival));
        assert!(turn.message.contains("adult_tickets"));
        let draft = item.staging.as_ref().unwrap();
        assert!(draft.adult_tickets.is_none());
        assert_eq!(draft.child_tickets, Some(1));
        assert!(item.leg(Direction::Arrival).is_none());
    }

    #[tokio::test]
    async fn test_reply_for_other_leg_is_ignored() {
        let nlu = ScriptedNlu::new(vec![
            ok(r#"{"message": "Bundle.", "fields": {"product_type": "BUNDLE"}}"#),
            ok(DEPARTURE_LEG),
        ]);
        let collector = collector(nlu);
        let mut item = CartItem::new();

        collector.collect(&mut item, "bundle").await;
        let turn = collector.collect(&mut item, "departure first").await;

        assert_eq!(turn.progress, SlotProgress::NoProgress);
        assert!(item.leg(Direction::Departure).is_none());
        assert!(item.leg(Direction::Arrival).is_none());
    }

    #[test]
    fn test_draft_children_default_to_zero() {
        let mut draft = LegDraft::new(Direction::Departure);
        draft.origin_airport_id = Some("SIA".to_string());
        draft.travel_date = NaiveDate::from_ymd_opt(2025, 7, 1);
        draft.flight_id = Some("JM7".to_string());
        draft.adult_tickets = Some(1);

        assert!(draft.is_complete());
        let leg = draft.materialize().unwrap();
        assert_eq!(leg.tickets(), TicketCount::new(1, 0));
        assert_eq!(leg.direction(), Direction::Departure);
    }
}
