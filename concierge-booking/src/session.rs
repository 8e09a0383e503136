use concierge_core::{classify, ContactClient, Intent, InventoryClient, NluClient, ReservationClient};
use concierge_shared::{ContactInfo, Direction, ProductType};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cart::{CartError, CartStore};
use crate::checkout::{CheckoutOrchestrator, CheckoutOutcome, ContactSource};
use crate::contact::ContactCollector;
use crate::models::{CartItem, ItemId, ItemStatus};
use crate::reservation::ReservationCoordinator;
use crate::schedule::ScheduleResolver;
use crate::slots::{SlotCollector, SlotProgress};

pub const GENERAL_REPLY: &str =
    "I'm here to help you book flights! Tell me about the arrival or departure service you need.";

const CLOSED_REPLY: &str = "This session has ended.";

/// The four external services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub nlu: Arc<dyn NluClient>,
    pub inventory: Arc<dyn InventoryClient>,
    pub reservations: Arc<dyn ReservationClient>,
    pub contacts: Arc<dyn ContactClient>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Deadline applied to every collaborator call.
    pub call_timeout: Duration,
    /// Upper bound on concurrent per-item calls during checkout.
    pub max_parallel_items: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(15),
            max_parallel_items: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Session-level commands, parsed from the user's words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShowCart,
    Checkout,
    /// Abandon the item currently being collected.
    Cancel,
    Exit,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "cart" | "show cart" | "view cart" => Some(Command::ShowCart),
            "checkout" | "check out" | "pay" => Some(Command::Checkout),
            "cancel" | "start over" => Some(Command::Cancel),
            "exit" | "quit" | "bye" => Some(Command::Exit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub message: String,
    /// Set only when the turn was classified; sticky turns skip classification.
    pub intent: Option<Intent>,
    pub item_id: Option<ItemId>,
    pub item_status: Option<ItemStatus>,
    pub progress: Option<SlotProgress>,
}

impl TurnReply {
    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            intent: None,
            item_id: None,
            item_status: None,
            progress: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LegView {
    pub direction: Direction,
    pub origin_airport_id: String,
    pub travel_date: String,
    pub flight_id: String,
    pub adult_tickets: u32,
    pub child_tickets: u32,
    pub schedule_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub item_id: ItemId,
    pub product_type: Option<ProductType>,
    pub status: ItemStatus,
    pub legs: Vec<LegView>,
    pub total_tickets: u32,
    pub cart_item_id: Option<i64>,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        let legs = Direction::ORDERED
            .iter()
            .filter_map(|d| item.leg(*d))
            .map(|leg| LegView {
                direction: leg.direction(),
                origin_airport_id: leg.origin_airport_id().to_string(),
                travel_date: leg.travel_date_iso(),
                flight_id: leg.flight_id().to_string(),
                adult_tickets: leg.tickets().adults,
                child_tickets: leg.tickets().children,
                schedule_id: item.schedule_id(leg.direction()),
            })
            .collect();

        Self {
            item_id: item.id(),
            product_type: item.product_type(),
            status: item.status(),
            legs,
            total_tickets: item.total_tickets(),
            cart_item_id: item.reservation().map(|r| r.cart_item_id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub ready_items: usize,
    pub total_tickets: u32,
}

impl CartView {
    /// Plain-text rendering for terminals.
    pub fn render(&self) -> String {
        if self.items.is_empty() {
            return "Your cart is empty.".to_string();
        }
        let mut out = String::from("Your cart:\n");
        for (n, item) in self.items.iter().enumerate() {
            let product = item
                .product_type
                .map(|p| p.description().to_string())
                .unwrap_or_else(|| "(product not chosen)".to_string());
            let _ = writeln!(out, "{}. {} [{}]", n + 1, product, item.status);
            for leg in &item.legs {
                let _ = writeln!(
                    out,
                    "   {} {} from {} on {}: {} adult(s), {} child(ren)",
                    leg.direction,
                    leg.flight_id,
                    leg.origin_airport_id,
                    leg.travel_date,
                    leg.adult_tickets,
                    leg.child_tickets
                );
            }
        }
        let _ = write!(out, "Total tickets: {}", self.total_tickets);
        out
    }
}

/// One user's booking conversation. Owns the cart, the contact collected at
/// checkout and the conversation log; all of it is dropped at exit.
pub struct Session {
    id: Uuid,
    cart: CartStore,
    contact: Option<ContactInfo>,
    active_item: Option<ItemId>,
    history: Vec<ConversationTurn>,
    closed: bool,
    slots: SlotCollector,
    resolver: ScheduleResolver,
    checkout: CheckoutOrchestrator,
}

impl Session {
    pub fn new(collaborators: Collaborators, settings: SessionSettings) -> Self {
        let timeout = settings.call_timeout;
        let parallel = settings.max_parallel_items;
        Self {
            id: Uuid::new_v4(),
            cart: CartStore::new(),
            contact: None,
            active_item: None,
            history: Vec::new(),
            closed: false,
            slots: SlotCollector::new(collaborators.nlu.clone(), timeout),
            resolver: ScheduleResolver::new(collaborators.inventory, timeout),
            checkout: CheckoutOrchestrator::new(
                ContactCollector::new(collaborators.nlu, timeout),
                ReservationCoordinator::new(collaborators.reservations, timeout, parallel),
                collaborators.contacts,
                timeout,
                parallel,
            ),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn contact(&self) -> Option<&ContactInfo> {
        self.contact.as_ref()
    }

    pub fn active_item(&self) -> Option<ItemId> {
        self.active_item
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn submit_input(&mut self, text: &str) -> TurnReply {
        if self.closed {
            return TurnReply::plain(CLOSED_REPLY);
        }
        self.record(Role::User, text);

        let mut intent = None;
        let item_id = match self.collecting_item() {
            Some(id) => id,
            None => {
                let classified = classify(text);
                intent = Some(classified);
                if classified == Intent::General {
                    self.record(Role::Assistant, GENERAL_REPLY);
                    return TurnReply {
                        intent,
                        ..TurnReply::plain(GENERAL_REPLY)
                    };
                }
                let id = self.cart.add(CartItem::new());
                info!(session_id = %self.id, item_id = %id, "new booking started");
                self.active_item = Some(id);
                id
            }
        };

        let Some(item) = self.cart.get_mut(&item_id) else {
            self.active_item = None;
            return TurnReply::plain(GENERAL_REPLY);
        };

        let turn = self.slots.collect(item, text).await;
        let mut message = turn.message;

        if turn.progress == SlotProgress::LegsComplete {
            message = self.finish_item(item_id, message).await;
        }

        let item = self.cart.get(&item_id);
        let reply = TurnReply {
            message,
            intent,
            item_id: Some(item_id),
            item_status: item.map(|i| i.status()),
            progress: Some(turn.progress),
        };
        self.record(Role::Assistant, &reply.message);
        reply
    }

    /// Resolves schedules for a fully collected item. Either the item becomes
    /// ready and the flow resets, or the unmatched legs are dropped so they
    /// get asked for again.
    async fn finish_item(&mut self, item_id: ItemId, message: String) -> String {
        let Some(item) = self.cart.get_mut(&item_id) else {
            return message;
        };

        let unresolved = self.resolver.resolve_item(item).await;
        if unresolved.is_empty() {
            return match item.mark_ready() {
                Ok(()) => {
                    self.active_item = None;
                    let product = item.product_type().map(|p| p.description()).unwrap_or("Booking");
                    format!(
                        "{} Added to your cart: {}. Say \"checkout\" when you're done, or tell me about another flight.",
                        message, product
                    )
                    .trim_start()
                    .to_string()
                }
                Err(e) => {
                    warn!(item_id = %item_id, error = %e, "item could not be marked ready");
                    message
                }
            };
        }

        let mut notices = Vec::new();
        for direction in unresolved {
            if let Some(leg) = item.leg(direction) {
                notices.push(format!(
                    "I couldn't find flight {} from {} on {} for your {} leg.",
                    leg.flight_id(),
                    leg.origin_airport_id(),
                    leg.travel_date_iso(),
                    direction.as_str().to_lowercase()
                ));
            }
            item.discard_leg(direction);
        }
        notices.push("Please pick a different flight or date.".to_string());
        notices.join(" ")
    }

    pub fn show_cart(&self) -> CartView {
        CartView {
            items: self.cart.iter().map(CartItemView::from).collect(),
            ready_items: self.cart.list_ready().len(),
            total_tickets: self.cart.total_tickets(),
        }
    }

    pub async fn checkout(&mut self, source: &mut dyn ContactSource) -> CheckoutOutcome {
        if self.closed {
            return CheckoutOutcome::NothingToCheckOut;
        }
        let outcome = self.checkout.run(&mut self.cart, &mut self.contact, source).await;
        if let Some(id) = self.active_item {
            if !self.cart.contains(&id) {
                self.active_item = None;
            }
        }
        self.record(Role::Assistant, &outcome.message());
        outcome
    }

    /// Cancels a non-terminal item and takes it out of the cart.
    pub fn cancel_item(&mut self, item_id: &ItemId) -> Result<(), CartError> {
        let item = self
            .cart
            .get_mut(item_id)
            .ok_or(CartError::NotFound(*item_id))?;
        item.cancel()?;
        self.cart.remove(item_id);
        if self.active_item == Some(*item_id) {
            self.active_item = None;
        }
        info!(item_id = %item_id, "item cancelled");
        Ok(())
    }

    /// Ends the session. Open items are cancelled and everything the session
    /// held is dropped. Returns how many items were abandoned.
    pub fn exit(&mut self) -> usize {
        let mut abandoned = 0;
        for item in self.cart.iter_mut() {
            if item.cancel().is_ok() {
                abandoned += 1;
            }
        }
        self.cart.clear();
        self.contact = None;
        self.active_item = None;
        self.history.clear();
        self.closed = true;
        info!(session_id = %self.id, abandoned, "session closed");
        abandoned
    }

    /// The active item, if it is still being collected.
    fn collecting_item(&self) -> Option<ItemId> {
        self.active_item.filter(|id| {
            self.cart.get(id).is_some_and(|item| {
                matches!(
                    item.status(),
                    ItemStatus::CollectingProduct | ItemStatus::CollectingSchedule
                )
            })
        })
    }

    fn record(&mut self, role: Role, content: &str) {
        self.history.push(ConversationTurn {
            role,
            content: content.to_string(),
        });
    }
}
