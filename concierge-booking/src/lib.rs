//! Conversational booking flow: cart items, slot filling, schedule checks,
//! reservations and checkout.

pub mod cart;
pub mod checkout;
pub mod contact;
pub mod guard;
pub mod models;
pub mod reservation;
pub mod schedule;
pub mod session;
pub mod slots;

pub use cart::{CartError, CartStore};
pub use checkout::{
    CheckoutOrchestrator, CheckoutOutcome, CheckoutSummary, ContactSource, ItemReport, ScriptedContactSource,
    SubmissionFailure,
};
pub use contact::{ContactCollector, ContactTurn};
pub use models::{CartItem, ItemId, ItemStatus};
pub use reservation::{
    ReservationCoordinator, ReservationFailure, ReservationOutcome, ReservationResult, ReservationTally,
};
pub use schedule::ScheduleResolver;
pub use session::{
    CartItemView, CartView, Collaborators, Command, ConversationTurn, Role, Session, SessionSettings, TurnReply,
};
pub use slots::{LegDraft, SlotCollector, SlotProgress, SlotTurn};
