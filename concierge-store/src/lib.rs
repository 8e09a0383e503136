pub mod app_config;
pub mod backend;
pub mod nlu_client;
pub mod offline;

pub use app_config::{Config, Mode};
pub use backend::BackendClient;
pub use nlu_client::ChatCompletionsClient;
pub use offline::{AcceptingContactDesk, DeskReservations, OfflineNlu, StaticInventory};
