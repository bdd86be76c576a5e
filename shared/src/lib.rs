pub mod dispatch;
pub mod error;
pub mod events;
pub mod ledger;
pub mod model;
pub mod params;
pub mod returns;
pub mod zone;

pub use error::LedgerError;
pub use events::{Aggregate, OutboxEvent};
pub use ledger::{OrderDraft, OrderTransition, Outcome, PlacedOrder, Placement};
pub use model::*;
pub use params::LedgerParams;
pub use returns::{ReturnDraft, ReturnTransition};
