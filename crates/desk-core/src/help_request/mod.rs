//! Help requests escalated to a human supervisor
//!
//! A help request is created by the escalation flow, resolved by the
//! supervisor, and observed through change subscriptions. Status only
//! ever moves `pending -> resolved`.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteHelpRequestStore;
pub use store::{ChangeEvent, HelpRequestStore, Subscription, SubscriptionId};
pub use types::{HelpRequest, HelpStatus};
