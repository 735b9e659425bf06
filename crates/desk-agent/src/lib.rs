//! desk-agent: Call flow for the front desk receptionist
//!
//! Answers caller questions from the knowledge base and escalates the
//! rest to a human supervisor, holding the caller's turn until the
//! supervisor answers or the deadline passes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use desk_agent::{EscalationCoordinator, EscalationResult};
//! use desk_core::SqliteHelpRequestStore;
//!
//! let store = Arc::new(SqliteHelpRequestStore::in_memory()?);
//! let coordinator = EscalationCoordinator::new(store);
//!
//! match coordinator.escalate("Do you offer student discounts?", "caller-1", timeout).await {
//!     EscalationResult::Resolved(answer) => println!("Supervisor said: {}", answer),
//!     EscalationResult::TimedOut => println!("No answer in time"),
//!     EscalationResult::PersistenceError => println!("Try again later"),
//! }
//! ```

pub mod coordinator;
pub mod reception;
pub mod supervisor;
pub mod tool;
pub mod voice;

pub use coordinator::{EscalationCoordinator, EscalationOutcome, EscalationResult, EscalationState};
pub use reception::{Receptionist, TurnOutcome};
pub use supervisor::{Resolution, SupervisorDesk};
pub use tool::{CreateHelpRequestTool, TOOL_NAME};
pub use voice::CallerVoice;
