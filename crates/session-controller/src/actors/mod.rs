//! Actor model implementation.
//!
//! ```text
//! SessionRegistryActor (singleton)
//! └── PhaseScheduler task (one per started session)
//! ```
//!
//! The registry owns all session state; schedulers read rosters back through
//! the registry mailbox and never hold session state of their own.

pub mod messages;
pub mod registry;
pub mod scheduler;

pub use messages::{Assignment, RegistryMessage, TokenTargets};
pub use registry::{generate_session_name, RegistryConfig, SessionRegistryHandle};
pub use scheduler::{PhaseScheduler, PhaseSchedulerHandle, SchedulerHost, SchedulerState};
