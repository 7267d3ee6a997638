//! Core module - the quality workflow engine and its supporting services

pub mod audit;
pub mod config;
pub mod error;
pub mod escalation;
pub mod files;
pub mod identity;
pub mod lifecycle;
pub mod measurement;
pub mod notify;
pub mod project;
pub mod registry;
pub mod roster;
pub mod sampling;
pub mod store;
pub mod tolerance;

pub use config::Config;
pub use error::EngineError;
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use notify::{MemorySink, Notification, NotificationSink, NotifyKind, NotifyOutcome, StoreSink};
pub use project::{Project, ProjectError};
pub use roster::{QualityRoster, Role, RoleDirectory, RosterMember};
pub use store::{QualityStore, StoreError};
