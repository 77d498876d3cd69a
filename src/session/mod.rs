//! Session Store, active-session registry, and per-session exchange log.

mod history;
mod registry;
mod store;

pub use history::{Exchange, ExchangeLog};
pub use registry::SessionRegistry;
pub use store::{ArtifactCounts, SessionRecord, SessionStore, SessionStoreError, document_digest};
