//! Backend services.

pub mod client;
pub mod hooks;
pub mod ledger;
pub mod pricing;
pub mod session_store;
pub mod transcript;

pub use client::SyncClient;
pub use hooks::{handle_event, settle_undelivered, sync_transcript};
pub use ledger::Ledger;
pub use session_store::SessionStore;
