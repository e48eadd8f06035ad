//! Data models: transcript entries in, dashboard records out.

pub mod hook;
pub mod message;
pub mod record;
pub mod session;

pub use hook::{HookEvent, HookEventKind};
pub use message::TranscriptEntry;
pub use record::{MessageRecord, Role, SyncBatch};
pub use session::SessionRecord;
