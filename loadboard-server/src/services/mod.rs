//! Chat delivery core: clock, staleness cache, delivery cursors, polling bridge, write path.

pub mod clock;
pub mod delivery_cursor;
pub mod message_service;
pub mod poll_loop;
pub mod staleness_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delivery_cursor::DeliveryCursors;
pub use message_service::{MessageService, MessageServiceError};
pub use poll_loop::{ChatPoller, StreamSession, TickOutcome};
pub use staleness_cache::StalenessCache;
