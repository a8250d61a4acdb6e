//! Filesystem-backed cache of downloaded video assets
//!
//! [`CacheStore`] indexes every `{id}.{ext}` file under the cache root and
//! enforces two eviction policies:
//!
//! - **Capacity**: triggered synchronously by every write; deletes the
//!   globally oldest entries until the total drops below the limit.
//! - **Idle**: a timer-driven [`IdleSweeper`] deletes entries untouched for
//!   longer than the configured threshold. Active only when both the sweep
//!   interval and the threshold are positive.

pub mod error;
pub mod eviction;
pub mod store;

pub use error::{CacheError, Result};
pub use eviction::IdleSweeper;
pub use store::{CacheEntry, CacheStore, INDEX_FILE, TEMP_FILE_PREFIX};
