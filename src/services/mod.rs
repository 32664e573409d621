// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod push;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use push::{Notifier, PushClient, PushError, PushNotification};
pub use store::{Store, StoreError, StoreResult};
