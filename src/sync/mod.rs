//! The sync engine: the coordinator, its lock, the cursor policy, the
//! cooldown scheduler and progress events.

mod coordinator;
mod lock;
mod observer;
mod policy;
mod scheduler;

pub use coordinator::{SyncCoordinator, SyncMode, SyncResult, SyncWindow};
pub use lock::{SyncLock, SyncLockGuard};
pub use observer::{SyncEvent, SyncObserver, TracingObserver};
pub use policy::CursorStrategy;
pub use scheduler::{AutoSyncOutcome, SyncScheduler};
