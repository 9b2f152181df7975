pub mod traits;
pub mod lock;
pub mod coordinator;
pub mod scheduler;

pub use traits::{ResponseSink, SimulationBackend};
pub use lock::{SessionGuard, SessionLock};
pub use coordinator::RequestCoordinator;
pub use scheduler::{ResetConfig, ResetScheduler, DEFAULT_RESET_LAG};
