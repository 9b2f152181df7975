pub mod blockchain;
pub mod config;
pub mod contracts;
pub mod core;
pub mod estimator;
pub mod models;
pub mod server;
pub mod utils;

pub use core::{RequestCoordinator, ResetScheduler, SessionLock, SimulationBackend};
pub use estimator::FeeEstimator;
pub use models::{FeeRequest, FeeResult};
pub use utils::{FeeForkError, Result};
