//! Upstream chain access and the REVM fork built on it
pub mod client;
pub mod fork_db;
pub mod session;
pub mod fork_backend;

pub use client::{BlockContext, BlockchainClient};
pub use fork_db::ForkDB;
pub use session::ForkSession;
pub use fork_backend::{ForkBackend, ForkOptions, DEFAULT_GAS_LIMIT, DEFAULT_REQUEST_TIMEOUT};
