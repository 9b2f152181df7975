//! Contract call encodings used by the fork backend
pub mod erc20;
pub mod swap_back;

pub use swap_back::{SwapBackCall, DEFAULT_SWAP_BACK_SIGNATURE};
