//! Transfer-tax estimation
//!
//! A buy is simulated as a plain transfer of 1% of the sender's holding to the
//! receiver; a sell as the receiver swapping what it got back to the sender.
//! Whatever does not arrive on either leg is the token's fee.

mod fee_estimator;
pub mod tax;

pub use fee_estimator::{default_funding_balance, EstimatorConfig, FeeEstimator};
