pub mod request;
pub mod fee;
pub mod signer;

pub use request::FeeRequest;
pub use fee::{
    ErrorReply, Estimate, EstimateFailure, FeeResult, Stage, TaxBreakdown, FAILURE_SENTINEL,
};
pub use signer::Impersonated;
