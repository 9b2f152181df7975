//! The call used to simulate a sell.
//!
//! Tokens differ in how a holder sells back, so the function is configurable.
//! It is sent to the token contract by the receiver with `(target, amount)`
//! and must therefore take exactly `(address,uint256)`.

use std::fmt;
use std::str::FromStr;
use ethers::abi::{self, Token};
use ethers::types::{Address, U256};
use crate::utils::FeeForkError;

pub const DEFAULT_SWAP_BACK_SIGNATURE: &str = "swapExactTokensForTokens(address,uint256)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapBackCall {
    signature: String,
    selector: [u8; 4],
}

impl SwapBackCall {
    pub fn parse(signature: &str) -> Result<Self, FeeForkError> {
        let compact: String = signature.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = |why: &str| FeeForkError::ConfigError(format!("swap-back signature {:?}: {}", signature, why));

        let (name, params) = compact
            .strip_suffix(')')
            .and_then(|s| s.split_once('('))
            .ok_or_else(|| invalid("expected name(address,uint256)"))?;

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("bad function name"));
        }
        if params != "address,uint256" && params != "address,uint" {
            return Err(invalid("parameters must be (address,uint256)"));
        }

        let canonical = format!("{}(address,uint256)", name);
        let selector = ethers::utils::id(&canonical);

        Ok(Self {
            signature: canonical,
            selector,
        })
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn selector(&self) -> [u8; 4] {
        self.selector
    }

    /// Calldata for `target`, `amount`
    pub fn encode(&self, target: Address, amount: U256) -> Vec<u8> {
        let mut calldata = self.selector.to_vec();
        calldata.extend(abi::encode(&[Token::Address(target), Token::Uint(amount)]));
        calldata
    }
}

impl Default for SwapBackCall {
    fn default() -> Self {
        Self::parse(DEFAULT_SWAP_BACK_SIGNATURE).expect("default swap-back signature is valid")
    }
}

impl FromStr for SwapBackCall {
    type Err = FeeForkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SwapBackCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_signature() {
        let call = SwapBackCall::default();
        assert_eq!(call.signature(), DEFAULT_SWAP_BACK_SIGNATURE);
        assert_eq!(call.selector(), ethers::utils::id(DEFAULT_SWAP_BACK_SIGNATURE));
    }

    #[test]
    fn test_encode_layout() {
        let call = SwapBackCall::default();
        let target = Address::from_low_u64_be(0xbeef);
        let data = call.encode(target, U256::from(100u64));

        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &call.selector());
        assert_eq!(&data[16..36], target.as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(100u64));
    }

    #[test]
    fn test_signature_is_normalized() {
        let call: SwapBackCall = "sellTo( address , uint )".parse().unwrap();
        assert_eq!(call.signature(), "sellTo(address,uint256)");
    }

    #[test]
    fn test_rejects_other_shapes() {
        assert!(SwapBackCall::parse("swap(uint256,address)").is_err());
        assert!(SwapBackCall::parse("swap(address)").is_err());
        assert!(SwapBackCall::parse("swap").is_err());
        assert!(SwapBackCall::parse("(address,uint256)").is_err());
        assert!(SwapBackCall::parse("sw-ap(address,uint256)").is_err());
    }
}
