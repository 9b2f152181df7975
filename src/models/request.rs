use ethers::types::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize};
use crate::utils::{FeeForkError, Result};

/// One fee-estimation request as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRequest {
    /// Account whose holdings fund the simulated buy (usually the pair).
    pub sender: Address,
    /// Counterparty receiving the buy and paying the sell.
    pub receiver: Address,
    /// Token contract under test.
    pub token: Address,
    /// Carried over the wire, not used by the simulation.
    #[serde(deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub amount: U256,
}

impl FeeRequest {
    pub fn new(sender: Address, receiver: Address, token: Address) -> Self {
        Self {
            sender,
            receiver,
            token,
            amount: U256::zero(),
        }
    }

    pub fn with_amount(mut self, amount: U256) -> Self {
        self.amount = amount;
        self
    }

    /// Parse a request message. Any decoding problem is a malformed request.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| FeeForkError::MalformedRequest(e.to_string()))
    }
}

/// Wire forms accepted for `amount`.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Number(u64),
    /// `JSON.stringify` of an ethers.js BigNumber.
    BigNumber { hex: String },
}

fn parse_amount(text: &str) -> std::result::Result<U256, String> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("bad hex amount {text:?}: {e}")),
        None => U256::from_dec_str(text).map_err(|e| format!("bad decimal amount {text:?}: {e}")),
    }
}

fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    match AmountRepr::deserialize(deserializer)? {
        AmountRepr::Text(text) | AmountRepr::BigNumber { hex: text } => {
            parse_amount(&text).map_err(serde::de::Error::custom)
        }
        AmountRepr::Number(n) => Ok(U256::from(n)),
    }
}

fn serialize_amount<S>(amount: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&amount.to_string())
}
