use ethers::types::Address;

/// Capability to send transactions as `address` inside a simulation session.
///
/// Only a backend hands these out, from `impersonate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Impersonated {
    address: Address,
}

impl Impersonated {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}
