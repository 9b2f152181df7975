//! In-memory simulation backend with scripted token behaviour.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use ethers::types::{Address, U256};
use fee_fork::models::{FeeRequest, Impersonated};
use fee_fork::{FeeForkError, Result, SimulationBackend};

/// Percentages taken (or added) by a token on each leg.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tax {
    pub buy: u64,
    pub sell: u64,
    /// Extra credited to the buyer, like a reflection token
    pub bonus: u64,
}

/// Everything the backend was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Impersonate(Address),
    Fund(Address, U256),
    Balance { token: Address, owner: Address },
    Transfer { token: Address, from: Address, to: Address, amount: U256 },
    SwapBack { token: Address, from: Address, to: Address, amount: U256 },
    Height,
    Recreate(String, u64),
}

#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub impersonate: bool,
    pub funding: bool,
    pub transfer: bool,
    pub swap: bool,
    pub height: bool,
    pub recreate: bool,
}

#[derive(Debug, Default)]
struct Ledger {
    tokens: HashMap<(Address, Address), U256>,
    native: HashMap<Address, U256>,
    taxes: HashMap<Address, Tax>,
    calls: Vec<Call>,
    height: u64,
    fork_height: u64,
    failures: Failures,
    latency: Option<Duration>,
}

pub struct ScriptedBackend {
    ledger: Mutex<Ledger>,
}

impl ScriptedBackend {
    pub fn new(height: u64) -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                height,
                ..Ledger::default()
            }),
        }
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.ledger.lock().unwrap().tokens.insert((token, owner), amount);
    }

    pub fn set_tax(&self, token: Address, tax: Tax) {
        self.ledger.lock().unwrap().taxes.insert(token, tax);
    }

    pub fn set_height(&self, height: u64) {
        self.ledger.lock().unwrap().height = height;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.ledger.lock().unwrap().latency = Some(latency);
    }

    pub fn fail(&self, f: impl FnOnce(&mut Failures)) {
        f(&mut self.ledger.lock().unwrap().failures);
    }

    pub fn token_balance_of(&self, token: Address, owner: Address) -> U256 {
        self.ledger
            .lock()
            .unwrap()
            .tokens
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn native_balance_of(&self, owner: Address) -> Option<U256> {
        self.ledger.lock().unwrap().native.get(&owner).copied()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.ledger.lock().unwrap().calls.clone()
    }

    pub fn fork_height(&self) -> u64 {
        self.ledger.lock().unwrap().fork_height
    }

    pub fn recreated(&self) -> Vec<(String, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Recreate(url, height) => Some((url, height)),
                _ => None,
            })
            .collect()
    }

    /// Give other tasks a chance to run, as a real backend would.
    async fn pause(&self) {
        let latency = self.ledger.lock().unwrap().latency;
        match latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }

    fn record(&self, call: Call) {
        self.ledger.lock().unwrap().calls.push(call);
    }

    fn move_tokens(
        ledger: &mut Ledger,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
        credited: U256,
    ) -> Result<()> {
        let balance = ledger.tokens.get(&(token, from)).copied().unwrap_or_default();
        if balance < amount {
            return Err(FeeForkError::Reverted("transfer amount exceeds balance".into()));
        }
        ledger.tokens.insert((token, from), balance - amount);
        *ledger.tokens.entry((token, to)).or_default() += credited;
        Ok(())
    }
}

fn percent(amount: U256, pct: u64) -> U256 {
    amount * U256::from(pct) / U256::from(100u64)
}

#[async_trait]
impl SimulationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn impersonate(&self, address: Address) -> Result<Impersonated> {
        self.pause().await;
        self.record(Call::Impersonate(address));
        if self.ledger.lock().unwrap().failures.impersonate {
            return Err(FeeForkError::SimulationError("impersonation refused".into()));
        }
        Ok(Impersonated::new(address))
    }

    async fn set_native_balance(&self, address: Address, amount: U256) -> Result<()> {
        self.pause().await;
        self.record(Call::Fund(address, amount));
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.failures.funding {
            return Err(FeeForkError::SimulationError("setBalance refused".into()));
        }
        ledger.native.insert(address, amount);
        Ok(())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.pause().await;
        self.record(Call::Balance { token, owner });
        Ok(self.token_balance_of(token, owner))
    }

    async fn transfer_token(
        &self,
        token: Address,
        signer: &Impersonated,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.pause().await;
        let from = signer.address();
        self.record(Call::Transfer { token, from, to, amount });

        let mut ledger = self.ledger.lock().unwrap();
        if ledger.failures.transfer {
            return Err(FeeForkError::Reverted("transfer blocked".into()));
        }
        let tax = ledger.taxes.get(&token).copied().unwrap_or_default();
        let credited = amount - percent(amount, tax.buy) + percent(amount, tax.bonus);
        Self::move_tokens(&mut ledger, token, from, to, amount, credited)
    }

    async fn swap_back(
        &self,
        token: Address,
        signer: &Impersonated,
        target: Address,
        amount: U256,
    ) -> Result<()> {
        self.pause().await;
        let from = signer.address();
        self.record(Call::SwapBack { token, from, to: target, amount });

        let mut ledger = self.ledger.lock().unwrap();
        if ledger.failures.swap {
            return Err(FeeForkError::Reverted("swap blocked".into()));
        }
        let tax = ledger.taxes.get(&token).copied().unwrap_or_default();
        let credited = amount - percent(amount, tax.sell);
        Self::move_tokens(&mut ledger, token, from, target, amount, credited)
    }

    async fn chain_height(&self) -> Result<u64> {
        self.pause().await;
        self.record(Call::Height);
        let ledger = self.ledger.lock().unwrap();
        if ledger.failures.height {
            return Err(FeeForkError::SimulationError("node unreachable".into()));
        }
        Ok(ledger.height)
    }

    async fn recreate_session(&self, fork_url: &str, height: u64) -> Result<()> {
        self.pause().await;
        self.record(Call::Recreate(fork_url.to_string(), height));
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.failures.recreate {
            return Err(FeeForkError::SimulationError("fork failed".into()));
        }
        ledger.fork_height = height;
        Ok(())
    }
}

pub fn address(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

/// Request `n` uses its own token, sender and receiver.
pub fn request(n: u64) -> FeeRequest {
    FeeRequest::new(address(0x1000 + n), address(0x2000 + n), address(0x3000 + n))
}

/// Backend where request `n`'s sender holds `balance` of its token.
pub fn funded_backend(requests: &[FeeRequest], balance: u64) -> ScriptedBackend {
    let backend = ScriptedBackend::new(1_000);
    for request in requests {
        backend.set_token_balance(request.token, request.sender, U256::from(balance));
    }
    backend
}
