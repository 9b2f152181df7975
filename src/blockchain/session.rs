//! One forked simulation session: a REVM cache over upstream state.

use ethers::types::{Address, U256};
use revm::db::{AccountState, CacheDB};
use revm::primitives::{
    Bytes as RevmBytes, Env, ExecutionResult, Output, TransactTo, U256 as RevmU256,
};
use revm::db::DatabaseRef;
use revm::EVM;
use crate::blockchain::client::BlockContext;
use crate::blockchain::fork_db::{to_revm_address, to_revm_u256};
use crate::utils::{FeeForkError, Result};

/// Mutable state forked at one block. Writes stay in the cache and are lost on
/// the next fork.
pub struct ForkSession<DB: DatabaseRef> {
    /// `None` only while a transaction is executing
    db: Option<CacheDB<DB>>,
    block: BlockContext,
    chain_id: u64,
    gas_limit: u64,
}

impl<DB> ForkSession<DB>
where
    DB: DatabaseRef,
    DB::Error: std::fmt::Debug,
{
    pub fn new(db: DB, block: BlockContext, chain_id: u64, gas_limit: u64) -> Self {
        Self {
            db: Some(CacheDB::new(db)),
            block,
            chain_id,
            gas_limit,
        }
    }

    pub fn block(&self) -> BlockContext {
        self.block
    }

    /// Overwrite the native balance of `address`.
    pub fn set_balance(&mut self, address: Address, amount: U256) -> Result<()> {
        let db = self.db_mut()?;
        let account = db
            .load_account(to_revm_address(address))
            .map_err(|e| FeeForkError::SimulationError(format!("Failed to load {:?}: {:?}", address, e)))?;

        if matches!(account.account_state, AccountState::NotExisting) {
            account.account_state = AccountState::None;
        }
        account.info.balance = to_revm_u256(amount);

        tracing::trace!("Set native balance of {:?} to {}", address, amount);
        Ok(())
    }

    /// Execute a call without keeping its state changes and return the output.
    pub fn call(&mut self, caller: Address, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        self.execute(caller, to, data, false)
    }

    /// Execute and commit a transaction sent by `caller`; returns the output.
    pub fn send(&mut self, caller: Address, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        self.execute(caller, to, data, true)
    }

    fn db_mut(&mut self) -> Result<&mut CacheDB<DB>> {
        self.db.as_mut().ok_or_else(|| {
            FeeForkError::SimulationError("Session state lost by an interrupted transaction".into())
        })
    }

    fn configure(&self, env: &mut Env, caller: Address, to: Address, data: Vec<u8>) {
        env.cfg.chain_id = self.chain_id;
        // Impersonated callers may be contracts (e.g. the pair itself)
        env.cfg.disable_eip3607 = true;

        env.block.number = RevmU256::from(self.block.number);
        env.block.timestamp = RevmU256::from(self.block.timestamp);
        env.block.basefee = RevmU256::ZERO;

        env.tx.caller = to_revm_address(caller);
        env.tx.transact_to = TransactTo::Call(to_revm_address(to));
        env.tx.data = RevmBytes::from(data);
        env.tx.value = RevmU256::ZERO;
        env.tx.gas_limit = self.gas_limit;
        env.tx.gas_price = RevmU256::ZERO;
        env.tx.nonce = None;
    }

    fn execute(&mut self, caller: Address, to: Address, data: Vec<u8>, commit: bool) -> Result<Vec<u8>> {
        let db = self.db.take().ok_or_else(|| {
            FeeForkError::SimulationError("Session state lost by an interrupted transaction".into())
        })?;

        let mut evm: EVM<CacheDB<DB>> = EVM::new();
        self.configure(&mut evm.env, caller, to, data);
        evm.database(db);

        let outcome = if commit {
            evm.transact_commit()
        } else {
            evm.transact().map(|result_and_state| result_and_state.result)
        };
        self.db = evm.db.take();

        let result = outcome
            .map_err(|e| FeeForkError::SimulationError(format!("REVM exec failed: {:?}", e)))?;

        match result {
            ExecutionResult::Success { gas_used, output, .. } => {
                tracing::trace!("Call to {:?} from {:?} succeeded, gas={}", to, caller, gas_used);
                let data = match output {
                    Output::Call(data) => data,
                    Output::Create(data, _) => data,
                };
                Ok(data.to_vec())
            }
            ExecutionResult::Revert { output, .. } => Err(FeeForkError::Reverted(parse_revert(&output))),
            ExecutionResult::Halt { reason, .. } => {
                Err(FeeForkError::Reverted(format!("Halted: {:?}", reason)))
            }
        }
    }
}

/// Decode an `Error(string)` revert payload, or hex-dump the start of it.
pub fn parse_revert(output: &[u8]) -> String {
    if output.is_empty() {
        return "No reason".to_string();
    }

    // Error(string): selector, offset word, length word, data
    if output.len() >= 68 && output[0..4] == [0x08, 0xc3, 0x79, 0xa0] {
        let len = U256::from_big_endian(&output[36..68]);
        if len <= U256::from(output.len() - 68) {
            let len = len.as_usize();
            if let Ok(msg) = std::str::from_utf8(&output[68..68 + len]) {
                return msg.to_string();
            }
        }
    }

    format!("0x{}", hex::encode(&output[..output.len().min(32)]))
}
