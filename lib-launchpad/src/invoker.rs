//! Settlement Contract Invoker
//!
//! The engine never talks to a chain directly. It asks an injected
//! `ContractInvoker` to resolve the trading contract and estimate gas, and
//! hands the prepared parameters back to the caller for submission.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lib_types::ChainId;

/// A contract method call to be prepared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub chain: ChainId,
    /// Logical contract name, e.g. `tradingEngine`
    pub contract: String,
    pub method: String,
    pub args: Vec<String>,
}

/// Chain access for settlement preparation
#[async_trait]
pub trait ContractInvoker: Send + Sync {
    /// Deployed address of a logical contract
    async fn resolve_contract(&self, chain: ChainId, contract: &str) -> Result<String>;

    /// Gas units the call is expected to use
    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64>;
}

/// Address book with a fixed gas estimate
///
/// Used where no live chain is reachable. With no gas configured every
/// estimate fails and callers fall back to their default.
#[derive(Debug, Clone, Default)]
pub struct StaticContractInvoker {
    addresses: HashMap<(ChainId, String), String>,
    gas_estimate: Option<u64>,
}

impl StaticContractInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contract(
        mut self,
        chain: ChainId,
        contract: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        self.addresses.insert((chain, contract.into()), address.into());
        self
    }

    pub fn with_gas_estimate(mut self, gas: u64) -> Self {
        self.gas_estimate = Some(gas);
        self
    }
}

#[async_trait]
impl ContractInvoker for StaticContractInvoker {
    async fn resolve_contract(&self, chain: ChainId, contract: &str) -> Result<String> {
        self.addresses
            .get(&(chain, contract.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no address configured for {} on {}", contract, chain))
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64> {
        self.gas_estimate
            .ok_or_else(|| anyhow!("gas estimation unavailable for {}", call.method))
    }
}
