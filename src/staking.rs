//! Staking integration: the reward gauge for the target pool.
//!
//! The gauge address is resolved through the exchange's gauge registry and
//! requires an already-resolved pool, so this layer initializes strictly
//! after the exchange layer.

use alloy_primitives::{Address, TxHash, U256};
use alloy_sol_types::{sol, SolCall};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::amount::TokenAmount;
use crate::chain::Chain;
use crate::error::AgentError;

sol! {
    interface IVoter {
        function gauges(address pool) external view returns (address);
    }

    interface IGauge {
        function deposit(uint256 amount) external;
        function withdraw(uint256 amount) external;
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GaugeReference {
    pub pool: Address,
    pub address: Address,
}

pub struct Staking {
    chain: Arc<dyn Chain>,
    voter: Address,
    lp_decimals: u8,
    gauge: Option<GaugeReference>,
}

impl Staking {
    pub fn new(chain: Arc<dyn Chain>, voter: Address) -> Self {
        Self {
            chain,
            voter,
            lp_decimals: 18,
            gauge: None,
        }
    }

    /// Resolve the gauge for `pool` via the registry. Must run after pool
    /// resolution; fails with `GaugeNotFound` when no gauge exists.
    pub async fn initialize(
        &mut self,
        pool: Address,
        lp_decimals: u8,
    ) -> Result<GaugeReference, AgentError> {
        let data = IVoter::gaugesCall { pool }.abi_encode();
        let out = self.chain.call(self.voter, data).await?;
        let address = IVoter::gaugesCall::abi_decode_returns(&out)
            .map_err(|_| AgentError::decode("gauges"))?;

        if address.is_zero() {
            return Err(AgentError::GaugeNotFound { pool });
        }

        let gauge = GaugeReference { pool, address };
        debug!("resolved gauge {:?} for pool {:?}", address, pool);
        self.lp_decimals = lp_decimals;
        self.gauge = Some(gauge);
        Ok(gauge)
    }

    pub fn gauge(&self) -> Result<&GaugeReference, AgentError> {
        self.gauge
            .as_ref()
            .ok_or(AgentError::NotInitialized { layer: "staking" })
    }

    /// Deposit LP tokens into the gauge on the operator's behalf. The gauge
    /// pulls via allowance, which the caller must have sequenced first.
    pub async fn stake(&self, amount: U256) -> Result<TxHash, AgentError> {
        let gauge = self.gauge()?;
        let data = IGauge::depositCall { amount }.abi_encode();
        let sent = self.chain.send(gauge.address, data).await?;
        if !sent.success {
            return Err(AgentError::StakeRejected { tx: sent.hash });
        }
        Ok(sent.hash)
    }

    /// Withdraw LP tokens from the gauge back to the operator.
    pub async fn unstake(&self, amount: U256) -> Result<TxHash, AgentError> {
        let gauge = self.gauge()?;
        let data = IGauge::withdrawCall { amount }.abi_encode();
        let sent = self.chain.send(gauge.address, data).await?;
        if !sent.success {
            return Err(AgentError::UnstakeRejected { tx: sent.hash });
        }
        Ok(sent.hash)
    }

    /// Staked balance for workflow paths: errors propagate.
    pub async fn staked_balance(
        &self,
        account: Option<Address>,
    ) -> Result<TokenAmount, AgentError> {
        let gauge = self.gauge()?;
        let account = account.unwrap_or_else(|| self.chain.operator());
        let data = IGauge::balanceOfCall { account }.abi_encode();
        let out = self.chain.call(gauge.address, data).await?;
        let raw = IGauge::balanceOfCall::abi_decode_returns(&out)
            .map_err(|_| AgentError::decode("gauge balanceOf"))?;
        Ok(TokenAmount::new(raw, self.lp_decimals))
    }

    /// Display-path variant: degrades to zero on read failure instead of
    /// propagating, so a rate-limited gateway cannot break status output.
    /// Never used for correctness-critical reads inside workflows.
    pub async fn staked_balance_or_zero(&self, account: Option<Address>) -> TokenAmount {
        match self.staked_balance(account).await {
            Ok(amount) => amount,
            Err(e) => {
                warn!("staked balance read degraded to zero: {}", e);
                TokenAmount::zero(self.lp_decimals)
            }
        }
    }

    pub async fn total_staked(&self) -> Result<TokenAmount, AgentError> {
        let gauge = self.gauge()?;
        let out = self
            .chain
            .call(gauge.address, IGauge::totalSupplyCall {}.abi_encode())
            .await?;
        let raw = IGauge::totalSupplyCall::abi_decode_returns(&out)
            .map_err(|_| AgentError::decode("totalSupply"))?;
        Ok(TokenAmount::new(raw, self.lp_decimals))
    }
}

// ============================================
// TESTS
// ============================================
