//! Fungible-token operations, each scoped to one token address.
//!
//! The approval path is idempotent: an allowance that already covers the
//! requested amount issues no write at all, and a nonzero-but-insufficient
//! allowance is reset to zero before the new value is set, since some tokens
//! reject direct nonzero-to-nonzero allowance changes.

use alloy_primitives::{Address, TxHash, U256};
use alloy_sol_types::{sol, SolCall};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::amount::TokenAmount;
use crate::chain::Chain;
use crate::error::AgentError;

sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
        function transfer(address to, uint256 value) external returns (bool);
        function transferFrom(address from, address to, uint256 value) external returns (bool);
    }
}

/// Outcome of an approval request. A `NoOp` issued zero writes and must not
/// be recorded as a committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    NoOp,
    Submitted(TxHash),
}

pub struct Tokens {
    chain: Arc<dyn Chain>,
    /// Decimal precision is immutable per token; cached after first read.
    decimals_cache: RwLock<HashMap<Address, u8>>,
}

impl Tokens {
    pub fn new(chain: Arc<dyn Chain>) -> Self {
        Self {
            chain,
            decimals_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Balance and precision for `owner` (default: the operator).
    pub async fn balance_of(
        &self,
        token: Address,
        owner: Option<Address>,
    ) -> Result<TokenAmount, AgentError> {
        let owner = owner.unwrap_or_else(|| self.chain.operator());
        let raw = self.raw_balance(token, owner).await?;
        let decimals = self.decimals(token).await?;
        Ok(TokenAmount::new(raw, decimals))
    }

    pub async fn raw_balance(&self, token: Address, owner: Address) -> Result<U256, AgentError> {
        let data = IERC20::balanceOfCall { owner }.abi_encode();
        let out = self.chain.call(token, data).await?;
        IERC20::balanceOfCall::abi_decode_returns(&out).map_err(|_| AgentError::decode("balanceOf"))
    }

    pub async fn decimals(&self, token: Address) -> Result<u8, AgentError> {
        if let Some(cached) = self.decimals_cache.read().unwrap().get(&token) {
            return Ok(*cached);
        }

        let out = self.chain.call(token, IERC20::decimalsCall {}.abi_encode()).await?;
        let decimals = IERC20::decimalsCall::abi_decode_returns(&out)
            .map_err(|_| AgentError::decode("decimals"))?;

        self.decimals_cache.write().unwrap().insert(token, decimals);
        Ok(decimals)
    }

    pub async fn symbol(&self, token: Address) -> Result<String, AgentError> {
        let out = self.chain.call(token, IERC20::symbolCall {}.abi_encode()).await?;
        IERC20::symbolCall::abi_decode_returns(&out).map_err(|_| AgentError::decode("symbol"))
    }

    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AgentError> {
        let data = IERC20::allowanceCall { owner, spender }.abi_encode();
        let out = self.chain.call(token, data).await?;
        IERC20::allowanceCall::abi_decode_returns(&out).map_err(|_| AgentError::decode("allowance"))
    }

    /// Grant `spender` an allowance of at least `amount` from the operator.
    ///
    /// Reads the current allowance first: if it already covers `amount`, no
    /// write happens and [`Approval::NoOp`] is returned. Every write blocks
    /// until confirmed before this returns.
    pub async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<Approval, AgentError> {
        let operator = self.chain.operator();
        let current = self.allowance(token, operator, spender).await?;

        if current >= amount {
            debug!(
                "allowance of {:?} for {:?} already covers {}, skipping approve",
                token, spender, amount
            );
            return Ok(Approval::NoOp);
        }

        if !current.is_zero() {
            let reset = IERC20::approveCall {
                spender,
                value: U256::ZERO,
            }
            .abi_encode();
            let sent = self.chain.send(token, reset).await?;
            if !sent.success {
                return Err(AgentError::ApprovalRejected {
                    token,
                    spender,
                    tx: sent.hash,
                });
            }
        }

        let data = IERC20::approveCall {
            spender,
            value: amount,
        }
        .abi_encode();
        let sent = self.chain.send(token, data).await?;
        if !sent.success {
            return Err(AgentError::ApprovalRejected {
                token,
                spender,
                tx: sent.hash,
            });
        }

        Ok(Approval::Submitted(sent.hash))
    }

    /// Move tokens from a third party to `to`, spending the allowance that
    /// `from` granted the operator. Prerequisites are not pre-checked here;
    /// a revert surfaces as [`AgentError::TransferRejected`].
    pub async fn transfer_from(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, AgentError> {
        let data = IERC20::transferFromCall {
            from,
            to,
            value: amount,
        }
        .abi_encode();
        let sent = self.chain.send(token, data).await?;
        if !sent.success {
            return Err(AgentError::TransferRejected {
                token,
                tx: sent.hash,
            });
        }
        Ok(sent.hash)
    }

    /// Move operator-owned tokens to `to`.
    pub async fn transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, AgentError> {
        let data = IERC20::transferCall { to, value: amount }.abi_encode();
        let sent = self.chain.send(token, data).await?;
        if !sent.success {
            return Err(AgentError::TransferRejected {
                token,
                tx: sent.hash,
            });
        }
        Ok(sent.hash)
    }
}

// ============================================
// TESTS
// ============================================
