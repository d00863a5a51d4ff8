//! Ledger access: the operator identity, read calls, and confirmed writes.
//!
//! Every higher layer talks to the chain through the [`Chain`] trait. The
//! live implementation wraps one wallet-filled alloy provider built at
//! startup; tests substitute an in-memory mock. Writes block until the
//! transaction is confirmed, with a client-side timeout bound.

#[cfg(test)]
pub(crate) mod mock;

use alloy_network::EthereumWallet;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AgentError;

/// A confirmed write: its hash plus whether it executed successfully.
#[derive(Debug, Clone, Copy)]
pub struct SentTx {
    pub hash: TxHash,
    pub success: bool,
}

/// Chain access capability passed by reference to every higher layer.
#[async_trait]
pub trait Chain: Send + Sync {
    /// The single custodial signing identity behind every write.
    fn operator(&self) -> Address;

    /// Read-only contract call.
    async fn call(&self, to: Address, calldata: Vec<u8>) -> Result<Bytes, AgentError>;

    /// Submit a write and block until it is confirmed on the ledger.
    async fn send(&self, to: Address, calldata: Vec<u8>) -> Result<SentTx, AgentError>;

    /// Operator's native-currency balance in wei.
    async fn native_balance(&self) -> Result<U256, AgentError>;

    /// Fail with [`AgentError::InsufficientGas`] when the operator's native
    /// balance is below `min`. Balance can move between this check and the
    /// next write, so callers re-check before each write-heavy workflow.
    async fn ensure_gas(&self, min: U256) -> Result<(), AgentError> {
        let have = self.native_balance().await?;
        if have < min {
            return Err(AgentError::InsufficientGas { have, need: min });
        }
        Ok(())
    }
}

// ============================================
// LIVE LEDGER
// ============================================

pub struct Ledger {
    provider: DynProvider,
    operator: Address,
    tx_timeout: Duration,
}

impl Ledger {
    /// Parse the operator key and build the wallet-filled provider used for
    /// the whole process lifetime.
    pub fn connect(config: &Config) -> Result<Self> {
        let key = config
            .agent_private_key
            .as_deref()
            .ok_or_else(|| eyre!("AGENT_PRIVATE_KEY is not set"))?;

        let signer = PrivateKeySigner::from_str(key.trim_start_matches("0x"))
            .map_err(|e| eyre!("invalid AGENT_PRIVATE_KEY: {}", e))?;
        let operator = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(config.rpc_url.parse()?)
            .erased();

        info!("connected to {} as operator {:?}", config.rpc_url, operator);

        Ok(Self {
            provider,
            operator,
            tx_timeout: Duration::from_secs(config.tx_timeout_secs),
        })
    }
}

#[async_trait]
impl Chain for Ledger {
    fn operator(&self) -> Address {
        self.operator
    }

    async fn call(&self, to: Address, calldata: Vec<u8>) -> Result<Bytes, AgentError> {
        let tx = TransactionRequest::default().to(to).input(calldata.into());
        Ok(self.provider.call(tx).await?)
    }

    async fn send(&self, to: Address, calldata: Vec<u8>) -> Result<SentTx, AgentError> {
        let tx = TransactionRequest::default()
            .from(self.operator)
            .to(to)
            .input(calldata.into());

        let pending = self.provider.send_transaction(tx).await?;
        let hash = *pending.tx_hash();
        debug!("submitted {:?} to {:?}, awaiting confirmation", hash, to);

        let receipt = pending
            .with_timeout(Some(self.tx_timeout))
            .get_receipt()
            .await?;

        debug!(
            "confirmed {:?} in block {:?} (success: {})",
            hash,
            receipt.block_number,
            receipt.status()
        );

        Ok(SentTx {
            hash: receipt.transaction_hash,
            success: receipt.status(),
        })
    }

    async fn native_balance(&self) -> Result<U256, AgentError> {
        Ok(self.provider.get_balance(self.operator).await?)
    }
}

// ============================================
// READ PACING
// ============================================

/// Inter-read pacing policy for display paths. Throttling for gateway rate
/// ceilings, not a correctness mechanism; workflow writes never depend on
/// it.
#[derive(Debug, Clone, Copy)]
pub enum PacingPolicy {
    None,
    /// Constant delay between reads.
    Fixed(Duration),
    /// Starts at `start`, doubles on every rate-limited response up to
    /// `max`, resets once reads succeed again.
    AdaptiveBackoff { start: Duration, max: Duration },
}

impl PacingPolicy {
    fn initial(&self) -> Duration {
        match self {
            PacingPolicy::None => Duration::ZERO,
            PacingPolicy::Fixed(d) => *d,
            PacingPolicy::AdaptiveBackoff { start, .. } => *start,
        }
    }
}

pub struct ReadThrottle {
    policy: PacingPolicy,
    current: std::sync::Mutex<Duration>,
}

impl ReadThrottle {
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            current: std::sync::Mutex::new(policy.initial()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        if config.read_throttle_ms == 0 {
            Self::new(PacingPolicy::None)
        } else {
            Self::new(PacingPolicy::Fixed(Duration::from_millis(
                config.read_throttle_ms,
            )))
        }
    }

    pub async fn pause(&self) {
        let delay = *self.current.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Widen the interval after a rate-limited response.
    pub fn note_rate_limited(&self) {
        if let PacingPolicy::AdaptiveBackoff { start, max } = self.policy {
            let mut current = self.current.lock().unwrap();
            let doubled = if current.is_zero() { start } else { *current * 2 };
            *current = doubled.min(max);
        }
    }

    /// Reads are flowing again; fall back to the initial interval.
    pub fn note_success(&self) {
        *self.current.lock().unwrap() = self.policy.initial();
    }
}
