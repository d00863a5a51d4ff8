//! Error taxonomy for the agent.
//!
//! Layer errors are surfaced unchanged: transport and confirmation failures
//! pass through transparently, and the orchestrator is the only place that
//! decides whether an error is workflow-fatal.

use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::PendingTransactionError;
use alloy_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // ========== Precondition failures (zero transactions issued) ==========
    #[error("insufficient gas: operator holds {have} wei, need {need} wei")]
    InsufficientGas { have: U256, need: U256 },

    #[error("insufficient {token} balance for {owner}: holds {have}, need {need}")]
    InsufficientBalance {
        token: Address,
        owner: Address,
        have: U256,
        need: U256,
    },

    #[error("{layer} used before initialize()")]
    NotInitialized { layer: &'static str },

    // ========== Resolution failures ==========
    #[error("no pool found for {token_a}/{token_b}")]
    PoolNotFound { token_a: Address, token_b: Address },

    #[error("no gauge registered for pool {pool}")]
    GaugeNotFound { pool: Address },

    // ========== Route / quote ==========
    #[error("swap path is empty")]
    EmptyRoute,

    #[error("swap path does not chain at hop {hop}: {to} != {from}")]
    BrokenRoute { hop: usize, to: Address, from: Address },

    /// Non-fatal: callers fall back to a degraded minimum-output floor.
    #[error("no quote available: {0}")]
    QuoteUnavailable(String),

    // ========== On-chain write rejections ==========
    #[error("swap reverted in transaction {tx}")]
    SwapReverted { tx: TxHash },

    #[error("transfer of {token} rejected in transaction {tx}")]
    TransferRejected { token: Address, tx: TxHash },

    #[error("approval of {token} for {spender} rejected in transaction {tx}")]
    ApprovalRejected {
        token: Address,
        spender: Address,
        tx: TxHash,
    },

    #[error("liquidity operation reverted in transaction {tx}")]
    LiquidityRejected { tx: TxHash },

    #[error("gauge stake reverted in transaction {tx}")]
    StakeRejected { tx: TxHash },

    #[error("gauge unstake reverted in transaction {tx}")]
    UnstakeRejected { tx: TxHash },

    // ========== Pass-through ==========
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Confirmation(#[from] PendingTransactionError),

    #[error("failed to decode {what} return data")]
    Decode { what: &'static str },
}

impl AgentError {
    pub fn decode(what: &'static str) -> Self {
        AgentError::Decode { what }
    }
}
