//! Workflow orchestration: the deposit and withdrawal state machines.
//!
//! The orchestrator is the only layer that sequences the ledger, token,
//! exchange, and staking layers, and the only one that decides whether an
//! error is workflow-fatal. Steps run strictly sequentially; every write is
//! confirmed before the next step starts, because each step's inputs are the
//! *settled* outputs of the previous one.
//!
//! On a mid-workflow failure nothing is compensated or rolled back: earlier
//! steps' effects stay committed on the ledger, and the result carries the
//! prefix of committed transaction hashes plus the raw error. Recovery is an
//! out-of-band operator action.
//!
//! Concurrent invocations against the same operator identity are
//! unsupported: every step assumes exclusive use of the operator's nonce,
//! allowance, and balance state, and no internal locking is provided.

mod deposit;
mod withdraw;

use alloy_primitives::{Address, TxHash, U256};
use std::sync::Arc;
use tracing::{info, warn};

use crate::amount::TokenAmount;
use crate::chain::{Chain, ReadThrottle};
use crate::config::{Config, SLIPPAGE_RECOMMENDED_MAX_BPS, SLIPPAGE_RECOMMENDED_MIN_BPS};
use crate::error::AgentError;
use crate::exchange::{Exchange, ExchangeParams, PoolKind};
use crate::staking::Staking;
use crate::token::{Approval, Tokens};

// ============================================
// INTENTS AND RESULTS
// ============================================

/// Immutable input to one deposit execution.
#[derive(Debug, Clone, Copy)]
pub struct DepositIntent {
    pub user: Address,
    pub amount: TokenAmount,
    pub slippage_bps: u16,
}

/// Immutable input to one withdrawal execution.
#[derive(Debug, Clone, Copy)]
pub struct WithdrawIntent {
    pub user: Address,
    pub lp_amount: TokenAmount,
    pub slippage_bps: u16,
}

/// Outcome of one workflow invocation. Produced once, never retried
/// internally. `transactions` holds every committed write in order; no-op
/// approvals are excluded.
#[derive(Debug)]
pub struct WorkflowResult {
    pub success: bool,
    pub transactions: Vec<TxHash>,
    pub final_amount: TokenAmount,
    pub error: Option<AgentError>,
}

impl WorkflowResult {
    fn completed(journal: TxJournal, final_amount: TokenAmount) -> Self {
        Self {
            success: true,
            transactions: journal.into_hashes(),
            final_amount,
            error: None,
        }
    }

    fn failed(journal: TxJournal, decimals: u8, error: AgentError) -> Self {
        Self {
            success: false,
            transactions: journal.into_hashes(),
            final_amount: TokenAmount::zero(decimals),
            error: Some(error),
        }
    }

    fn nothing_to_withdraw(decimals: u8) -> Self {
        Self {
            success: false,
            transactions: Vec::new(),
            final_amount: TokenAmount::zero(decimals),
            error: None,
        }
    }

    /// Valid terminal outcome that executed nothing and is not a failure
    /// (e.g. withdraw-all with nothing staked).
    pub fn nothing_executed(&self) -> bool {
        !self.success && self.error.is_none() && self.transactions.is_empty()
    }
}

/// Ordered record of committed transaction hashes. Idempotent approvals
/// that issued no write never enter the journal.
#[derive(Debug, Default)]
struct TxJournal {
    hashes: Vec<TxHash>,
}

impl TxJournal {
    fn record(&mut self, tx: TxHash) {
        self.hashes.push(tx);
    }

    fn record_approval(&mut self, approval: Approval) {
        if let Approval::Submitted(tx) = approval {
            self.hashes.push(tx);
        }
    }

    fn into_hashes(self) -> Vec<TxHash> {
        self.hashes
    }
}

fn warn_on_unusual_slippage(bps: u16) {
    if !(SLIPPAGE_RECOMMENDED_MIN_BPS..=SLIPPAGE_RECOMMENDED_MAX_BPS).contains(&bps) {
        warn!(
            "slippage tolerance {} bps is outside the recommended {}-{} bps band",
            bps, SLIPPAGE_RECOMMENDED_MIN_BPS, SLIPPAGE_RECOMMENDED_MAX_BPS
        );
    }
}

// ============================================
// ENGINE
// ============================================

pub struct EngineSettings {
    pub router: Address,
    pub factory: Address,
    pub voter: Address,
    pub stable: Address,
    pub token_a: Address,
    pub token_b: Address,
    pub pool_stable: bool,
    pub deadline_secs: u64,
    pub lp_slippage_bps: u16,
    pub gas_floor_wei: u128,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        Ok(Self {
            router: config.router()?,
            factory: config.pool_factory()?,
            voter: config.voter()?,
            stable: config.stable_token()?,
            token_a: config.token_a()?,
            token_b: config.token_b()?,
            pool_stable: config.pool_stable,
            deadline_secs: config.swap_deadline_secs,
            lp_slippage_bps: config.lp_slippage_bps,
            gas_floor_wei: config.gas_floor_wei,
        })
    }
}

pub struct WorkflowEngine {
    chain: Arc<dyn Chain>,
    tokens: Arc<Tokens>,
    exchange: Exchange,
    staking: Staking,
    stable: Address,
    gas_floor: U256,
}

impl WorkflowEngine {
    /// Bring the whole stack up in dependency order: ledger is already
    /// connected, then the pool resolves, then the gauge resolves from the
    /// pool. Ready to run workflows on return.
    pub async fn initialize(
        chain: Arc<dyn Chain>,
        settings: EngineSettings,
    ) -> Result<Self, AgentError> {
        let tokens = Arc::new(Tokens::new(chain.clone()));

        let mut exchange = Exchange::new(
            chain.clone(),
            tokens.clone(),
            ExchangeParams {
                router: settings.router,
                factory: settings.factory,
                token_a: settings.token_a,
                token_b: settings.token_b,
                kind: PoolKind::from_flag(settings.pool_stable),
                deadline_secs: settings.deadline_secs,
                lp_slippage_bps: settings.lp_slippage_bps,
            },
        );
        let pool = exchange.initialize().await?;
        let lp_decimals = tokens.decimals(pool.address).await?;

        let mut staking = Staking::new(chain.clone(), settings.voter);
        staking.initialize(pool.address, lp_decimals).await?;

        info!(
            "engine ready: pool {:?}, gauge {:?}",
            pool.address,
            staking.gauge()?.address
        );

        Ok(Self {
            chain,
            tokens,
            exchange,
            staking,
            stable: settings.stable,
            gas_floor: U256::from(settings.gas_floor_wei),
        })
    }

    pub fn operator(&self) -> Address {
        self.chain.operator()
    }

    pub fn pool_address(&self) -> Result<Address, AgentError> {
        Ok(self.exchange.pool()?.address)
    }

    pub fn gauge_address(&self) -> Result<Address, AgentError> {
        Ok(self.staking.gauge()?.address)
    }

    pub async fn stable_decimals(&self) -> Result<u8, AgentError> {
        self.tokens.decimals(self.stable).await
    }

    pub async fn lp_decimals(&self) -> Result<u8, AgentError> {
        self.tokens.decimals(self.exchange.lp_token()?).await
    }

    // ========== Diagnostics ==========

    /// Operator-facing snapshot for the status verb. Reads are paced by the
    /// throttle and the staked balance uses the degraded (zero-on-failure)
    /// path, so a rate-limited gateway cannot break status output.
    pub async fn status(&self, throttle: &ReadThrottle) -> Result<StatusReport, AgentError> {
        let operator = self.chain.operator();
        let pool = self.exchange.pool()?.address;

        let native_wei = self.chain.native_balance().await?;
        throttle.pause().await;

        let stable_symbol = self.tokens.symbol(self.stable).await?;
        let stable_balance = self.tokens.balance_of(self.stable, None).await?;
        throttle.pause().await;

        let token_a = self.exchange.pool()?.token_a;
        let token_a_symbol = self.tokens.symbol(token_a).await?;
        let token_a_balance = self.tokens.balance_of(token_a, None).await?;
        throttle.pause().await;

        let token_b = self.exchange.pool()?.token_b;
        let token_b_symbol = self.tokens.symbol(token_b).await?;
        let token_b_balance = self.tokens.balance_of(token_b, None).await?;
        throttle.pause().await;

        let lp_wallet = self.tokens.balance_of(pool, None).await?;
        throttle.pause().await;

        let staked = self.staking.staked_balance_or_zero(Some(operator)).await;
        throttle.pause().await;
        let total_staked = self.staking.total_staked().await?;

        Ok(StatusReport {
            operator,
            native_wei,
            stable: (stable_symbol, stable_balance),
            token_a: (token_a_symbol, token_a_balance),
            token_b: (token_b_symbol, token_b_balance),
            lp_wallet,
            staked,
            total_staked,
            pool,
            gauge: self.staking.gauge()?.address,
        })
    }
}

#[derive(Debug)]
pub struct StatusReport {
    pub operator: Address,
    pub native_wei: U256,
    pub stable: (String, TokenAmount),
    pub token_a: (String, TokenAmount),
    pub token_b: (String, TokenAmount),
    pub lp_wallet: TokenAmount,
    pub staked: TokenAmount,
    pub total_staked: TokenAmount,
    pub pool: Address,
    pub gauge: Address,
}

// ============================================
// TESTS (shared engine fixture)
// ============================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chain::mock::{self, MockChain};

    pub(crate) async fn engine() -> (Arc<MockChain>, WorkflowEngine) {
        let chain = Arc::new(MockChain::new());
        chain.set_decimals(mock::STABLE, 6);
        let engine = WorkflowEngine::initialize(
            chain.clone() as Arc<dyn Chain>,
            EngineSettings {
                router: mock::ROUTER,
                factory: mock::FACTORY,
                voter: mock::VOTER,
                stable: mock::STABLE,
                token_a: mock::TOKEN_A,
                token_b: mock::TOKEN_B,
                pool_stable: false,
                deadline_secs: 20 * 60,
                lp_slippage_bps: 0,
                gas_floor_wei: 1_000,
            },
        )
        .await
        .unwrap();
        (chain, engine)
    }

    #[tokio::test]
    async fn initialization_resolves_pool_then_gauge() {
        let (_chain, engine) = engine().await;
        assert_eq!(engine.pool_address().unwrap(), mock::POOL);
        assert_eq!(engine.gauge_address().unwrap(), mock::GAUGE);
    }

    #[tokio::test]
    async fn initialization_fails_without_a_gauge() {
        let chain = Arc::new(MockChain::new());
        chain.set_gauge(alloy_primitives::Address::ZERO);
        let result = WorkflowEngine::initialize(
            chain as Arc<dyn Chain>,
            EngineSettings {
                router: mock::ROUTER,
                factory: mock::FACTORY,
                voter: mock::VOTER,
                stable: mock::STABLE,
                token_a: mock::TOKEN_A,
                token_b: mock::TOKEN_B,
                pool_stable: false,
                deadline_secs: 20 * 60,
                lp_slippage_bps: 0,
                gas_floor_wei: 1_000,
            },
        )
        .await;
        assert!(matches!(result, Err(AgentError::GaugeNotFound { .. })));
    }

    #[tokio::test]
    async fn status_snapshots_balances_and_resolved_addresses() {
        let (chain, engine) = engine().await;
        chain.set_staked(mock::OPERATOR, U256::from(777u64));
        chain.set_balance(mock::STABLE, mock::OPERATOR, U256::from(42u64));

        let throttle = ReadThrottle::new(crate::chain::PacingPolicy::None);
        let report = engine.status(&throttle).await.unwrap();
        assert_eq!(report.staked.raw, U256::from(777u64));
        assert_eq!(report.stable.1.raw, U256::from(42u64));
        assert_eq!(report.total_staked.raw, U256::from(777u64));
        assert_eq!(report.pool, mock::POOL);
        assert_eq!(report.gauge, mock::GAUGE);
    }
}
