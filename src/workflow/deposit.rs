//! Deposit workflow:
//! transfer-in → approve → swap ×2 → reconcile → approve ×2 → add liquidity
//! → approve → stake.

use tracing::info;

use super::{warn_on_unusual_slippage, DepositIntent, TxJournal, WorkflowEngine, WorkflowResult};
use crate::amount::TokenAmount;
use crate::error::AgentError;
use crate::exchange::PoolKind;

impl WorkflowEngine {
    /// Convert a user's stablecoin deposit into a staked LP position.
    ///
    /// Preconditions are checked before anything irreversible: an unmet one
    /// aborts with zero transactions issued. After the first write, a
    /// failing step terminates the workflow and the result carries the
    /// committed prefix — nothing is unwound.
    pub async fn deposit(&self, intent: DepositIntent) -> WorkflowResult {
        let mut journal = TxJournal::default();
        match self.run_deposit(&intent, &mut journal).await {
            Ok(staked) => WorkflowResult::completed(journal, staked),
            Err(error) => WorkflowResult::failed(journal, intent.amount.decimals, error),
        }
    }

    async fn run_deposit(
        &self,
        intent: &DepositIntent,
        journal: &mut TxJournal,
    ) -> Result<TokenAmount, AgentError> {
        warn_on_unusual_slippage(intent.slippage_bps);

        // ========== Preconditions (nothing committed yet) ==========
        let pool = *self.exchange.pool()?;
        self.chain.ensure_gas(self.gas_floor).await?;

        let user_balance = self.tokens.raw_balance(self.stable, intent.user).await?;
        if user_balance < intent.amount.raw {
            return Err(AgentError::InsufficientBalance {
                token: self.stable,
                owner: intent.user,
                have: user_balance,
                need: intent.amount.raw,
            });
        }

        let operator = self.chain.operator();
        let router = self.exchange.router();

        // ========== TransferIn ==========
        let tx = self
            .tokens
            .transfer_from(self.stable, intent.user, operator, intent.amount.raw)
            .await?;
        journal.record(tx);
        info!(
            "deposit: pulled {} from {:?} ({:?})",
            intent.amount, intent.user, tx
        );

        // ========== ApproveForSwap ==========
        let approval = self
            .tokens
            .approve(self.stable, router, intent.amount.raw)
            .await?;
        journal.record_approval(approval);

        // ========== SwapToTokenA / SwapToTokenB ==========
        // Exact halves; an odd base unit stays in the first half.
        let (first, second) = intent.amount.halves();

        let route_a = [self
            .exchange
            .direct_route(self.stable, pool.token_a, PoolKind::Volatile)];
        let tx = self
            .exchange
            .swap(first, &route_a, operator, intent.slippage_bps, None)
            .await?;
        journal.record(tx);

        let route_b = [self
            .exchange
            .direct_route(self.stable, pool.token_b, PoolKind::Volatile)];
        let tx = self
            .exchange
            .swap(second, &route_b, operator, intent.slippage_bps, None)
            .await?;
        journal.record(tx);

        // ========== ReconcileBalances ==========
        // Actual swap output can differ from the quotes, and residual
        // balance from earlier activity must be included: the settled
        // on-ledger balances are the only inputs carried forward.
        let balance_a = self.tokens.raw_balance(pool.token_a, operator).await?;
        let balance_b = self.tokens.raw_balance(pool.token_b, operator).await?;
        info!(
            "deposit: reconciled balances {} / {} for liquidity",
            balance_a, balance_b
        );

        // ========== ApproveForLiquidity ×2 ==========
        let approval = self.tokens.approve(pool.token_a, router, balance_a).await?;
        journal.record_approval(approval);
        let approval = self.tokens.approve(pool.token_b, router, balance_b).await?;
        journal.record_approval(approval);

        // ========== AddLiquidity ==========
        let added = self
            .exchange
            .add_liquidity(balance_a, balance_b, operator, None, None)
            .await?;
        journal.record(added.tx);
        info!("deposit: minted {} LP ({:?})", added.lp_minted, added.tx);

        // ========== ApproveForStake ==========
        let gauge = self.staking.gauge()?.address;
        let lp_token = self.exchange.lp_token()?;
        let approval = self
            .tokens
            .approve(lp_token, gauge, added.lp_minted.raw)
            .await?;
        journal.record_approval(approval);

        // ========== Stake ==========
        let tx = self.staking.stake(added.lp_minted.raw).await?;
        journal.record(tx);
        info!("deposit: staked {} LP ({:?})", added.lp_minted, tx);

        Ok(added.lp_minted)
    }
}

// ============================================
// TESTS
// ============================================
