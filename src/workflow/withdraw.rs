//! Withdrawal workflow:
//! unstake → approve LP → remove liquidity → reconcile → approve ×2 →
//! swap ×2 → read final balance → transfer out.

use alloy_primitives::Address;
use tracing::info;

use super::{warn_on_unusual_slippage, TxJournal, WithdrawIntent, WorkflowEngine, WorkflowResult};
use crate::amount::TokenAmount;
use crate::error::AgentError;
use crate::exchange::PoolKind;

impl WorkflowEngine {
    /// Unwind a staked LP position back into the stablecoin and return the
    /// proceeds to the user. Mirrors the deposit workflow in reverse, with
    /// the same reconciliation discipline and the same no-compensation
    /// policy on mid-workflow failure.
    pub async fn withdraw(&self, intent: WithdrawIntent) -> WorkflowResult {
        let mut journal = TxJournal::default();
        match self.run_withdraw(&intent, &mut journal).await {
            Ok(returned) => WorkflowResult::completed(journal, returned),
            Err(error) => WorkflowResult::failed(journal, intent.lp_amount.decimals, error),
        }
    }

    /// Withdraw the operator's entire staked LP balance. A zero staked
    /// balance is a valid terminal outcome, not an error: the result
    /// reports nothing executed and unstake is never invoked.
    pub async fn withdraw_all(&self, user: Address, slippage_bps: u16) -> WorkflowResult {
        let staked = match self.staking.staked_balance(None).await {
            Ok(staked) => staked,
            Err(error) => return WorkflowResult::failed(TxJournal::default(), 18, error),
        };

        if staked.is_zero() {
            info!("withdraw-all: nothing staked, nothing to do");
            return WorkflowResult::nothing_to_withdraw(staked.decimals);
        }

        self.withdraw(WithdrawIntent {
            user,
            lp_amount: staked,
            slippage_bps,
        })
        .await
    }

    async fn run_withdraw(
        &self,
        intent: &WithdrawIntent,
        journal: &mut TxJournal,
    ) -> Result<TokenAmount, AgentError> {
        warn_on_unusual_slippage(intent.slippage_bps);

        // ========== Preconditions ==========
        let pool = *self.exchange.pool()?;
        self.staking.gauge()?;
        self.chain.ensure_gas(self.gas_floor).await?;

        let operator = self.chain.operator();
        let router = self.exchange.router();

        // ========== Unstake ==========
        let tx = self.staking.unstake(intent.lp_amount.raw).await?;
        journal.record(tx);
        info!(
            "withdraw: unstaked {} LP ({:?})",
            intent.lp_amount, tx
        );

        // ========== ApproveLPForRouter ==========
        let lp_token = self.exchange.lp_token()?;
        let approval = self
            .tokens
            .approve(lp_token, router, intent.lp_amount.raw)
            .await?;
        journal.record_approval(approval);

        // ========== RemoveLiquidity ==========
        let removed = self
            .exchange
            .remove_liquidity(intent.lp_amount.raw, operator, None)
            .await?;
        journal.record(removed.tx);

        // ========== ReconcileBalances ==========
        // The settled balances, not the removal's reported amounts, feed the
        // reverse swaps; residual constituent balance rides along.
        let balance_a = self.tokens.raw_balance(pool.token_a, operator).await?;
        let balance_b = self.tokens.raw_balance(pool.token_b, operator).await?;
        info!(
            "withdraw: reconciled balances {} / {} for reverse swaps",
            balance_a, balance_b
        );

        // ========== ApproveBothForSwap ==========
        let approval = self.tokens.approve(pool.token_a, router, balance_a).await?;
        journal.record_approval(approval);
        let approval = self.tokens.approve(pool.token_b, router, balance_b).await?;
        journal.record_approval(approval);

        // ========== SwapTokenAToStable / SwapTokenBToStable ==========
        if !balance_a.is_zero() {
            let route = [self
                .exchange
                .direct_route(pool.token_a, self.stable, PoolKind::Volatile)];
            let tx = self
                .exchange
                .swap(balance_a, &route, operator, intent.slippage_bps, None)
                .await?;
            journal.record(tx);
        }
        if !balance_b.is_zero() {
            let route = [self
                .exchange
                .direct_route(pool.token_b, self.stable, PoolKind::Volatile)];
            let tx = self
                .exchange
                .swap(balance_b, &route, operator, intent.slippage_bps, None)
                .await?;
            journal.record(tx);
        }

        // ========== ReadFinalStableBalance ==========
        // The *entire* stablecoin balance goes out, not the sum of the two
        // swap outputs: stray existing balance is swept along.
        let final_balance = self.tokens.balance_of(self.stable, None).await?;

        // ========== TransferOut ==========
        let tx = self
            .tokens
            .transfer(self.stable, intent.user, final_balance.raw)
            .await?;
        journal.record(tx);
        info!(
            "withdraw: returned {} to {:?} ({:?})",
            final_balance, intent.user, tx
        );

        Ok(final_balance)
    }
}

// ============================================
// TESTS
// ============================================
