//! Exchange integration: quotes, swaps, and pool liquidity against the
//! router and pool-discovery contracts.
//!
//! Routes are 4-tuples `{from, to, stable, factory}` — the revised router
//! interface. The canonical pool address for the configured token pair is
//! resolved once during `initialize()` and treated as immutable afterwards;
//! the pool contract doubles as the LP token.
//!
//! Minted and returned LP/token quantities are measured by re-querying
//! balances after confirmation, never by parsing emitted events: event
//! amounts for this exchange's pool token have been observed to misattribute
//! amounts, so the balance delta is the authoritative source of truth.

use alloy_primitives::{Address, TxHash, U256};
use alloy_sol_types::{sol, SolCall};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::amount::TokenAmount;
use crate::chain::Chain;
use crate::error::AgentError;
use crate::token::Tokens;

sol! {
    interface IRouter {
        struct Route {
            address from;
            address to;
            bool stable;
            address factory;
        }

        function poolFor(address tokenA, address tokenB, bool stable, address factory)
            external view returns (address pool);

        function getAmountsOut(uint256 amountIn, Route[] memory routes)
            external view returns (uint256[] memory amounts);

        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            Route[] calldata routes,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);

        function addLiquidity(
            address tokenA,
            address tokenB,
            bool stable,
            uint256 amountADesired,
            uint256 amountBDesired,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB, uint256 liquidity);

        function removeLiquidity(
            address tokenA,
            address tokenB,
            bool stable,
            uint256 liquidity,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB);
    }
}

// ============================================
// TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Stable,
    Volatile,
}

impl PoolKind {
    pub fn is_stable(self) -> bool {
        matches!(self, PoolKind::Stable)
    }

    pub fn from_flag(stable: bool) -> Self {
        if stable {
            PoolKind::Stable
        } else {
            PoolKind::Volatile
        }
    }
}

/// One hop of a swap path. Adjacent hops must chain.
#[derive(Debug, Clone, Copy)]
pub struct SwapRoute {
    pub from: Address,
    pub to: Address,
    pub kind: PoolKind,
    pub factory: Address,
}

impl SwapRoute {
    fn encode(&self) -> IRouter::Route {
        IRouter::Route {
            from: self.from,
            to: self.to,
            stable: self.kind.is_stable(),
            factory: self.factory,
        }
    }
}

/// Canonical pool for the configured token pair, resolved once.
#[derive(Debug, Clone, Copy)]
pub struct PoolReference {
    pub token_a: Address,
    pub token_b: Address,
    pub kind: PoolKind,
    pub address: Address,
}

#[derive(Debug, Clone, Copy)]
pub struct LiquidityAdded {
    pub tx: TxHash,
    pub lp_minted: TokenAmount,
}

#[derive(Debug, Clone, Copy)]
pub struct LiquidityRemoved {
    pub tx: TxHash,
    pub amount_a: TokenAmount,
    pub amount_b: TokenAmount,
}

pub struct ExchangeParams {
    pub router: Address,
    pub factory: Address,
    pub token_a: Address,
    pub token_b: Address,
    pub kind: PoolKind,
    pub deadline_secs: u64,
    /// Minimum-amount floor for liquidity operations, in basis points.
    /// Zero accepts whatever ratio the pool enforces.
    pub lp_slippage_bps: u16,
}

// ============================================
// EXCHANGE LAYER
// ============================================

pub struct Exchange {
    chain: Arc<dyn Chain>,
    tokens: Arc<Tokens>,
    params: ExchangeParams,
    pool: Option<PoolReference>,
}

impl Exchange {
    pub fn new(chain: Arc<dyn Chain>, tokens: Arc<Tokens>, params: ExchangeParams) -> Self {
        Self {
            chain,
            tokens,
            params,
            pool: None,
        }
    }

    /// Resolve the canonical pool for the configured pair. Terminal for the
    /// process lifetime; every other operation requires it.
    pub async fn initialize(&mut self) -> Result<PoolReference, AgentError> {
        let data = IRouter::poolForCall {
            tokenA: self.params.token_a,
            tokenB: self.params.token_b,
            stable: self.params.kind.is_stable(),
            factory: self.params.factory,
        }
        .abi_encode();

        let out = self.chain.call(self.params.router, data).await?;
        let address = IRouter::poolForCall::abi_decode_returns(&out)
            .map_err(|_| AgentError::decode("poolFor"))?;

        if address.is_zero() {
            return Err(AgentError::PoolNotFound {
                token_a: self.params.token_a,
                token_b: self.params.token_b,
            });
        }

        let pool = PoolReference {
            token_a: self.params.token_a,
            token_b: self.params.token_b,
            kind: self.params.kind,
            address,
        };
        debug!("resolved pool {:?} for configured pair", address);
        self.pool = Some(pool);
        Ok(pool)
    }

    pub fn pool(&self) -> Result<&PoolReference, AgentError> {
        self.pool
            .as_ref()
            .ok_or(AgentError::NotInitialized { layer: "exchange" })
    }

    /// The pool contract is the LP token.
    pub fn lp_token(&self) -> Result<Address, AgentError> {
        Ok(self.pool()?.address)
    }

    pub fn router(&self) -> Address {
        self.params.router
    }

    /// Single-hop route between two tokens through the configured factory.
    pub fn direct_route(&self, from: Address, to: Address, kind: PoolKind) -> SwapRoute {
        SwapRoute {
            from,
            to,
            kind,
            factory: self.params.factory,
        }
    }

    fn validate_path(path: &[SwapRoute]) -> Result<(), AgentError> {
        if path.is_empty() {
            return Err(AgentError::EmptyRoute);
        }
        for (i, pair) in path.windows(2).enumerate() {
            if pair[0].to != pair[1].from {
                return Err(AgentError::BrokenRoute {
                    hop: i,
                    to: pair[0].to,
                    from: pair[1].from,
                });
            }
        }
        Ok(())
    }

    fn deadline(&self, deadline: Option<u64>) -> U256 {
        let ts = deadline
            .unwrap_or_else(|| Utc::now().timestamp() as u64 + self.params.deadline_secs);
        U256::from(ts)
    }

    // ========== Quotes ==========

    /// Read-only swap simulation. Any failure of the remote quote call, and
    /// a zero result, surface as `QuoteUnavailable` — non-fatal, callers
    /// decide the fallback.
    pub async fn quote(
        &self,
        amount_in: U256,
        path: &[SwapRoute],
    ) -> Result<TokenAmount, AgentError> {
        self.pool()?;
        let raw = self.quote_raw(amount_in, path).await?;
        let out_token = path.last().ok_or(AgentError::EmptyRoute)?.to;
        let decimals = self.tokens.decimals(out_token).await?;
        Ok(TokenAmount::new(raw, decimals))
    }

    async fn quote_raw(&self, amount_in: U256, path: &[SwapRoute]) -> Result<U256, AgentError> {
        Self::validate_path(path)?;

        let data = IRouter::getAmountsOutCall {
            amountIn: amount_in,
            routes: path.iter().map(SwapRoute::encode).collect(),
        }
        .abi_encode();

        let out = self
            .chain
            .call(self.params.router, data)
            .await
            .map_err(|e| AgentError::QuoteUnavailable(e.to_string()))?;

        let amounts = IRouter::getAmountsOutCall::abi_decode_returns(&out)
            .map_err(|_| AgentError::QuoteUnavailable("undecodable amounts".to_string()))?;

        match amounts.last() {
            Some(last) if !last.is_zero() => Ok(*last),
            _ => Err(AgentError::QuoteUnavailable(
                "zero output for path".to_string(),
            )),
        }
    }

    // ========== Swaps ==========

    /// Execute a swap with a minimum-output bound derived from the best
    /// available quote. When no quote is obtainable the floor degrades to a
    /// single base unit — output protection is effectively off for that
    /// call, which is logged, never silent.
    pub async fn swap(
        &self,
        amount_in: U256,
        path: &[SwapRoute],
        recipient: Address,
        slippage_bps: u16,
        deadline: Option<u64>,
    ) -> Result<TxHash, AgentError> {
        self.pool()?;
        Self::validate_path(path)?;

        let min_out = match self.quote_raw(amount_in, path).await {
            Ok(expected) => with_slippage(expected, slippage_bps),
            Err(AgentError::QuoteUnavailable(reason)) => {
                warn!(
                    "no quote for swap path ({}); degrading min-out to 1 base unit",
                    reason
                );
                U256::from(1u64)
            }
            Err(other) => return Err(other),
        };

        let data = IRouter::swapExactTokensForTokensCall {
            amountIn: amount_in,
            amountOutMin: min_out,
            routes: path.iter().map(SwapRoute::encode).collect(),
            to: recipient,
            deadline: self.deadline(deadline),
        }
        .abi_encode();

        let sent = self.chain.send(self.params.router, data).await?;
        if !sent.success {
            return Err(AgentError::SwapReverted { tx: sent.hash });
        }
        debug!("swap {} in confirmed as {:?}", amount_in, sent.hash);
        Ok(sent.hash)
    }

    // ========== Liquidity ==========

    /// Add liquidity at both desired amounts. The minted LP quantity is
    /// measured by the recipient's LP balance delta re-queried after
    /// confirmation.
    pub async fn add_liquidity(
        &self,
        amount_a_desired: U256,
        amount_b_desired: U256,
        recipient: Address,
        slippage_bps_override: Option<u16>,
        deadline: Option<u64>,
    ) -> Result<LiquidityAdded, AgentError> {
        let pool = *self.pool()?;
        let floor_bps = slippage_bps_override.unwrap_or(self.params.lp_slippage_bps);

        let lp_before = self.tokens.raw_balance(pool.address, recipient).await?;

        let data = IRouter::addLiquidityCall {
            tokenA: pool.token_a,
            tokenB: pool.token_b,
            stable: pool.kind.is_stable(),
            amountADesired: amount_a_desired,
            amountBDesired: amount_b_desired,
            amountAMin: with_slippage(amount_a_desired, floor_bps),
            amountBMin: with_slippage(amount_b_desired, floor_bps),
            to: recipient,
            deadline: self.deadline(deadline),
        }
        .abi_encode();

        let sent = self.chain.send(self.params.router, data).await?;
        if !sent.success {
            return Err(AgentError::LiquidityRejected { tx: sent.hash });
        }

        let lp_after = self.tokens.raw_balance(pool.address, recipient).await?;
        let decimals = self.tokens.decimals(pool.address).await?;
        let minted = lp_after.saturating_sub(lp_before);
        debug!("liquidity added in {:?}: {} LP minted", sent.hash, minted);

        Ok(LiquidityAdded {
            tx: sent.hash,
            lp_minted: TokenAmount::new(minted, decimals),
        })
    }

    /// Remove liquidity; received constituent amounts are balance deltas.
    pub async fn remove_liquidity(
        &self,
        lp_amount: U256,
        recipient: Address,
        deadline: Option<u64>,
    ) -> Result<LiquidityRemoved, AgentError> {
        let pool = *self.pool()?;

        let a_before = self.tokens.raw_balance(pool.token_a, recipient).await?;
        let b_before = self.tokens.raw_balance(pool.token_b, recipient).await?;

        let data = IRouter::removeLiquidityCall {
            tokenA: pool.token_a,
            tokenB: pool.token_b,
            stable: pool.kind.is_stable(),
            liquidity: lp_amount,
            amountAMin: U256::ZERO,
            amountBMin: U256::ZERO,
            to: recipient,
            deadline: self.deadline(deadline),
        }
        .abi_encode();

        let sent = self.chain.send(self.params.router, data).await?;
        if !sent.success {
            return Err(AgentError::LiquidityRejected { tx: sent.hash });
        }

        let a_after = self.tokens.raw_balance(pool.token_a, recipient).await?;
        let b_after = self.tokens.raw_balance(pool.token_b, recipient).await?;
        let dec_a = self.tokens.decimals(pool.token_a).await?;
        let dec_b = self.tokens.decimals(pool.token_b).await?;

        Ok(LiquidityRemoved {
            tx: sent.hash,
            amount_a: TokenAmount::new(a_after.saturating_sub(a_before), dec_a),
            amount_b: TokenAmount::new(b_after.saturating_sub(b_before), dec_b),
        })
    }
}

/// `amount × (10000 − bps) / 10000`, on raw base units.
fn with_slippage(amount: U256, bps: u16) -> U256 {
    amount * U256::from(10_000u16 - bps) / U256::from(10_000u16)
}

// ============================================
// TESTS
// ============================================
