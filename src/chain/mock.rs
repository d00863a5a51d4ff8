//! In-memory chain double for tests.
//!
//! Simulates just enough ledger state for the agent's call surface: ERC-20
//! balances and allowances, router swaps at a configurable rate, liquidity
//! mint/burn, and gauge staking. Reverted writes return `success: false`
//! without mutating state, mirroring how a real receipt reports a revert.

use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::SolCall;
use alloy_transport::TransportErrorKind;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::chain::{Chain, SentTx};
use crate::error::AgentError;
use crate::exchange::IRouter;
use crate::staking::{IGauge, IVoter};
use crate::token::IERC20;

// Fixed actors and contracts.
pub const OPERATOR: Address = Address::repeat_byte(0xAA);
pub const USER: Address = Address::repeat_byte(0xBB);
pub const ROUTER: Address = Address::repeat_byte(0x01);
pub const FACTORY: Address = Address::repeat_byte(0x02);
pub const VOTER: Address = Address::repeat_byte(0x03);
pub const POOL: Address = Address::repeat_byte(0x04);
pub const GAUGE: Address = Address::repeat_byte(0x05);
pub const STABLE: Address = Address::repeat_byte(0x10);
pub const TOKEN_A: Address = Address::repeat_byte(0x11);
pub const TOKEN_B: Address = Address::repeat_byte(0x12);

#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub to: Address,
    pub selector: [u8; 4],
    pub calldata: Vec<u8>,
    pub hash: TxHash,
    pub success: bool,
}

struct MockState {
    native: U256,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    decimals: HashMap<Address, u8>,
    staked: HashMap<Address, U256>,

    pool: Address,
    gauge: Address,

    /// Output per hop: `out = in * rate / 10000`.
    swap_rate_bps: u64,
    quote_available: bool,
    /// Forced LP mint per addLiquidity; default derives from inputs.
    lp_mint: Option<U256>,
    /// What the pool's event log would claim was minted. Never read by the
    /// agent; exists so tests can make it disagree with the real mint.
    advertised_lp_mint: Option<U256>,
    remove_payout: Option<(U256, U256)>,

    rate_limited: bool,
    revert_selectors: HashSet<[u8; 4]>,

    next_tx: u64,
    reads: usize,
    writes: Vec<WriteRecord>,
}

pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                native: U256::from(1_000_000_000_000_000_000u128), // 1 ether
                balances: HashMap::new(),
                allowances: HashMap::new(),
                decimals: HashMap::new(),
                staked: HashMap::new(),
                pool: POOL,
                gauge: GAUGE,
                swap_rate_bps: 9_970, // one 0.3% fee leg per hop
                quote_available: true,
                lp_mint: None,
                advertised_lp_mint: None,
                remove_payout: None,
                rate_limited: false,
                revert_selectors: HashSet::new(),
                next_tx: 0,
                reads: 0,
                writes: Vec::new(),
            }),
        }
    }

    // ========== State setup ==========

    pub fn set_native_balance(&self, amount: U256) {
        self.state.lock().unwrap().native = amount;
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.lock().unwrap().balances.insert((token, owner), amount);
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        balance_of(&self.state.lock().unwrap().balances, token, owner)
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, owner, spender), amount);
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        self.state.lock().unwrap().decimals.insert(token, decimals);
    }

    pub fn set_staked(&self, owner: Address, amount: U256) {
        self.state.lock().unwrap().staked.insert(owner, amount);
    }

    pub fn staked(&self, owner: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .staked
            .get(&owner)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn set_pool(&self, pool: Address) {
        self.state.lock().unwrap().pool = pool;
    }

    pub fn set_gauge(&self, gauge: Address) {
        self.state.lock().unwrap().gauge = gauge;
    }

    pub fn set_swap_rate_bps(&self, bps: u64) {
        self.state.lock().unwrap().swap_rate_bps = bps;
    }

    pub fn set_quote_available(&self, available: bool) {
        self.state.lock().unwrap().quote_available = available;
    }

    pub fn set_lp_mint(&self, amount: U256) {
        self.state.lock().unwrap().lp_mint = Some(amount);
    }

    pub fn set_advertised_lp_mint(&self, amount: U256) {
        self.state.lock().unwrap().advertised_lp_mint = Some(amount);
    }

    pub fn set_remove_payout(&self, amount_a: U256, amount_b: U256) {
        self.state.lock().unwrap().remove_payout = Some((amount_a, amount_b));
    }

    pub fn set_rate_limited(&self, limited: bool) {
        self.state.lock().unwrap().rate_limited = limited;
    }

    /// Every subsequent write with this selector reverts (success: false).
    pub fn revert_on(&self, selector: [u8; 4]) {
        self.state.lock().unwrap().revert_selectors.insert(selector);
    }

    // ========== Introspection ==========

    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Values of every approve() submitted to `token`, in order.
    pub fn approve_values(&self, token: Address) -> Vec<U256> {
        self.writes()
            .iter()
            .filter(|w| w.to == token && w.selector == IERC20::approveCall::SELECTOR)
            .filter_map(|w| IERC20::approveCall::abi_decode(&w.calldata).ok())
            .map(|call| call.value)
            .collect()
    }

    /// amountOutMin of every swap submitted, in order.
    pub fn swap_min_outs(&self) -> Vec<U256> {
        self.writes()
            .iter()
            .filter(|w| w.selector == IRouter::swapExactTokensForTokensCall::SELECTOR)
            .filter_map(|w| IRouter::swapExactTokensForTokensCall::abi_decode(&w.calldata).ok())
            .map(|call| call.amountOutMin)
            .collect()
    }
}

// ============================================
// CALL DISPATCH
// ============================================

fn balance_of(balances: &HashMap<(Address, Address), U256>, token: Address, owner: Address) -> U256 {
    balances.get(&(token, owner)).copied().unwrap_or(U256::ZERO)
}

fn credit(balances: &mut HashMap<(Address, Address), U256>, token: Address, owner: Address, amount: U256) {
    let entry = balances.entry((token, owner)).or_insert(U256::ZERO);
    *entry += amount;
}

fn debit(
    balances: &mut HashMap<(Address, Address), U256>,
    token: Address,
    owner: Address,
    amount: U256,
) -> bool {
    let held = balance_of(balances, token, owner);
    if held < amount {
        return false;
    }
    balances.insert((token, owner), held - amount);
    true
}

fn quote_through(amount_in: U256, hops: usize, rate_bps: u64) -> U256 {
    let mut out = amount_in;
    for _ in 0..hops {
        out = out * U256::from(rate_bps) / U256::from(10_000u64);
    }
    out
}

fn selector(data: &[u8]) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&data[..4]);
    sel
}

#[async_trait]
impl Chain for MockChain {
    fn operator(&self) -> Address {
        OPERATOR
    }

    async fn call(&self, to: Address, calldata: Vec<u8>) -> Result<Bytes, AgentError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;

        if state.rate_limited {
            return Err(TransportErrorKind::custom_str("429 Too Many Requests").into());
        }

        let sel = selector(&calldata);

        if sel == IERC20::balanceOfCall::SELECTOR {
            let call = IERC20::balanceOfCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock balanceOf"))?;
            let value = if to == state.gauge {
                state.staked.get(&call.owner).copied().unwrap_or(U256::ZERO)
            } else {
                balance_of(&state.balances, to, call.owner)
            };
            return Ok(IERC20::balanceOfCall::abi_encode_returns(&value).into());
        }

        if sel == IERC20::decimalsCall::SELECTOR {
            let value = state.decimals.get(&to).copied().unwrap_or(18);
            return Ok(IERC20::decimalsCall::abi_encode_returns(&value).into());
        }

        if sel == IERC20::symbolCall::SELECTOR {
            return Ok(IERC20::symbolCall::abi_encode_returns(&"MOCK".to_string()).into());
        }

        if sel == IERC20::allowanceCall::SELECTOR {
            let call = IERC20::allowanceCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock allowance"))?;
            let value = state
                .allowances
                .get(&(to, call.owner, call.spender))
                .copied()
                .unwrap_or(U256::ZERO);
            return Ok(IERC20::allowanceCall::abi_encode_returns(&value).into());
        }

        if sel == IRouter::poolForCall::SELECTOR {
            let pool = state.pool;
            return Ok(IRouter::poolForCall::abi_encode_returns(&pool).into());
        }

        if sel == IRouter::getAmountsOutCall::SELECTOR {
            if !state.quote_available {
                return Err(TransportErrorKind::custom_str("execution reverted: no route").into());
            }
            let call = IRouter::getAmountsOutCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock getAmountsOut"))?;
            let mut amounts = vec![call.amountIn];
            let mut running = call.amountIn;
            for _ in &call.routes {
                running = quote_through(running, 1, state.swap_rate_bps);
                amounts.push(running);
            }
            return Ok(IRouter::getAmountsOutCall::abi_encode_returns(&amounts).into());
        }

        if sel == IVoter::gaugesCall::SELECTOR {
            let gauge = state.gauge;
            return Ok(IVoter::gaugesCall::abi_encode_returns(&gauge).into());
        }

        if sel == IGauge::totalSupplyCall::SELECTOR {
            let total: U256 = state.staked.values().copied().fold(U256::ZERO, |a, b| a + b);
            return Ok(IGauge::totalSupplyCall::abi_encode_returns(&total).into());
        }

        Err(TransportErrorKind::custom_str("mock: unexpected read selector").into())
    }

    async fn send(&self, to: Address, calldata: Vec<u8>) -> Result<SentTx, AgentError> {
        let mut state = self.state.lock().unwrap();
        state.next_tx += 1;
        let hash = B256::from(U256::from(state.next_tx));
        let sel = selector(&calldata);

        let mut record = WriteRecord {
            to,
            selector: sel,
            calldata: calldata.clone(),
            hash,
            success: true,
        };

        let success = if state.revert_selectors.contains(&sel) {
            false
        } else if sel == IERC20::approveCall::SELECTOR {
            let call = IERC20::approveCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock approve"))?;
            state.allowances.insert((to, OPERATOR, call.spender), call.value);
            true
        } else if sel == IERC20::transferCall::SELECTOR {
            let call = IERC20::transferCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock transfer"))?;
            if debit(&mut state.balances, to, OPERATOR, call.value) {
                credit(&mut state.balances, to, call.to, call.value);
                true
            } else {
                false
            }
        } else if sel == IERC20::transferFromCall::SELECTOR {
            let call = IERC20::transferFromCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock transferFrom"))?;
            let granted = state
                .allowances
                .get(&(to, call.from, OPERATOR))
                .copied()
                .unwrap_or(U256::ZERO);
            if granted >= call.value && debit(&mut state.balances, to, call.from, call.value) {
                credit(&mut state.balances, to, call.to, call.value);
                state
                    .allowances
                    .insert((to, call.from, OPERATOR), granted - call.value);
                true
            } else {
                false
            }
        } else if sel == IRouter::swapExactTokensForTokensCall::SELECTOR {
            let call = IRouter::swapExactTokensForTokensCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock swap"))?;
            let token_in = call.routes.first().map(|r| r.from).unwrap_or_default();
            let token_out = call.routes.last().map(|r| r.to).unwrap_or_default();
            let out = quote_through(call.amountIn, call.routes.len(), state.swap_rate_bps);
            if out >= call.amountOutMin
                && debit(&mut state.balances, token_in, OPERATOR, call.amountIn)
            {
                credit(&mut state.balances, token_out, call.to, out);
                true
            } else {
                false
            }
        } else if sel == IRouter::addLiquidityCall::SELECTOR {
            let call = IRouter::addLiquidityCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock addLiquidity"))?;
            let pool = state.pool;
            let funded = balance_of(&state.balances, call.tokenA, OPERATOR) >= call.amountADesired
                && balance_of(&state.balances, call.tokenB, OPERATOR) >= call.amountBDesired;
            if funded {
                debit(&mut state.balances, call.tokenA, OPERATOR, call.amountADesired);
                debit(&mut state.balances, call.tokenB, OPERATOR, call.amountBDesired);
                let minted = state
                    .lp_mint
                    .unwrap_or((call.amountADesired + call.amountBDesired) / U256::from(2));
                credit(&mut state.balances, pool, call.to, minted);
                true
            } else {
                false
            }
        } else if sel == IRouter::removeLiquidityCall::SELECTOR {
            let call = IRouter::removeLiquidityCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock removeLiquidity"))?;
            let pool = state.pool;
            if debit(&mut state.balances, pool, OPERATOR, call.liquidity) {
                let (a_out, b_out) = state.remove_payout.unwrap_or((
                    call.liquidity / U256::from(2),
                    call.liquidity / U256::from(2),
                ));
                credit(&mut state.balances, call.tokenA, call.to, a_out);
                credit(&mut state.balances, call.tokenB, call.to, b_out);
                true
            } else {
                false
            }
        } else if sel == IGauge::depositCall::SELECTOR {
            let call = IGauge::depositCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock gauge deposit"))?;
            let pool = state.pool;
            let granted = state
                .allowances
                .get(&(pool, OPERATOR, to))
                .copied()
                .unwrap_or(U256::ZERO);
            if granted >= call.amount && debit(&mut state.balances, pool, OPERATOR, call.amount) {
                state
                    .allowances
                    .insert((pool, OPERATOR, to), granted - call.amount);
                let staked = state.staked.entry(OPERATOR).or_insert(U256::ZERO);
                *staked += call.amount;
                true
            } else {
                false
            }
        } else if sel == IGauge::withdrawCall::SELECTOR {
            let call = IGauge::withdrawCall::abi_decode(&calldata)
                .map_err(|_| AgentError::decode("mock gauge withdraw"))?;
            let pool = state.pool;
            let staked = state.staked.get(&OPERATOR).copied().unwrap_or(U256::ZERO);
            if staked >= call.amount {
                state.staked.insert(OPERATOR, staked - call.amount);
                credit(&mut state.balances, pool, OPERATOR, call.amount);
                true
            } else {
                false
            }
        } else {
            return Err(TransportErrorKind::custom_str("mock: unexpected write selector").into());
        };

        record.success = success;
        state.writes.push(record);
        Ok(SentTx { hash, success })
    }

    async fn native_balance(&self) -> Result<U256, AgentError> {
        Ok(self.state.lock().unwrap().native)
    }
}
