//! Agent configuration.
//!
//! Everything the agent needs to run comes from environment variables (with
//! `.env` support) or an optional TOML file. Contract addresses are
//! configuration, not protocol: the defaults target the Aerodrome deployment
//! on Base, but any router/factory/voter triple with the same interfaces
//! works.

use alloy_primitives::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// ============================================
// DEFAULT CONTRACT ADDRESSES (Aerodrome on Base)
// ============================================

const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";
const DEFAULT_CHAIN_ID: u64 = 8453;
const DEFAULT_ROUTER: &str = "0xcF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43";
const DEFAULT_POOL_FACTORY: &str = "0x420DD381b31aEf6683db6B902084cB0FFECe40Da";
const DEFAULT_VOTER: &str = "0x16613524e02ad97eDfeF371bC883F2F5d6C480A5";
/// USDC on Base.
const DEFAULT_STABLE_TOKEN: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
/// WETH on Base.
const DEFAULT_POOL_TOKEN_A: &str = "0x4200000000000000000000000000000000000006";
/// AERO on Base.
const DEFAULT_POOL_TOKEN_B: &str = "0x940181a94A35A4569E4529A3CDfB74e38FD98631";

/// Recommended slippage band in basis points. Values outside this band are
/// accepted but logged loudly.
pub const SLIPPAGE_RECOMMENDED_MIN_BPS: u16 = 10;
pub const SLIPPAGE_RECOMMENDED_MAX_BPS: u16 = 500;

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network ==========
    /// Ledger gateway endpoint.
    pub rpc_url: String,

    /// Chain ID (8453 = Base mainnet).
    pub chain_id: u64,

    // ========== Operator identity ==========
    /// Operator signing key. Required for every verb; never logged.
    #[serde(default, skip_serializing)]
    pub agent_private_key: Option<String>,

    // ========== Contracts ==========
    /// Exchange router (swaps, liquidity, pool discovery).
    pub router_address: String,

    /// Pool factory passed with every route hop and pool lookup.
    pub pool_factory_address: String,

    /// Gauge registry.
    pub voter_address: String,

    /// Stablecoin the agent accepts deposits in.
    pub stable_token_address: String,

    /// First constituent token of the target pool.
    pub pool_token_a: String,

    /// Second constituent token of the target pool.
    pub pool_token_b: String,

    /// Pool kind flag: stable-curve (true) or volatile (false).
    pub pool_stable: bool,

    // ========== Workflow policy ==========
    /// Default swap slippage tolerance in basis points (50 = 0.5%).
    pub default_slippage_bps: u16,

    /// Minimum-amount floor for liquidity add/remove, in basis points.
    /// 0 disables the floor: the pool's enforced ratio is accepted as-is,
    /// which avoids reverts on ratio mismatch for small deposits.
    pub lp_slippage_bps: u16,

    /// On-ledger swap deadline, seconds from submission.
    pub swap_deadline_secs: u64,

    /// Minimum operator native balance (wei) before any write workflow.
    pub gas_floor_wei: u128,

    /// Pre-execution delay before the first irreversible step. The only
    /// user-facing cancellation point.
    pub confirm_delay_secs: u64,

    /// Client-side bound on each confirmation wait.
    pub tx_timeout_secs: u64,

    /// Pacing between non-dependent reads on display paths, to stay under
    /// gateway rate ceilings.
    pub read_throttle_ms: u64,

    // ========== Audit log ==========
    /// Append a JSON receipt per workflow run. Write-only: never read back,
    /// the agent stays stateless between runs.
    #[serde(default)]
    pub run_log: bool,

    /// Path for workflow receipts.
    #[serde(default = "default_run_log_path")]
    pub run_log_path: String,
}

fn default_run_log_path() -> String {
    "./logs/workflow_receipts.log".to_string()
}

impl Config {
    /// Load configuration from environment variables and a `.env` file.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
            chain_id: parse_env("CHAIN_ID", DEFAULT_CHAIN_ID),
            agent_private_key: env::var("AGENT_PRIVATE_KEY").ok(),

            router_address: env::var("ROUTER_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_ROUTER.to_string()),
            pool_factory_address: env::var("POOL_FACTORY_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_POOL_FACTORY.to_string()),
            voter_address: env::var("VOTER_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_VOTER.to_string()),
            stable_token_address: env::var("STABLE_TOKEN_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_STABLE_TOKEN.to_string()),
            pool_token_a: env::var("POOL_TOKEN_A")
                .unwrap_or_else(|_| DEFAULT_POOL_TOKEN_A.to_string()),
            pool_token_b: env::var("POOL_TOKEN_B")
                .unwrap_or_else(|_| DEFAULT_POOL_TOKEN_B.to_string()),
            pool_stable: parse_env("POOL_STABLE", false),

            default_slippage_bps: parse_env("SLIPPAGE_BPS", 50),
            lp_slippage_bps: parse_env("LP_SLIPPAGE_BPS", 0),
            swap_deadline_secs: parse_env("SWAP_DEADLINE_SECS", 20 * 60),
            gas_floor_wei: parse_env("GAS_FLOOR_WEI", 50_000_000_000_000u128),
            confirm_delay_secs: parse_env("CONFIRM_DELAY_SECS", 5),
            tx_timeout_secs: parse_env("TX_TIMEOUT_SECS", 180),
            read_throttle_ms: parse_env("READ_THROTTLE_MS", 250),

            run_log: parse_env("RUN_LOG", false),
            run_log_path: env::var("RUN_LOG_PATH").unwrap_or_else(|_| default_run_log_path()),
        })
    }

    /// Load configuration from a TOML file. The signing key still comes from
    /// the environment when the file omits it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let mut config: Self = toml::from_str(&content)?;
        if config.agent_private_key.is_none() {
            dotenvy::dotenv().ok();
            config.agent_private_key = env::var("AGENT_PRIVATE_KEY").ok();
        }
        Ok(config)
    }

    /// File config when a path is given, environment otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::from_env(),
        }
    }

    // ========== Parsed accessors ==========

    pub fn router(&self) -> Result<Address> {
        parse_address("router_address", &self.router_address)
    }

    pub fn pool_factory(&self) -> Result<Address> {
        parse_address("pool_factory_address", &self.pool_factory_address)
    }

    pub fn voter(&self) -> Result<Address> {
        parse_address("voter_address", &self.voter_address)
    }

    pub fn stable_token(&self) -> Result<Address> {
        parse_address("stable_token_address", &self.stable_token_address)
    }

    pub fn token_a(&self) -> Result<Address> {
        parse_address("pool_token_a", &self.pool_token_a)
    }

    pub fn token_b(&self) -> Result<Address> {
        parse_address("pool_token_b", &self.pool_token_b)
    }

    /// Validate configuration before any network traffic.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre!("invalid RPC_URL - set a real ledger gateway endpoint"));
        }
        if self.agent_private_key.as_deref().unwrap_or("").is_empty() {
            return Err(eyre!("AGENT_PRIVATE_KEY is not set"));
        }

        self.router()?;
        self.pool_factory()?;
        self.voter()?;
        self.stable_token()?;
        let a = self.token_a()?;
        let b = self.token_b()?;
        if a == b {
            return Err(eyre!("POOL_TOKEN_A and POOL_TOKEN_B must differ"));
        }

        if self.default_slippage_bps > 10_000 {
            return Err(eyre!(
                "SLIPPAGE_BPS {} exceeds 10000 (100%)",
                self.default_slippage_bps
            ));
        }
        if self.lp_slippage_bps > 10_000 {
            return Err(eyre!(
                "LP_SLIPPAGE_BPS {} exceeds 10000 (100%)",
                self.lp_slippage_bps
            ));
        }
        if self.swap_deadline_secs == 0 {
            return Err(eyre!("SWAP_DEADLINE_SECS must be positive"));
        }

        Ok(())
    }

    /// Print configuration summary.
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                 ZAPPER - CONFIGURATION                     ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain ID:          {:<39} ║", self.chain_id);
        println!("║ Router:            {:<39} ║", short_addr(&self.router_address));
        println!("║ Pool Factory:      {:<39} ║", short_addr(&self.pool_factory_address));
        println!("║ Voter:             {:<39} ║", short_addr(&self.voter_address));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Stable Token:      {:<39} ║", short_addr(&self.stable_token_address));
        println!("║ Pool Token A:      {:<39} ║", short_addr(&self.pool_token_a));
        println!("║ Pool Token B:      {:<39} ║", short_addr(&self.pool_token_b));
        println!(
            "║ Pool Kind:         {:<39} ║",
            if self.pool_stable { "stable" } else { "volatile" }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!(
            "║ Swap Slippage:     {:<39} ║",
            format!("{} bps", self.default_slippage_bps)
        );
        println!(
            "║ LP Floor:          {:<39} ║",
            if self.lp_slippage_bps == 0 {
                "disabled (pool ratio accepted)".to_string()
            } else {
                format!("{} bps", self.lp_slippage_bps)
            }
        );
        println!(
            "║ Gas Floor:         {:<39} ║",
            format!("{} wei", self.gas_floor_wei)
        );
        println!(
            "║ Signing Key:       {:<39} ║",
            if self.agent_private_key.is_some() {
                "✓ Configured"
            } else {
                "✗ Not Set"
            }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            agent_private_key: None,
            router_address: DEFAULT_ROUTER.to_string(),
            pool_factory_address: DEFAULT_POOL_FACTORY.to_string(),
            voter_address: DEFAULT_VOTER.to_string(),
            stable_token_address: DEFAULT_STABLE_TOKEN.to_string(),
            pool_token_a: DEFAULT_POOL_TOKEN_A.to_string(),
            pool_token_b: DEFAULT_POOL_TOKEN_B.to_string(),
            pool_stable: false,
            default_slippage_bps: 50,
            lp_slippage_bps: 0,
            swap_deadline_secs: 20 * 60,
            gas_floor_wei: 50_000_000_000_000,
            confirm_delay_secs: 5,
            tx_timeout_secs: 180,
            read_throttle_ms: 250,
            run_log: false,
            run_log_path: default_run_log_path(),
        }
    }
}

// ============================================
// WORKFLOW RECEIPTS
// ============================================

use chrono::{DateTime, Utc};
use std::io::Write;

/// One appended JSON line per workflow run, for out-of-band auditing and
/// manual recovery after partial failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReceipt {
    pub timestamp: DateTime<Utc>,
    pub verb: String,
    pub user: String,
    pub success: bool,
    pub transactions: Vec<String>,
    pub final_amount: String,
    pub error: Option<String>,
}

impl WorkflowReceipt {
    /// Append this receipt to a file, creating parent directories if needed.
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// HELPERS
// ============================================

fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value).map_err(|e| eyre!("invalid {}: {} ({})", field, value, e))
}

fn short_addr(addr: &str) -> String {
    if addr.len() > 12 {
        format!("{}…{}", &addr[..8], &addr[addr.len() - 4..])
    } else {
        addr.to_string()
    }
}

// ============================================
// TESTS
// ============================================
