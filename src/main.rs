//! Zapper - stablecoin deposits into staked DEX liquidity positions.
//!
//! One custodial operator identity pulls a user's stablecoin by prior
//! allowance, swaps it into the target pool's constituents, provides
//! liquidity, and stakes the LP tokens in the pool's gauge. Withdrawal runs
//! the same pipeline in reverse. The agent is stateless between runs: all
//! state lives on the ledger and is re-read every invocation.

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use console::style;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod amount;
mod chain;
mod config;
mod error;
mod exchange;
mod staking;
mod token;
mod workflow;

use amount::TokenAmount;
use chain::{Chain, Ledger, ReadThrottle};
use config::Config;
use workflow::{DepositIntent, EngineSettings, WithdrawIntent, WorkflowEngine, WorkflowResult};

#[derive(Parser)]
#[command(name = "zapper", version, about = "Stablecoin deposits into staked DEX liquidity positions")]
struct Cli {
    /// TOML config file; environment variables otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a user's stablecoin deposit into a staked LP position.
    Deposit {
        /// End-user address the stablecoin is pulled from.
        user: String,
        /// Decimal amount of the stablecoin, e.g. "250.5".
        amount: String,
        /// Swap slippage tolerance in basis points.
        #[arg(long)]
        slippage_bps: Option<u16>,
    },

    /// Unwind a given amount of staked LP back to stablecoin for the user.
    Withdraw {
        /// End-user address the proceeds are sent to.
        user: String,
        /// Decimal LP amount to unwind.
        lp_amount: String,
        /// Swap slippage tolerance in basis points.
        #[arg(long)]
        slippage_bps: Option<u16>,
    },

    /// Unwind the operator's entire staked position.
    WithdrawAll {
        /// End-user address the proceeds are sent to.
        user: String,
        /// Swap slippage tolerance in basis points.
        #[arg(long)]
        slippage_bps: Option<u16>,
    },

    /// Operator balances and resolved contract addresses.
    Status,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" ⚡ ZAPPER - Stablecoin → Staked LP Automation Agent").cyan().bold()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zapper=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    print_banner();

    // Configuration problems are fatal before any work begins.
    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;
    config.print_summary();
    println!();

    let ledger = Ledger::connect(&config)?;
    let chain: Arc<dyn Chain> = Arc::new(ledger);

    let engine = WorkflowEngine::initialize(chain, EngineSettings::from_config(&config)?).await?;
    println!(
        "{} pool {:?}, gauge {:?}",
        style("✓").green(),
        engine.pool_address()?,
        engine.gauge_address()?
    );
    println!();

    match cli.command {
        Command::Deposit {
            user,
            amount,
            slippage_bps,
        } => {
            let user = parse_user(&user)?;
            let decimals = engine.stable_decimals().await?;
            let amount = TokenAmount::parse(&amount, decimals)?;
            let slippage_bps = resolve_slippage(slippage_bps, &config)?;

            println!(
                "Depositing {} stablecoin from {:?} at {} bps slippage",
                style(&amount).bold(),
                user,
                slippage_bps
            );
            countdown(config.confirm_delay_secs).await;

            let result = engine
                .deposit(DepositIntent {
                    user,
                    amount,
                    slippage_bps,
                })
                .await;
            report("Deposit", &result, "LP staked");
            log_receipt(&config, "deposit", user, &result);
            exit_for(&result);
        }

        Command::Withdraw {
            user,
            lp_amount,
            slippage_bps,
        } => {
            let user = parse_user(&user)?;
            let decimals = engine.lp_decimals().await?;
            let lp_amount = TokenAmount::parse(&lp_amount, decimals)?;
            let slippage_bps = resolve_slippage(slippage_bps, &config)?;

            println!(
                "Withdrawing {} LP for {:?} at {} bps slippage",
                style(&lp_amount).bold(),
                user,
                slippage_bps
            );
            countdown(config.confirm_delay_secs).await;

            let result = engine
                .withdraw(WithdrawIntent {
                    user,
                    lp_amount,
                    slippage_bps,
                })
                .await;
            report("Withdraw", &result, "stablecoin returned");
            log_receipt(&config, "withdraw", user, &result);
            exit_for(&result);
        }

        Command::WithdrawAll { user, slippage_bps } => {
            let user = parse_user(&user)?;
            let slippage_bps = resolve_slippage(slippage_bps, &config)?;

            println!(
                "Withdrawing the entire staked position for {:?} at {} bps slippage",
                user, slippage_bps
            );
            countdown(config.confirm_delay_secs).await;

            let result = engine.withdraw_all(user, slippage_bps).await;
            if result.nothing_executed() {
                println!(
                    "{} Nothing staked - nothing to withdraw.",
                    style("○").yellow()
                );
                return Ok(());
            }
            report("Withdraw-all", &result, "stablecoin returned");
            log_receipt(&config, "withdraw-all", user, &result);
            exit_for(&result);
        }

        Command::Status => {
            let throttle = ReadThrottle::from_config(&config);
            let status = engine.status(&throttle).await?;

            println!("{}", style("═══ OPERATOR STATUS ═══").blue().bold());
            println!("  Operator:      {:?}", status.operator);
            println!("  Native:        {} wei", status.native_wei);
            println!("  {:<6} balance: {}", status.stable.0, status.stable.1);
            println!("  {:<6} balance: {}", status.token_a.0, status.token_a.1);
            println!("  {:<6} balance: {}", status.token_b.0, status.token_b.1);
            println!("  LP in wallet:  {}", status.lp_wallet);
            println!("  LP staked:     {}", status.staked);
            println!("  Gauge total:   {}", status.total_staked);
            println!("  Pool:          {:?}", status.pool);
            println!("  Gauge:         {:?}", status.gauge);
        }
    }

    Ok(())
}

fn parse_user(input: &str) -> Result<Address> {
    Address::from_str(input)
        .map_err(|e| color_eyre::eyre::eyre!("invalid user address {}: {}", input, e))
}

fn resolve_slippage(flag: Option<u16>, config: &Config) -> Result<u16> {
    let bps = flag.unwrap_or(config.default_slippage_bps);
    if bps > 10_000 {
        return Err(color_eyre::eyre::eyre!(
            "slippage {} bps exceeds 10000 (100%)",
            bps
        ));
    }
    Ok(bps)
}

/// The only cancellation point: once the first write is submitted the
/// workflow runs to completion or first failure.
async fn countdown(secs: u64) {
    if secs == 0 {
        return;
    }
    println!(
        "{}",
        style(format!("Starting in {}s - Ctrl-C to abort…", secs)).yellow()
    );
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

fn report(verb: &str, result: &WorkflowResult, final_label: &str) {
    println!();
    if result.success {
        println!(
            "{} {} complete: {} {}",
            style("✓").green().bold(),
            verb,
            style(&result.final_amount).bold(),
            final_label
        );
    } else {
        println!("{} {} failed", style("✗").red().bold(), verb);
        if let Some(error) = &result.error {
            println!("  Error: {}", error);
            if !result.transactions.is_empty() {
                warn!(
                    "earlier steps stay committed on the ledger; recovery is a manual operator action"
                );
            }
        }
    }
    if result.transactions.is_empty() {
        println!("  No transactions were issued.");
    } else {
        println!("  Committed transactions ({}):", result.transactions.len());
        for (i, tx) in result.transactions.iter().enumerate() {
            println!("    {}. {:?}", i + 1, tx);
        }
    }
}

fn log_receipt(config: &Config, verb: &str, user: Address, result: &WorkflowResult) {
    if !config.run_log {
        return;
    }
    let receipt = config::WorkflowReceipt {
        timestamp: chrono::Utc::now(),
        verb: verb.to_string(),
        user: format!("{:?}", user),
        success: result.success,
        transactions: result
            .transactions
            .iter()
            .map(|tx| format!("{:?}", tx))
            .collect(),
        final_amount: result.final_amount.display(),
        error: result.error.as_ref().map(|e| e.to_string()),
    };
    if let Err(e) = receipt.append_to_file(&config.run_log_path) {
        warn!("failed to append workflow receipt: {}", e);
    }
}

fn exit_for(result: &WorkflowResult) {
    if !result.success {
        std::process::exit(1);
    }
}
