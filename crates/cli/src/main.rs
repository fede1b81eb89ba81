//! Command Line Interface for the CLMM auto-compounder.
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use compoundor_domain::TokenAmount;
use compoundor_domain::fees::{FeeSplit, TokenSettlement, reinvest_budget};
use compoundor_domain::math::X64;
use compoundor_domain::parameters::BonusParameters;
use compoundor_execution::config::KeeperConfig;
use compoundor_simulation::runner::{SimulationConfig, run_simulation};
use dotenv::dotenv;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const BPS_DENOMINATOR: u64 = 10_000;
const DISPLAY_DECIMALS: u8 = 18;

#[derive(Parser)]
#[command(name = "compoundor")]
#[command(about = "CLMM fee auto-compounder and keeper toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how collected fees split between reinvestment, bonus and protocol
    Split {
        /// Collected amount of token0 in base units
        #[arg(long)]
        collected0: u128,

        /// Collected amount of token1 in base units
        #[arg(long)]
        collected1: u128,

        /// Reinvested amount of token0; defaults to the largest amount the fees allow
        #[arg(long)]
        compounded0: Option<u128>,

        /// Reinvested amount of token1; defaults to the largest amount the fees allow
        #[arg(long)]
        compounded1: Option<u128>,

        /// Total bonus in basis points (at most 500)
        #[arg(long, default_value_t = 200)]
        total_bonus_bps: u64,

        /// Caller share of the total bonus in basis points
        #[arg(long, default_value_t = 100)]
        compounder_bonus_bps: u64,
    },
    /// Run the keeper against a simulated market
    Simulate {
        /// Number of custodied positions
        #[arg(short, long, default_value_t = 5)]
        positions: usize,

        /// Number of keeper cycles
        #[arg(short, long, default_value_t = 120)]
        cycles: usize,

        /// Seconds between cycles
        #[arg(long, default_value_t = 60)]
        step_secs: i64,

        /// Annualized price volatility
        #[arg(long, default_value_t = 0.5)]
        volatility: f64,

        /// Gas price in gwei
        #[arg(long, default_value_t = 20)]
        gas_price_gwei: u64,

        /// Keeper configuration as JSON
        #[arg(long)]
        keeper_config: Option<PathBuf>,
    },
    /// Validate a keeper configuration file and print it with defaults filled in
    CheckConfig {
        /// Keeper configuration as JSON
        path: PathBuf,
    },
}

fn bonus_parameters(total_bps: u64, compounder_bps: u64) -> Result<BonusParameters> {
    let fraction = |bps: u64| {
        if bps == 0 {
            Some(X64::ZERO)
        } else {
            X64::from_ratio(bps, BPS_DENOMINATOR)
        }
    };
    let total = fraction(total_bps).ok_or_else(|| anyhow!("invalid total bonus: {total_bps} bps"))?;
    let compounder = fraction(compounder_bps)
        .ok_or_else(|| anyhow!("invalid compounder bonus: {compounder_bps} bps"))?;
    Ok(BonusParameters::new(total, compounder)?)
}

fn settle(collected: u128, compounded: Option<u128>, params: &BonusParameters) -> Result<TokenSettlement> {
    let available = TokenAmount::from(collected);
    let compounded = match compounded {
        Some(amount) => TokenAmount::from(amount),
        None => reinvest_budget(available, params)?,
    };
    let split = FeeSplit::compute(compounded, params)?;
    Ok(TokenSettlement::settle(available, compounded, split)?)
}

fn whole(amount: TokenAmount) -> String {
    amount
        .to_decimal(DISPLAY_DECIMALS)
        .map_or_else(|| amount.to_string(), |value| value.normalize().to_string())
}

fn load_keeper_config(path: &Path) -> Result<KeeperConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading keeper config {}", path.display()))?;
    Ok(KeeperConfig::from_json(&json)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Split {
            collected0,
            collected1,
            compounded0,
            compounded1,
            total_bonus_bps,
            compounder_bonus_bps,
        } => {
            let params = bonus_parameters(*total_bonus_bps, *compounder_bonus_bps)?;
            let token0 = settle(*collected0, *compounded0, &params)?;
            let token1 = settle(*collected1, *compounded1, &params)?;

            println!(
                "💧 Total bonus {:.4}% (caller {:.4}%)",
                params.total_bonus_x64.to_percent(),
                params.compounder_bonus_x64.to_percent()
            );
            println!("{:<12} | {:<28} | {:<28}", "", "Token0", "Token1");
            println!("{}", "-".repeat(74));
            let rows = [
                ("Collected", token0.available, token1.available),
                ("Compounded", token0.compounded, token1.compounded),
                ("Bonus", token0.bonus, token1.bonus),
                ("Protocol", token0.protocol_fee, token1.protocol_fee),
                ("Buffer", token0.buffer, token1.buffer),
            ];
            for (label, amount0, amount1) in rows {
                println!("{:<12} | {:<28} | {:<28}", label, amount0, amount1);
            }
        }
        Commands::Simulate {
            positions,
            cycles,
            step_secs,
            volatility,
            gas_price_gwei,
            keeper_config,
        } => {
            let keeper = match keeper_config {
                Some(path) => load_keeper_config(path)?,
                None => KeeperConfig::default(),
            };
            let config = SimulationConfig {
                positions: *positions,
                cycles: *cycles,
                step_secs: *step_secs,
                volatility: *volatility,
                gas_price: gas_price_gwei.saturating_mul(1_000_000_000),
                keeper,
                ..SimulationConfig::default()
            };

            println!(
                "🚀 Simulating {} positions over {} cycles...",
                positions, cycles
            );
            let report = run_simulation(config).await?;

            let hours = Decimal::from(report.cycles as i64 * step_secs) / Decimal::from(3600);
            println!("\n📊 Simulation Results");
            println!("════════════════════════════════════");
            println!("Simulated time:  {:.1}h", hours);
            println!("Tracked:         {}", report.tracked);
            println!("Checked:         {}", report.checked);
            println!("Compounded:      {}", report.executed);
            println!("Deferred:        {}", report.deferred);
            println!("Skipped:         {}", report.skipped);
            println!("Failed:          {}", report.failed);
            println!("Backed off:      {}", report.backed_off);
            println!(
                "Keeper bonus:    {} / {}",
                whole(report.keeper_balance0),
                whole(report.keeper_balance1)
            );
            println!(
                "Protocol fees:   {} / {}",
                whole(report.treasury_balance0),
                whole(report.treasury_balance1)
            );
            println!("════════════════════════════════════");
        }
        Commands::CheckConfig { path } => {
            let config = load_keeper_config(path)?;
            println!("✅ {} is valid", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
