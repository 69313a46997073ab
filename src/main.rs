use anyhow::{bail, Context, Result};
use env_logger::Builder;
use log::{info, LevelFilter};
use serde_json::json;
use soon_guard_client::constants::refresh_intervals;
use soon_guard_client::models::GasLevel;
use soon_guard_client::{AnalyticsMonitor, GuardClient, GuardConfig, KeypairWallet, WalletSigner};
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

fn print_usage(bin: &str) {
    println!("SOON Guard client v{}", soon_guard_client::VERSION);
    println!("\nUsage:");
    println!("  {} derive [TARGET]", bin);
    println!("  {} analysis TARGET", bin);
    println!("  {} metrics", bin);
    println!("  {} stats", bin);
    println!("  {} watch [TARGET]", bin);
    println!("  {} analyze TARGET --keypair PATH [--buffer-size BYTES]", bin);
    println!("  {} record-metrics GAS true|false --keypair PATH", bin);
    println!("  {} simulate TARGET [DATA_LEN] [--keypair PATH]", bin);
    println!("  {} --version", bin);
    println!("\nOptions:");
    println!("  --cluster, -c URL       Use the specified RPC URL (default: SOON devnet)");
    println!("  --program-id, -p ID     Guard program address");
    println!("  --config PATH           Load settings from a JSON config file");
    println!("  --keypair, -k PATH      Keypair file used to sign transactions");
    println!("  --buffer-size BYTES     Buffer size sent with an analyze request");
    println!("  --interval VALUE        Polling interval for watch: fast, medium, slow or milliseconds");
    println!("  --version, -v           Show version information");
    println!("\nEnvironment: GUARD_PROGRAM_ID, GUARD_RPC_URL, GUARD_COMMITMENT, GUARD_MAX_RETRIES");
}

fn parse_target(value: Option<&String>) -> Result<Pubkey> {
    let value = value.context("Missing TARGET address")?;
    Pubkey::from_str(value).with_context(|| format!("Invalid TARGET address: {}", value))
}

/// `fast`, `medium`, `slow` or a number of milliseconds
fn parse_interval(value: &str) -> Result<u64> {
    Ok(match value {
        "fast" => refresh_intervals::FAST,
        "medium" => refresh_intervals::MEDIUM,
        "slow" => refresh_intervals::SLOW,
        ms => ms
            .parse()
            .with_context(|| format!("Invalid refresh interval: {}", ms))?,
    })
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// Simple CLI without clap
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    Builder::new()
        .format(|buf, record| {
            let ts = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            writeln!(buf, "{} [{}] - {}", ts, record.level(), record.args())
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let bin = args.first().map(String::as_str).unwrap_or("soon-guard");

    if args.len() > 1 && (args[1] == "--version" || args[1] == "-v") {
        println!("SOON Guard client v{}", soon_guard_client::VERSION);
        return Ok(());
    }

    if args.len() < 2 {
        print_usage(bin);
        return Ok(());
    }

    // Split options from positional arguments
    let mut positional = Vec::new();
    let mut cluster = None;
    let mut program_id = None;
    let mut config_path = None;
    let mut keypair_path = None;
    let mut buffer_size = None;
    let mut refresh_interval_ms = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            flag @ ("--cluster" | "-c" | "--program-id" | "-p" | "--config" | "--keypair" | "-k"
            | "--buffer-size" | "--interval") => {
                let value = match args.get(i + 1) {
                    Some(value) => value.clone(),
                    None => bail!("Missing value for {}", flag),
                };
                match flag {
                    "--cluster" | "-c" => cluster = Some(value),
                    "--program-id" | "-p" => {
                        program_id = Some(
                            Pubkey::from_str(&value)
                                .with_context(|| format!("Invalid program id: {}", value))?,
                        )
                    }
                    "--config" => config_path = Some(PathBuf::from(value)),
                    "--keypair" | "-k" => keypair_path = Some(PathBuf::from(value)),
                    "--interval" => refresh_interval_ms = Some(parse_interval(&value)?),
                    _ => {
                        buffer_size = Some(
                            value
                                .parse::<u64>()
                                .with_context(|| format!("Invalid buffer size: {}", value))?,
                        )
                    }
                }
                i += 2;
            }
            "--help" | "-h" => {
                print_usage(bin);
                return Ok(());
            }
            _ => {
                positional.push(args[i].clone());
                i += 1;
            }
        }
    }

    // File first, then environment, then flags
    let mut config = match &config_path {
        Some(path) => GuardConfig::from_json_file(path)?,
        None => GuardConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(url) = cluster {
        config.rpc_url = url;
    }
    if let Some(id) = program_id {
        config.program_id = id;
    }
    if let Some(ms) = refresh_interval_ms {
        config.refresh_interval_ms = ms;
    }

    let command = positional.first().cloned().unwrap_or_default();
    let rest = &positional[1.min(positional.len())..];

    let mut client = GuardClient::from_config(config)?;
    if let Some(path) = &keypair_path {
        let wallet = KeypairWallet::from_file(path)?;
        info!("Using wallet {}", wallet.address());
        client = client.with_wallet(Arc::new(wallet));
    }

    match command.as_str() {
        "derive" => {
            let deriver = client.deriver();
            let analysis = match rest.first() {
                Some(_) => Some(deriver.analysis(&parse_target(rest.first())?)?),
                None => None,
            };
            print_json(&json!({
                "program_id": deriver.program_id().to_string(),
                "analysis": analysis,
                "metrics": deriver.metrics()?,
                "network_stats": deriver.network_stats()?,
            }))?;
        }
        "analysis" => {
            let target = parse_target(rest.first())?;
            let record = client.fetch_analysis(&target).await?;
            print_json(&json!({
                "target": target.to_string(),
                "risk_level": record.risk_level(),
                "record": record,
            }))?;
        }
        "metrics" => {
            let record = client.fetch_metrics().await?;
            print_json(&json!({
                "average_gas_used": record.average_gas_used(),
                "record": record,
            }))?;
        }
        "stats" => {
            print_json(&client.fetch_network_stats().await?)?;
        }
        "watch" => {
            let target = match rest.first() {
                Some(_) => Some(parse_target(rest.first())?),
                None => None,
            };
            let interval = client.config().refresh_interval();
            let monitor = AnalyticsMonitor::new(Arc::new(client));
            let handle = monitor.start(interval, target);
            let mut updates = handle.subscribe();

            println!("Watching Guard analytics (Ctrl-C to stop)...");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = updates.borrow_and_update().clone();
                        print_json(&snapshot)?;
                    }
                }
            }
            handle.shutdown().await;
        }
        "analyze" => {
            let target = parse_target(rest.first())?;
            if keypair_path.is_none() {
                bail!("analyze requires --keypair PATH");
            }
            let signature = client.analyze_contract(&target, buffer_size).await?;
            println!("Analysis requested for {}", target);
            print_json(&json!({ "signature": signature.to_string() }))?;
        }
        "record-metrics" => {
            let gas_used = rest
                .first()
                .context("Missing GAS value")?
                .parse::<u64>()
                .context("GAS must be a non-negative integer")?;
            let success = match rest.get(1).map(String::as_str) {
                Some("true") => true,
                Some("false") => false,
                other => bail!("Expected true or false for success, got {:?}", other),
            };
            if keypair_path.is_none() {
                bail!("record-metrics requires --keypair PATH");
            }
            let signature = client.record_metrics(gas_used, success).await?;
            print_json(&json!({ "signature": signature.to_string() }))?;
        }
        "simulate" => {
            let target = parse_target(rest.first())?;
            let data_size = match rest.get(1) {
                Some(value) => value
                    .parse::<u64>()
                    .with_context(|| format!("Invalid DATA_LEN: {}", value))?,
                None => client.config().analysis_buffer_size,
            };
            // Simulation skips signature checks, so any fee payer will do
            if keypair_path.is_none() {
                client = client.with_wallet(Arc::new(KeypairWallet::new(Keypair::new())));
            }

            let outcome = client.simulate_analyze(&target, data_size).await?;
            let average = match client.fetch_metrics().await {
                Ok(metrics) => metrics.average_gas_used(),
                Err(e) => {
                    info!("No recorded metrics to compare against: {}", e);
                    0
                }
            };
            print_json(&json!({
                "target": target.to_string(),
                "data_size": data_size,
                "gas_level": GasLevel::classify(outcome.units_consumed, average),
                "average_gas_used": average,
                "simulation": outcome,
            }))?;
        }
        "" => print_usage(bin),
        other => {
            println!("Unknown command: {}", other);
            print_usage(bin);
        }
    }

    Ok(())
}
