//! SenseWire CLI - decode and replay sensor packets from the command line
//!
//! Inspect schema layouts, decode single packets, and replay captured
//! characteristic reads through the decoder.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use sensewire_core::{decode_packet, SensorRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod replay;

use config::Config;

/// SenseWire - schema-driven decoding of peripheral sensor packets
#[derive(Parser)]
#[command(name = "sensewire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Schema file path (defaults to the built-in gesture profile)
    #[arg(short, long, global = true, env = "SENSEWIRE_SCHEMA")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered sensors and their wire layouts
    Schemas,

    /// Decode one packet and print its fields as JSON
    Decode {
        /// Sensor name or characteristic UUID
        #[arg(short, long)]
        sensor: String,

        /// Packet bytes in hex
        hex: String,
    },

    /// Replay a capture file through the decoder
    Replay {
        /// Capture file (`<sensor|uuid> <hex>` per line)
        file: PathBuf,

        /// Delay between packets in milliseconds
        #[arg(short, long, default_value = "0")]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Schemas => {
            print_schemas(&config)?;
        }

        Commands::Decode { sensor, hex } => {
            decode_one(&config, &sensor, &hex)?;
        }

        Commands::Replay { file, interval_ms } => {
            // Handle Ctrl+C
            let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received shutdown signal");
                    let _ = shutdown_tx.send(()).await;
                }
            });

            let registry = Arc::new(replay::build_registry(&config)?);
            println!(
                "{} Replaying {} ({} sensors)",
                "SENSEWIRE".cyan().bold(),
                file.display(),
                registry.schemas().len()
            );

            let summary = replay::run_replay(
                Arc::clone(&registry),
                &file,
                Duration::from_millis(interval_ms),
                &mut shutdown_rx,
            )
            .await?;

            print_stats(&registry, &summary);
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

fn print_schemas(config: &Config) -> Result<()> {
    if let Some(service) = &config.service_uuid {
        println!("{} service {}", "SENSEWIRE".cyan().bold(), service);
    }
    println!("History depth: {}", config.max_records);

    for (sensor, schema) in config.sensors.iter().zip(config.schemas()?) {
        println!();
        println!(
            "{} {} ({:?}, every {} ms, {} bytes)",
            schema.id().to_string().green().bold(),
            schema
                .uuid()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "-".to_string()),
            schema.mode(),
            sensor.poll_interval().as_millis(),
            schema.total_width()
        );
        for field in schema.fields() {
            println!(
                "  {:>4}  {:<16} {} ({} bytes)",
                field.offset,
                field.name,
                field.ty,
                field.ty.width()
            );
        }
    }
    Ok(())
}

fn decode_one(config: &Config, sensor: &str, hex_payload: &str) -> Result<()> {
    let schemas = config.schemas()?;

    let schema = match uuid::Uuid::parse_str(sensor) {
        Ok(uuid) => schemas.iter().find(|s| s.uuid() == Some(uuid)),
        Err(_) => schemas.iter().find(|s| s.id().as_str() == sensor),
    }
    .with_context(|| format!("Unknown sensor {}", sensor))?;

    let digits: String = hex_payload
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(digits).context("Invalid hex payload")?;

    let record = decode_packet(schema, &bytes)
        .with_context(|| format!("Failed to decode {} byte packet for {}", bytes.len(), sensor))?;

    let mut fields = serde_json::Map::new();
    for field in &record.fields {
        fields.insert(field.name.clone(), serde_json::to_value(&field.value)?);
    }
    let output = serde_json::json!({
        "sensor": record.sensor,
        "bytes": record.bytes_consumed,
        "trailing": record.trailing,
        "fields": fields,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn print_stats(registry: &SensorRegistry, summary: &replay::ReplaySummary) {
    let stats = registry.stats();
    println!(
        "{} {} delivered, {} rejected, {} malformed lines, {} bytes decoded",
        "DONE".green().bold(),
        summary.delivered,
        summary.rejected,
        summary.malformed,
        stats.bytes_received
    );
    for id in registry.dirty_sensors() {
        if let Ok(true) = registry.take_dirty(id.as_str()) {
            info!("{} has unconsumed updates", id);
        }
    }
}
