//! destripe-ctl
//!
//! Operator tool for destripe mapping tables: validates a construction
//! line against a file-backed device, prints both status views, and maps
//! individual sectors for inspection. The device identifier in the table
//! line is interpreted as a filesystem path; capacity comes from the file
//! length.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use destripe::{
    BlockDevice, DestripeTarget, DeviceResolver, EventSink, SECTOR_SHIFT, StatusMode,
    TargetParams, ThreadWorkqueue,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "destripe-ctl", about = "Destripe mapping table inspector")]
struct Args {
    /// Mapping name used in status output
    #[arg(long, default_value = "ctl")]
    name: String,

    /// First logical sector of the mapped region
    #[arg(long, default_value_t = 0)]
    target_start: u64,

    /// Mapped region length in sectors
    #[arg(long)]
    target_len: u64,

    /// Log level (trace / debug / info / warn / error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a table line and print both status views
    Check {
        /// Table tokens: <stripes> <idx> <chunk> <1> <device-path> <start>
        #[arg(num_args = 1.., required = true)]
        table: Vec<String>,
    },
    /// Print the physical location of one or more logical sectors
    Map {
        /// Table tokens: <stripes> <idx> <chunk> <1> <device-path> <start>
        #[arg(num_args = 1.., required = true)]
        table: Vec<String>,

        /// First logical sector to map
        #[arg(long)]
        sector: u64,

        /// Number of consecutive sectors to map
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
}

// ── File-backed device ────────────────────────────────────────────────────────

struct FileDevice {
    path: String,
    capacity: u64,
}

impl BlockDevice for FileDevice {
    fn name(&self) -> &str {
        &self.path
    }

    fn capacity_sectors(&self) -> io::Result<u64> {
        Ok(self.capacity)
    }
}

struct FileResolver;

impl DeviceResolver for FileResolver {
    fn open(&self, name: &str) -> io::Result<Arc<dyn BlockDevice>> {
        let meta = std::fs::metadata(Path::new(name))?;
        Ok(Arc::new(FileDevice {
            path: name.to_string(),
            capacity: meta.len() >> SECTOR_SHIFT,
        }))
    }
}

/// Health events have nowhere to go from a one-shot tool; log them.
struct LogSink;

impl EventSink for LogSink {
    fn device_event(&self, target: &str) {
        warn!(target_name = %target, "device health event");
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let params = TargetParams {
        name: args.name.clone(),
        start: args.target_start,
        len: args.target_len,
    };

    match args.command {
        Command::Check { table } => {
            let target = construct(&params, &table)?;
            println!("table: {}", target.status(StatusMode::Table));
            println!("info:{}", target.status(StatusMode::Info));
            let hints = target.io_hints();
            println!(
                "hints: io_min={} io_opt={} split={} sectors",
                hints.io_min,
                hints.io_opt,
                target.split_boundary()
            );
        }
        Command::Map {
            table,
            sector,
            count,
        } => {
            if count == 0 {
                bail!("--count must be at least 1");
            }
            if sector < args.target_start {
                bail!("--sector is below --target-start");
            }
            let target = construct(&params, &table)?;
            let map = *target.stripe_map();
            for logical in sector..sector + count {
                let physical =
                    map.map_sector(logical - args.target_start) + target.physical_start();
                println!(
                    "{} -> {} ({})",
                    logical,
                    physical,
                    target.iterate_devices(|dev, _, _| dev.name().to_string())
                );
            }
        }
    }

    Ok(())
}

fn construct(params: &TargetParams, table: &[String]) -> Result<DestripeTarget> {
    let tokens: Vec<&str> = table.iter().map(String::as_str).collect();
    DestripeTarget::new(
        params,
        &tokens,
        &FileResolver,
        Arc::new(LogSink),
        Arc::new(ThreadWorkqueue::new()),
    )
    .context("table line rejected")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn backing_file(sectors: u64) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; (sectors << SECTOR_SHIFT) as usize])
            .unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_file_resolver_reports_capacity() {
        let file = backing_file(64);
        let dev = FileResolver
            .open(file.path().to_str().unwrap())
            .unwrap();
        assert_eq!(dev.capacity_sectors().unwrap(), 64);
    }

    #[test]
    fn test_construct_against_backing_file() {
        // 4 stripes * 16 target sectors = 64 backing sectors needed.
        let file = backing_file(64);
        let path = file.path().to_str().unwrap().to_string();

        let params = TargetParams {
            name: "ctl".to_string(),
            start: 0,
            len: 16,
        };
        let table: Vec<String> = ["4", "1", "8", "1", path.as_str(), "0"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let target = construct(&params, &table).unwrap();
        assert_eq!(
            target.status(StatusMode::Table),
            format!("1 8 {path} 0")
        );
    }

    #[test]
    fn test_construct_rejects_short_backing_file() {
        let file = backing_file(32);
        let path = file.path().to_str().unwrap().to_string();

        let params = TargetParams {
            name: "ctl".to_string(),
            start: 0,
            len: 16,
        };
        let table: Vec<String> = ["4", "1", "8", "1", path.as_str(), "0"]
            .iter()
            .map(ToString::to_string)
            .collect();

        assert!(construct(&params, &table).is_err());
    }
}
