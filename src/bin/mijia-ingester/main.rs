mod args;
mod ble;

use std::process::ExitCode;

use anyhow::{Context as _, Result, anyhow, bail};
use args::Args;
use balcony_environments::{db, mijia::Sample};
use btleplug::api::{Central as _, Manager as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use clap::Parser as _;
use macaddr::MacAddr6;
use tokio::time::{Duration, sleep};
use tracing::metadata::LevelFilter;
use tracing::{info, warn};

/// Grace period for the continuous scan to pick the sensor up before each
/// connection attempt.
const SCAN_SETTLE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> ExitCode {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let client = db::new_client(&args.influxdb_url, &args.database);

    let manager = Manager::new()
        .await
        .context("failed to initialize Bluetooth manager")?;

    let adapters = manager
        .adapters()
        .await
        .context("failed to get Bluetooth adapters")?;

    let adapter = adapters
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no Bluetooth adapters found"))?;

    adapter
        .start_scan(ScanFilter::default())
        .await
        .context("failed to start BLE scan")?;

    let mut sample = Sample::default();
    let mut failed_attempts = 0u32;

    loop {
        db::ensure_database(&client, &args.database)
            .await
            .context("failed to prepare database")?;

        sleep(SCAN_SETTLE).await;

        info!(address = %args.address, "connecting");
        if let Err(err) = collect_once(&adapter, args.address, &mut sample).await {
            failed_attempts += 1;
            warn!(failed_attempts, "device unreachable: {err:#}");

            if let Some(max) = args.max_retries
                && failed_attempts >= max
            {
                bail!("device {} unreachable after {failed_attempts} attempts", args.address);
            }

            sleep(Duration::from_secs(args.retry_delay_secs)).await;
            continue;
        }

        if sample.is_complete() {
            db::write_sample(&client, &sample, &args.location)
                .await
                .context("failed to store sample")?;

            info!(
                database = %args.database,
                location = %args.location,
                "sample stored"
            );
            sample.clear();
            return Ok(());
        }
    }
}

/// One full session: connect, fill whatever the sample is still missing,
/// disconnect. The connection is closed even when collection fails.
async fn collect_once(adapter: &Adapter, address: MacAddr6, sample: &mut Sample) -> Result<()> {
    let mut link = ble::PeripheralLink::connect(adapter, address).await?;
    let result = ble::collect_sample(&mut link, sample).await;
    link.disconnect().await;
    result
}
