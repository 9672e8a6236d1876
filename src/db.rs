use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use influxdb::{Client, ReadQuery, Timestamp, WriteQuery};
use tracing::info;

use crate::mijia::Sample;

pub fn new_client(url: &str, database: &str) -> Client {
    Client::new(url, database)
}

/// Create the target database when it does not exist yet. Idempotent, safe to
/// call every cycle.
pub async fn ensure_database(client: &Client, database: &str) -> Result<()> {
    let response = client
        .query(ReadQuery::new("SHOW DATABASES"))
        .await
        .context("failed to list databases")?;

    let names = database_names(&response).context("failed to parse database list")?;

    if !names.iter().any(|name| name == database) {
        info!(database, "creating database");
        client
            .query(ReadQuery::new(format!("CREATE DATABASE \"{database}\"")))
            .await
            .with_context(|| format!("failed to create database {database}"))?;
    }

    Ok(())
}

/// Write one complete sample as three measurement points, each tagged with
/// the sensor location and stamped with the current wall clock.
pub async fn write_sample(client: &Client, sample: &Sample, location: &str) -> Result<()> {
    let Some(points) = sample_points(sample, location, Timestamp::from(Utc::now())) else {
        bail!("refusing to write incomplete sample: {sample:?}");
    };

    for point in points {
        client
            .query(point)
            .await
            .context("failed to write measurement")?;
    }

    Ok(())
}

/// Assemble the measurement points for a sample, or `None` while any field is
/// still missing.
pub fn sample_points(
    sample: &Sample,
    location: &str,
    timestamp: Timestamp,
) -> Option<Vec<WriteQuery>> {
    let temperature = sample.temperature?;
    let humidity = sample.humidity?;
    let battery_percent = sample.battery_percent?;

    let points = [
        ("Temperature", temperature),
        ("Humidity", humidity),
        ("Bat_lvl", f64::from(battery_percent)),
    ]
    .into_iter()
    .map(|(measurement, value)| {
        WriteQuery::new(timestamp, measurement)
            .add_tag("location", location)
            .add_field("value", value)
    })
    .collect();

    Some(points)
}

fn database_names(response: &str) -> Result<Vec<String>> {
    let body: serde_json::Value =
        serde_json::from_str(response).context("response is not valid JSON")?;

    let Some(results) = body["results"].as_array() else {
        bail!("response has no results array");
    };

    let mut names = Vec::new();
    for result in results {
        for series in result["series"].as_array().into_iter().flatten() {
            for row in series["values"].as_array().into_iter().flatten() {
                if let Some(name) = row[0].as_str() {
                    names.push(name.to_owned());
                }
            }
        }
    }

    Ok(names)
}
