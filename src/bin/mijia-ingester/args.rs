use clap::Parser;
use macaddr::MacAddr6;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "MIJIA_ADDRESS", default_value = "58:2D:34:35:96:1D")]
    pub address: MacAddr6,

    #[arg(long, env = "INFLUXDB_URL", default_value = "http://localhost:8086")]
    pub influxdb_url: String,

    #[arg(long, env = "INFLUXDB_DATABASE", default_value = "temp_sensors")]
    pub database: String,

    #[arg(long, env = "SENSOR_LOCATION", default_value = "Aussen")]
    pub location: String,

    /// Give up after this many failed connection attempts. Retries forever
    /// when unset.
    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long, default_value_t = 5)]
    pub retry_delay_secs: u64,
}
