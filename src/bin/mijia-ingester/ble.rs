use std::pin::Pin;

use anyhow::{Context as _, Result, anyhow, bail};
use balcony_environments::mijia::{Sample, parse_reading};
use btleplug::api::{Central as _, Characteristic, Peripheral as _, ValueNotification};
use btleplug::platform::{Adapter, Peripheral};
use macaddr::MacAddr6;
use tokio::time::{Duration, timeout};
use tokio_stream::{Stream, StreamExt as _};
use tracing::{debug, info, warn};
use uuid::{Uuid, uuid};

const BATTERY_SERVICE_UUID: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");
const BATTERY_CHARACTERISTIC_UUID: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

const DATA_SERVICE_UUID: Uuid = uuid!("226c0000-6476-4566-7562-66734470666d");
const DATA_CHARACTERISTIC_UUID: Uuid = uuid!("226caa55-6476-4566-7562-66734470666d");

const NOTIFICATION_POLL: Duration = Duration::from_secs(1);

/// One GATT link to the sensor. The seam lets the collection sequence run
/// against a scripted link in tests.
pub trait SensorLink {
    async fn read_battery_percent(&mut self) -> Result<u8>;

    async fn start_notifications(&mut self) -> Result<()>;

    /// Wait up to the poll interval for the next data notification. `None`
    /// means nothing arrived yet and the link is still up.
    async fn next_payload(&mut self) -> Result<Option<String>>;

    async fn stop_notifications(&mut self) -> Result<()>;
}

/// Drive one connected link until the sample holds everything it is still
/// missing.
///
/// The battery read and the notification wait are both skipped when the
/// sample already carries their values from a prior attempt, so a reconnect
/// never repeats work. Any returned error means the device became
/// unreachable; the sample keeps the fields collected so far.
pub async fn collect_sample(link: &mut impl SensorLink, sample: &mut Sample) -> Result<()> {
    if sample.battery_percent.is_none() {
        let percent = link.read_battery_percent().await?;
        info!(percent, "battery level");
        sample.record_battery(percent);
    }

    if sample.temperature.is_none() || sample.humidity.is_none() {
        link.start_notifications().await?;

        loop {
            let Some(payload) = link.next_payload().await? else {
                continue;
            };

            match parse_reading(&payload) {
                Some(reading) => {
                    info!(
                        temperature = reading.temperature,
                        humidity = reading.humidity,
                        "sensor reading"
                    );
                    sample.record_reading(reading);
                    break;
                }
                None => debug!(%payload, "notification without reading"),
            }
        }

        // The sample is already captured; a failed teardown is not worth a
        // retry cycle.
        if let Err(err) = link.stop_notifications().await {
            warn!("failed to disable notifications: {err:#}");
        }
    }

    Ok(())
}

pub struct PeripheralLink {
    peripheral: Peripheral,
    battery: Characteristic,
    data: Characteristic,
    notifications: Pin<Box<dyn Stream<Item = ValueNotification> + Send>>,
}

impl PeripheralLink {
    /// Connect to the sensor among the peripherals the adapter has
    /// discovered and resolve both characteristics.
    pub async fn connect(adapter: &Adapter, address: MacAddr6) -> Result<Self> {
        let peripheral = find_peripheral(adapter, address)
            .await?
            .ok_or_else(|| anyhow!("device {address} not discovered"))?;

        peripheral
            .connect()
            .await
            .with_context(|| format!("failed to connect to {address}"))?;
        peripheral
            .discover_services()
            .await
            .context("failed to discover services")?;

        let battery =
            find_characteristic(&peripheral, BATTERY_SERVICE_UUID, BATTERY_CHARACTERISTIC_UUID)
                .context("battery characteristic not found")?;
        let data = find_characteristic(&peripheral, DATA_SERVICE_UUID, DATA_CHARACTERISTIC_UUID)
            .context("data characteristic not found")?;

        let notifications = peripheral
            .notifications()
            .await
            .context("failed to open notification stream")?;

        Ok(Self {
            peripheral,
            battery,
            data,
            notifications,
        })
    }

    pub async fn disconnect(&self) {
        if let Err(err) = self.peripheral.disconnect().await {
            warn!("failed to disconnect: {err:#}");
        }
    }
}

impl SensorLink for PeripheralLink {
    async fn read_battery_percent(&mut self) -> Result<u8> {
        let value = self
            .peripheral
            .read(&self.battery)
            .await
            .context("failed to read battery characteristic")?;

        let Some(&percent) = value.first() else {
            bail!("empty battery characteristic value");
        };

        Ok(percent)
    }

    async fn start_notifications(&mut self) -> Result<()> {
        self.peripheral
            .subscribe(&self.data)
            .await
            .context("failed to enable notifications")
    }

    async fn next_payload(&mut self) -> Result<Option<String>> {
        match timeout(NOTIFICATION_POLL, self.notifications.next()).await {
            Err(_) => {
                if !self.peripheral.is_connected().await.unwrap_or(false) {
                    bail!("connection lost while waiting for notifications");
                }
                Ok(None)
            }
            Ok(None) => bail!("notification stream closed"),
            Ok(Some(notification)) => {
                if notification.uuid != DATA_CHARACTERISTIC_UUID {
                    return Ok(None);
                }
                Ok(Some(
                    String::from_utf8_lossy(&notification.value).into_owned(),
                ))
            }
        }
    }

    async fn stop_notifications(&mut self) -> Result<()> {
        self.peripheral
            .unsubscribe(&self.data)
            .await
            .context("failed to disable notifications")
    }
}

async fn find_peripheral(adapter: &Adapter, address: MacAddr6) -> Result<Option<Peripheral>> {
    let peripherals = adapter
        .peripherals()
        .await
        .context("failed to get BLE peripherals")?;

    Ok(peripherals
        .into_iter()
        .find(|p| MacAddr6::from(p.address().into_inner()) == address))
}

fn find_characteristic(
    peripheral: &Peripheral,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
) -> Option<Characteristic> {
    peripheral
        .services()
        .into_iter()
        .find(|service| service.uuid == service_uuid)?
        .characteristics
        .into_iter()
        .find(|characteristic| characteristic.uuid == characteristic_uuid)
}
