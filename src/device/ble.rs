//! BLE link built on btleplug.
//!
//! btleplug is async; the link owns a private current-thread tokio runtime and
//! blocks on it. That is fine because the link only ever runs on the link
//! worker thread, never on the animation tick.

use anyhow::{Context, Result};
use btleplug::api::{
    BDAddr, Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use uuid::Uuid;

use super::Link;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct BleLink {
    runtime: Runtime,
    address: BDAddr,
    characteristic_uuid: Uuid,
    scan_timeout: Duration,
    peripheral: Option<Peripheral>,
    characteristic: Option<Characteristic>,
}

impl BleLink {
    /// Prepare a link to the strip at `address` writing to `characteristic`.
    ///
    /// Nothing is contacted until [`Link::connect`].
    pub fn new(address: &str, characteristic: &str, scan_timeout: Duration) -> Result<Self> {
        let parsed_address: BDAddr = address
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid device address '{address}': {e:?}"))?;
        let characteristic_uuid = Uuid::parse_str(characteristic)
            .with_context(|| format!("invalid characteristic UUID '{characteristic}'"))?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start BLE runtime")?;

        Ok(Self {
            runtime,
            address: parsed_address,
            characteristic_uuid,
            scan_timeout,
            peripheral: None,
            characteristic: None,
        })
    }
}

async fn find_peripheral(central: &Adapter, address: BDAddr) -> Result<Option<Peripheral>> {
    let peripherals = central.peripherals().await?;
    Ok(peripherals.into_iter().find(|p| p.address() == address))
}

impl Link for BleLink {
    fn connect(&mut self) -> Result<()> {
        let address = self.address;
        let characteristic_uuid = self.characteristic_uuid;
        let scan_timeout = self.scan_timeout;

        let (peripheral, characteristic) = self.runtime.block_on(async move {
            let manager = Manager::new()
                .await
                .context("Bluetooth manager unavailable")?;
            let central = manager
                .adapters()
                .await?
                .into_iter()
                .next()
                .context("No Bluetooth adapter found")?;

            central.start_scan(ScanFilter::default()).await?;

            let deadline = tokio::time::Instant::now() + scan_timeout;
            let peripheral = loop {
                if let Some(peripheral) = find_peripheral(&central, address).await? {
                    break peripheral;
                }
                if tokio::time::Instant::now() >= deadline {
                    let _ = central.stop_scan().await;
                    anyhow::bail!(
                        "device {address} not found within {}s",
                        scan_timeout.as_secs()
                    );
                }
                tokio::time::sleep(SCAN_POLL_INTERVAL).await;
            };
            let _ = central.stop_scan().await;

            peripheral
                .connect()
                .await
                .with_context(|| format!("failed to connect to {address}"))?;
            peripheral.discover_services().await?;

            let characteristic = peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.uuid == characteristic_uuid)
                .with_context(|| {
                    format!("characteristic {characteristic_uuid} not found on {address}")
                })?;

            Ok::<_, anyhow::Error>((peripheral, characteristic))
        })?;

        self.peripheral = Some(peripheral);
        self.characteristic = Some(characteristic);
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let (Some(peripheral), Some(characteristic)) = (&self.peripheral, &self.characteristic)
        else {
            anyhow::bail!("BLE link is not connected");
        };

        self.runtime
            .block_on(peripheral.write(characteristic, frame, WriteType::WithoutResponse))?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        match &self.peripheral {
            Some(peripheral) => self
                .runtime
                .block_on(peripheral.is_connected())
                .unwrap_or(false),
            None => false,
        }
    }

    fn disconnect(&mut self) -> Result<()> {
        self.characteristic = None;
        if let Some(peripheral) = self.peripheral.take() {
            self.runtime.block_on(peripheral.disconnect())?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ble"
    }
}
