//! BLE Scanner Module
//!
//! WinRT advertisement watcher feeding advertisements into a channel.

use crate::infrastructure::bluetooth::transport::Advertisement;
use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Foundation::TypedEventHandler;

/// Active scan that stops when dropped
pub struct BleScanner {
    watcher: Option<BluetoothLEAdvertisementWatcher>,
    received: mpsc::UnboundedReceiver<Advertisement>,
}

impl BleScanner {
    /// Start an active scan reporting every advertisement
    pub fn start() -> Result<Self> {
        info!("Starting BLE scan");

        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let (sender, received) = mpsc::unbounded_channel();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let adv = args.Advertisement()?;
                    let _ = sender.send(Advertisement {
                        local_name: adv.LocalName()?.to_string(),
                        address: args.BluetoothAddress()?,
                        rssi: args.RawSignalStrengthInDBm()?,
                    });
                }
                Ok(())
            },
        );

        watcher.Received(&handler)?;
        watcher.Start()?;

        Ok(Self {
            watcher: Some(watcher),
            received,
        })
    }

    /// Wait for the next advertisement accepted by `filter`
    pub async fn next_match(
        &mut self,
        filter: &(dyn Fn(&Advertisement) -> bool + Sync),
    ) -> Result<Advertisement> {
        while let Some(adv) = self.received.recv().await {
            if filter(&adv) {
                return Ok(adv);
            }
            debug!("Skipping {:?} ({:#X})", adv.local_name, adv.address);
        }
        anyhow::bail!("Advertisement watcher stopped")
    }

    /// Stop scanning
    pub fn stop(&mut self) -> Result<()> {
        if let Some(watcher) = self.watcher.take() {
            info!("Stopping BLE scan");
            watcher.Stop()?;
        }
        Ok(())
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
