//! WinRT BLE Transport
//!
//! [`BleTransport`] on top of `Windows.Devices.Bluetooth`.

use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::infrastructure::bluetooth::transport::{
    Advertisement, BleTransport, CharacteristicInfo, DescriptorInfo, NotificationSender, Profile,
    RawNotification, ServiceInfo,
};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use windows::core::GUID;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattDescriptor, GattValueChangedEventArgs,
};
use windows::Devices::Bluetooth::{BluetoothCacheMode, BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, IBuffer};

fn read_buffer(buffer: &IBuffer) -> windows::core::Result<Vec<u8>> {
    let reader = DataReader::FromBuffer(buffer)?;
    let length = reader.UnconsumedBufferLength()? as usize;
    let mut bytes = vec![0u8; length];
    reader.ReadBytes(&mut bytes)?;
    Ok(bytes)
}

fn check(status: GattCommunicationStatus, what: &str) -> Result<()> {
    if status != GattCommunicationStatus::Success {
        return Err(anyhow!("{} failed: {:?}", what, status));
    }
    Ok(())
}

/// Live notification senders by characteristic handle. Emptied when the
/// link drops so the receiving side sees the channel close.
type SinkMap = Arc<Mutex<HashMap<u16, NotificationSender>>>;

fn clear_sinks(sinks: &SinkMap) {
    if let Ok(mut map) = sinks.lock() {
        map.clear();
    }
}

/// Single-device WinRT central
#[derive(Default)]
pub struct WinRtTransport {
    device: Option<BluetoothLEDevice>,
    characteristics: HashMap<u16, GattCharacteristic>,
    descriptors: HashMap<u16, GattDescriptor>,
    /// ValueChanged registration per characteristic handle
    tokens: HashMap<u16, i64>,
    sinks: SinkMap,
}

impl WinRtTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn characteristic(&self, info: &CharacteristicInfo) -> Result<&GattCharacteristic> {
        self.characteristics
            .get(&info.handle)
            .ok_or_else(|| anyhow!("Unknown characteristic handle 0x{:02X}", info.handle))
    }
}

impl BleTransport for WinRtTransport {
    async fn scan(
        &mut self,
        filter: &(dyn Fn(&Advertisement) -> bool + Sync),
    ) -> Result<Advertisement> {
        // Dropping the scanner on any exit path stops the watcher
        let mut scanner = BleScanner::start()?;
        let found = scanner.next_match(filter).await?;
        scanner.stop()?;
        Ok(found)
    }

    async fn connect(&mut self, device: &Advertisement) -> Result<()> {
        info!("Connecting to Bluetooth device: {:#X}", device.address);
        let le_device =
            BluetoothLEDevice::FromBluetoothAddressAsync(device.address)?.await?;
        info!("Device connected: {:?}", le_device.Name()?);

        let sinks = self.sinks.clone();
        le_device.ConnectionStatusChanged(&TypedEventHandler::new(
            move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                if let Some(dev) = dev.as_ref() {
                    if dev.ConnectionStatus()? == BluetoothConnectionStatus::Disconnected {
                        warn!("Device reported disconnection");
                        clear_sinks(&sinks);
                    }
                }
                Ok(())
            },
        ))?;
        self.device = Some(le_device);
        Ok(())
    }

    async fn discover_profile(&mut self) -> Result<Profile> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| anyhow!("Not connected"))?;

        let services_result = device
            .GetGattServicesWithCacheModeAsync(BluetoothCacheMode::Uncached)?
            .await?;
        check(services_result.Status()?, "GATT service discovery")?;

        let mut profile = Profile::default();
        let services = services_result.Services()?;
        for i in 0..services.Size()? {
            let service = services.GetAt(i)?;
            let service_uuid = service.Uuid()?.to_u128();
            let mut info = ServiceInfo {
                uuid: service_uuid,
                handle: service.AttributeHandle()?,
                characteristics: Vec::new(),
            };

            let chars_result = service.GetCharacteristicsAsync()?.await?;
            if let Err(e) = check(chars_result.Status()?, "Characteristic discovery") {
                // Some system services refuse access; the wand's own don't
                warn!("Service {:?}: {}", GUID::from_u128(service_uuid), e);
                profile.services.push(info);
                continue;
            }

            let characteristics = chars_result.Characteristics()?;
            for j in 0..characteristics.Size()? {
                let c = characteristics.GetAt(j)?;
                let handle = c.AttributeHandle()?;

                let mut descriptors = Vec::new();
                let desc_result = c.GetDescriptorsAsync()?.await?;
                if desc_result.Status()? == GattCommunicationStatus::Success {
                    let list = desc_result.Descriptors()?;
                    for k in 0..list.Size()? {
                        let d = list.GetAt(k)?;
                        let d_handle = d.AttributeHandle()?;
                        descriptors.push(DescriptorInfo {
                            uuid: d.Uuid()?.to_u128(),
                            handle: d_handle,
                        });
                        self.descriptors.insert(d_handle, d);
                    }
                }

                info.characteristics.push(CharacteristicInfo {
                    uuid: c.Uuid()?.to_u128(),
                    service_uuid,
                    properties: (c.CharacteristicProperties()?.0 & 0xFF) as u8,
                    handle,
                    value_handle: handle + 1,
                    descriptors,
                });
                self.characteristics.insert(handle, c);
            }

            debug!(
                "Service {:?}: {} characteristics",
                GUID::from_u128(service_uuid),
                info.characteristics.len()
            );
            profile.services.push(info);
        }

        Ok(profile)
    }

    async fn read_descriptor(
        &mut self,
        _characteristic: &CharacteristicInfo,
        descriptor: &DescriptorInfo,
    ) -> Result<Vec<u8>> {
        let d = self
            .descriptors
            .get(&descriptor.handle)
            .ok_or_else(|| anyhow!("Unknown descriptor handle 0x{:02X}", descriptor.handle))?;
        let result = d
            .ReadValueWithCacheModeAsync(BluetoothCacheMode::Uncached)?
            .await?;
        check(result.Status()?, "Descriptor read")?;
        Ok(read_buffer(&result.Value()?)?)
    }

    async fn subscribe(
        &mut self,
        characteristic: &CharacteristicInfo,
        sink: NotificationSender,
    ) -> Result<()> {
        let c = self.characteristic(characteristic)?.clone();
        let uuid = characteristic.uuid;
        let handle = characteristic.handle;

        if let Ok(mut map) = self.sinks.lock() {
            map.insert(handle, sink);
        }

        let sinks = self.sinks.clone();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let payload = read_buffer(&args.CharacteristicValue()?)?;
                    if let Ok(map) = sinks.lock() {
                        if let Some(sink) = map.get(&handle) {
                            let _ = sink.send(RawNotification { uuid, payload });
                        }
                    }
                }
                Ok(())
            },
        );
        let token = c.ValueChanged(&handler)?;

        let status = c
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::Notify,
            )?
            .await?;
        if let Err(e) = check(status, "Notification subscription") {
            let _ = c.RemoveValueChanged(token);
            if let Ok(mut map) = self.sinks.lock() {
                map.remove(&handle);
            }
            return Err(e);
        }

        self.tokens.insert(characteristic.handle, token);
        Ok(())
    }

    async fn unsubscribe(&mut self, characteristic: &CharacteristicInfo) -> Result<()> {
        let c = self.characteristic(characteristic)?.clone();

        let status = c
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::None,
            )?
            .await?;
        check(status, "Notification unsubscription")?;

        if let Some(token) = self.tokens.remove(&characteristic.handle) {
            c.RemoveValueChanged(token)?;
        }
        if let Ok(mut map) = self.sinks.lock() {
            map.remove(&characteristic.handle);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        clear_sinks(&self.sinks);
        for (handle, token) in self.tokens.drain() {
            if let Some(c) = self.characteristics.get(&handle) {
                let _ = c.RemoveValueChanged(token);
            }
        }
        self.descriptors.clear();
        self.characteristics.clear();

        if let Some(device) = self.device.take() {
            device.Close()?;
        }
        Ok(())
    }
}
