//! BLE Transport Contract
//!
//! The narrow surface the session manager needs from a BLE stack. Platform
//! backends implement [`BleTransport`]; tests use an in-memory one.

use anyhow::Result;
use tokio::sync::mpsc;

/// One advertisement seen while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub local_name: String,
    pub address: u64,
    pub rssi: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorInfo {
    pub uuid: u128,
    pub handle: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: u128,
    pub service_uuid: u128,
    /// GATT property bits, see [`super::protocol::property`]
    pub properties: u8,
    pub handle: u16,
    pub value_handle: u16,
    pub descriptors: Vec<DescriptorInfo>,
}

impl CharacteristicInfo {
    pub fn can_notify(&self) -> bool {
        self.properties & super::protocol::property::NOTIFY != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: u128,
    pub handle: u16,
    pub characteristics: Vec<CharacteristicInfo>,
}

/// Everything discovered on the connected device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub services: Vec<ServiceInfo>,
}

impl Profile {
    pub fn characteristics(&self) -> impl Iterator<Item = &CharacteristicInfo> {
        self.services.iter().flat_map(|s| s.characteristics.iter())
    }
}

/// Payload pushed by a subscribed characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub uuid: u128,
    pub payload: Vec<u8>,
}

pub type NotificationSender = mpsc::UnboundedSender<RawNotification>;

/// A BLE central able to hold one connection.
///
/// Delivery is serialized per characteristic by the implementation; the
/// order across characteristics is unspecified. Dropping every clone of the
/// [`NotificationSender`] handed to `subscribe` signals a lost connection.
#[allow(async_fn_in_trait)]
pub trait BleTransport {
    /// Scan until an advertisement satisfies `filter`. Never times out on
    /// its own; callers bound it.
    async fn scan(
        &mut self,
        filter: &(dyn Fn(&Advertisement) -> bool + Sync),
    ) -> Result<Advertisement>;

    async fn connect(&mut self, device: &Advertisement) -> Result<()>;

    async fn discover_profile(&mut self) -> Result<Profile>;

    async fn read_descriptor(
        &mut self,
        characteristic: &CharacteristicInfo,
        descriptor: &DescriptorInfo,
    ) -> Result<Vec<u8>>;

    async fn subscribe(
        &mut self,
        characteristic: &CharacteristicInfo,
        sink: NotificationSender,
    ) -> Result<()>;

    async fn unsubscribe(&mut self, characteristic: &CharacteristicInfo) -> Result<()>;

    /// Cancel the connection
    async fn disconnect(&mut self) -> Result<()>;
}
