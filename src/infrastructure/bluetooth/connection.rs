//! BLE Session Module
//!
//! Owns the single wand connection: scan, profile discovery, the set of
//! active subscriptions, and the orderly teardown of all of them.

use crate::domain::models::ConnectionState;
use crate::infrastructure::bluetooth::error::WandError;
use crate::infrastructure::bluetooth::protocol::{self, format_uuid, property_string, uuid_name};
use crate::infrastructure::bluetooth::transport::{
    Advertisement, BleTransport, CharacteristicInfo, NotificationSender, Profile,
};
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Wand connection and its subscription set
pub struct WandSession<T: BleTransport> {
    transport: T,
    state: ConnectionState,
    device: Option<Advertisement>,
    profile: Option<Profile>,
    subscriptions: Vec<CharacteristicInfo>,
}

impl<T: BleTransport> WandSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConnectionState::Idle,
            device: None,
            profile: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn device(&self) -> Option<&Advertisement> {
        self.device.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn subscriptions(&self) -> &[CharacteristicInfo] {
        &self.subscriptions
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    fn expect_state(
        &self,
        expected: ConnectionState,
        operation: &'static str,
    ) -> Result<(), WandError> {
        if self.state != expected {
            return Err(WandError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Connect to the first device whose name starts with `name_prefix`
    /// (case-insensitive) and discover its profile.
    ///
    /// Scan and connect together are bounded by `timeout`. `cancel` aborts
    /// any phase, discovery included, as soon as it resolves. Once a device
    /// has been found the session stays `Connected` on failure, so
    /// [`WandSession::shutdown`] still closes whatever link was opened.
    pub async fn connect(
        &mut self,
        name_prefix: &str,
        timeout: Duration,
        cancel: impl Future<Output = ()>,
    ) -> Result<(), WandError> {
        self.expect_state(ConnectionState::Idle, "connect")?;

        info!("Scanning for {} for {:?}", name_prefix, timeout);
        self.state = ConnectionState::Scanning;

        let deadline = Instant::now() + timeout;
        let mut cancel = pin!(cancel);

        let wanted = name_prefix.to_uppercase();
        let filter = move |adv: &Advertisement| adv.local_name.to_uppercase().starts_with(&wanted);

        let scanned = tokio::select! {
            biased;
            _ = &mut cancel => None,
            result = timeout_at(deadline, self.transport.scan(&filter)) => Some(result),
        };
        let device = match scanned {
            None => {
                warn!("Scan cancelled");
                self.state = ConnectionState::Disconnected;
                return Err(WandError::Cancelled);
            }
            Some(Err(_elapsed)) => {
                error!("No {} found within {:?}", name_prefix, timeout);
                self.state = ConnectionState::Disconnected;
                return Err(WandError::ConnectTimeout {
                    prefix: name_prefix.to_string(),
                    timeout,
                });
            }
            Some(Ok(Err(e))) => {
                error!("Scan failed: {:#}", e);
                self.state = ConnectionState::Disconnected;
                return Err(WandError::Device(format!("{:#}", e)));
            }
            Some(Ok(Ok(device))) => device,
        };

        // The transport may hold a link from here on
        self.state = ConnectionState::Connected;
        self.device = Some(device.clone());

        let linked = tokio::select! {
            biased;
            _ = &mut cancel => None,
            result = timeout_at(deadline, self.transport.connect(&device)) => Some(result),
        };
        match linked {
            None => {
                warn!("Connect cancelled");
                return Err(WandError::Cancelled);
            }
            Some(Err(_elapsed)) => {
                error!("Connecting to {} timed out", device.local_name);
                return Err(WandError::Device(format!(
                    "connect to {} timed out after {:?}",
                    device.local_name, timeout
                )));
            }
            Some(Ok(Err(e))) => {
                error!("Can't connect to {}: {:#}", device.local_name, e);
                return Err(WandError::Device(format!("{:#}", e)));
            }
            Some(Ok(Ok(()))) => {}
        }

        info!(
            "Connected to {} ({:#X}, rssi {})",
            device.local_name, device.address, device.rssi
        );

        info!("Discovering profile");
        let discovered = tokio::select! {
            biased;
            _ = &mut cancel => None,
            result = self.transport.discover_profile() => Some(result),
        };
        let profile = match discovered {
            None => {
                warn!("Profile discovery cancelled");
                return Err(WandError::Cancelled);
            }
            Some(result) => {
                result.map_err(|e| WandError::ProfileDiscovery(format!("{:#}", e)))?
            }
        };
        info!(
            "Profile discovered: {} services, {} characteristics",
            profile.services.len(),
            profile.characteristics().count()
        );
        self.profile = Some(profile);
        self.state = ConnectionState::ProfileDiscovered;

        Ok(())
    }

    /// Log the profile and dump the descriptors of characteristics accepted
    /// by `selector`. Read failures are logged and skipped.
    pub async fn explore(&mut self, selector: impl Fn(u128) -> bool) -> Result<(), WandError> {
        self.expect_state(ConnectionState::ProfileDiscovered, "explore")?;
        let Some(profile) = self.profile.clone() else {
            return Ok(());
        };

        for service in &profile.services {
            info!(
                service = %format_uuid(service.uuid),
                name = uuid_name(service.uuid),
                handle = %format!("0x{:02X}", service.handle),
                "Service discovered"
            );

            for c in &service.characteristics {
                info!(
                    service = %format_uuid(service.uuid),
                    characteristic = %format_uuid(c.uuid),
                    name = uuid_name(c.uuid),
                    property = %property_string(c.properties),
                    handle = %format!("0x{:02X}", c.handle),
                    value_handle = %format!("0x{:02X}", c.value_handle),
                    "Characteristic discovered"
                );

                if !selector(c.uuid) {
                    continue;
                }

                for d in &c.descriptors {
                    match self.transport.read_descriptor(c, d).await {
                        Ok(value) => info!(
                            descriptor = %format_uuid(d.uuid),
                            handle = %format!("0x{:02X}", d.handle),
                            "Value read: {:02x?} | {:?}",
                            value,
                            String::from_utf8_lossy(&value)
                        ),
                        Err(e) => error!(
                            descriptor = %format_uuid(d.uuid),
                            "Read error: {:#}",
                            e
                        ),
                    }
                }
            }
        }
        Ok(())
    }

    /// Subscribe to every notifying characteristic accepted by `selector`.
    ///
    /// Service Changed and the vendor-reserved characteristic are never
    /// touched. The first failure aborts; what was already subscribed stays
    /// recorded so [`WandSession::shutdown`] can undo it.
    pub async fn subscribe(
        &mut self,
        selector: impl Fn(u128) -> bool,
        sink: &NotificationSender,
    ) -> Result<usize, WandError> {
        self.expect_state(ConnectionState::ProfileDiscovered, "subscribe")?;
        let targets: Vec<CharacteristicInfo> = self
            .profile
            .iter()
            .flat_map(|p| p.characteristics())
            .filter(|c| selector(c.uuid))
            .filter(|c| !protocol::is_never_subscribed(c.uuid))
            .filter(|c| c.can_notify())
            .cloned()
            .collect();

        for c in targets {
            let uuid = format_uuid(c.uuid);
            info!("Subscribing to {} ({})", uuid_name(c.uuid), uuid);
            self.transport
                .subscribe(&c, sink.clone())
                .await
                .map_err(|e| WandError::Subscribe {
                    uuid: uuid.clone(),
                    reason: format!("{:#}", e),
                })?;
            self.subscriptions.push(c);
        }

        self.state = ConnectionState::Subscribed;
        info!("{} subscriptions active", self.subscriptions.len());
        Ok(self.subscriptions.len())
    }

    /// Unsubscribe everything, then cancel the connection.
    ///
    /// Safe to call in any state and more than once. An unsubscribe failure
    /// stops the teardown with the session left in `ShuttingDown`.
    pub async fn shutdown(&mut self) -> Result<(), WandError> {
        if self.state == ConnectionState::Disconnected {
            debug!("Shutdown: already disconnected");
            return Ok(());
        }

        let connected = self.state >= ConnectionState::Connected;
        self.state = ConnectionState::ShuttingDown;

        while let Some(c) = self.subscriptions.first().cloned() {
            let uuid = format_uuid(c.uuid);
            self.transport
                .unsubscribe(&c)
                .await
                .map_err(|e| WandError::Unsubscribe {
                    uuid: uuid.clone(),
                    reason: format!("{:#}", e),
                })?;
            self.subscriptions.remove(0);
            info!(
                subscription = %uuid,
                name = uuid_name(c.uuid),
                handle = %format!("0x{:02X}", c.handle),
                "Subscription unsubscribed"
            );
        }

        if connected {
            self.transport
                .disconnect()
                .await
                .map_err(|e| WandError::Disconnect(format!("{:#}", e)))?;
            info!("Disconnected from device");
        }

        self.state = ConnectionState::Disconnected;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::{
        property, IO_LED_CHAR_UUID, IO_SERVICE_UUID, IO_USER_BUTTON_CHAR_UUID,
        SENSOR_QUATERNIONS_CHAR_UUID, SENSOR_SERVICE_UUID, SERVICE_CHANGED_CHAR_UUID,
        VENDOR_RESERVED_CHAR_UUID,
    };
    use crate::infrastructure::bluetooth::transport::{
        DescriptorInfo, RawNotification, ServiceInfo,
    };
    use anyhow::anyhow;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    /// In-memory transport recording every call
    #[derive(Default)]
    pub(crate) struct MockTransport {
        pub advertisements: Vec<Advertisement>,
        pub profile: Profile,
        pub fail_subscribe: HashSet<u128>,
        pub fail_unsubscribe: HashSet<u128>,
        pub fail_descriptor_read: bool,
        /// `connect` never completes
        pub stall_connect: bool,
        /// `discover_profile` never completes
        pub stall_discovery: bool,
        pub calls: Vec<String>,
        pub sinks: Vec<NotificationSender>,
        /// Delivered to the sink as soon as the matching uuid is subscribed
        pub queued: Vec<RawNotification>,
    }

    impl MockTransport {
        pub fn with_wand() -> Self {
            Self {
                advertisements: vec![
                    Advertisement {
                        local_name: "Headphones".to_string(),
                        address: 0x1,
                        rssi: -40,
                    },
                    Advertisement {
                        local_name: "kano-wand-8a".to_string(),
                        address: 0xAABB,
                        rssi: -60,
                    },
                ],
                profile: wand_profile(),
                ..Default::default()
            }
        }
    }

    fn characteristic(
        uuid: u128,
        service_uuid: u128,
        properties: u8,
        handle: u16,
    ) -> CharacteristicInfo {
        CharacteristicInfo {
            uuid,
            service_uuid,
            properties,
            handle,
            value_handle: handle + 1,
            descriptors: vec![DescriptorInfo {
                uuid: 0x00002902_0000_1000_8000_00805f9b34fb,
                handle: handle + 2,
            }],
        }
    }

    pub(crate) fn wand_profile() -> Profile {
        Profile {
            services: vec![
                ServiceInfo {
                    uuid: 0x00001801_0000_1000_8000_00805f9b34fb,
                    handle: 0x01,
                    characteristics: vec![characteristic(
                        SERVICE_CHANGED_CHAR_UUID,
                        0x00001801_0000_1000_8000_00805f9b34fb,
                        property::INDICATE | property::NOTIFY,
                        0x02,
                    )],
                },
                ServiceInfo {
                    uuid: IO_SERVICE_UUID,
                    handle: 0x10,
                    characteristics: vec![
                        characteristic(
                            IO_USER_BUTTON_CHAR_UUID,
                            IO_SERVICE_UUID,
                            property::READ | property::NOTIFY,
                            0x11,
                        ),
                        characteristic(IO_LED_CHAR_UUID, IO_SERVICE_UUID, property::WRITE, 0x14),
                    ],
                },
                ServiceInfo {
                    uuid: SENSOR_SERVICE_UUID,
                    handle: 0x20,
                    characteristics: vec![characteristic(
                        SENSOR_QUATERNIONS_CHAR_UUID,
                        SENSOR_SERVICE_UUID,
                        property::NOTIFY,
                        0x21,
                    )],
                },
                ServiceInfo {
                    uuid: 0xd0611e78_bbb4_4591_a5f8_487910ae4366,
                    handle: 0x30,
                    characteristics: vec![characteristic(
                        VENDOR_RESERVED_CHAR_UUID,
                        0xd0611e78_bbb4_4591_a5f8_487910ae4366,
                        property::WRITE | property::NOTIFY,
                        0x31,
                    )],
                },
            ],
        }
    }

    impl BleTransport for MockTransport {
        async fn scan(
            &mut self,
            filter: &(dyn Fn(&Advertisement) -> bool + Sync),
        ) -> anyhow::Result<Advertisement> {
            self.calls.push("scan".to_string());
            match self.advertisements.iter().find(|&a| filter(a)) {
                Some(adv) => Ok(adv.clone()),
                // A real radio keeps listening
                None => std::future::pending().await,
            }
        }

        async fn connect(&mut self, device: &Advertisement) -> anyhow::Result<()> {
            self.calls.push(format!("connect {}", device.local_name));
            if self.stall_connect {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn discover_profile(&mut self) -> anyhow::Result<Profile> {
            self.calls.push("discover".to_string());
            if self.stall_discovery {
                std::future::pending::<()>().await;
            }
            Ok(self.profile.clone())
        }

        async fn read_descriptor(
            &mut self,
            characteristic: &CharacteristicInfo,
            _descriptor: &DescriptorInfo,
        ) -> anyhow::Result<Vec<u8>> {
            self.calls
                .push(format!("read {}", uuid_name(characteristic.uuid)));
            if self.fail_descriptor_read {
                return Err(anyhow!("read refused"));
            }
            Ok(vec![0x01, 0x00])
        }

        async fn subscribe(
            &mut self,
            characteristic: &CharacteristicInfo,
            sink: NotificationSender,
        ) -> anyhow::Result<()> {
            self.calls
                .push(format!("subscribe {}", uuid_name(characteristic.uuid)));
            if self.fail_subscribe.contains(&characteristic.uuid) {
                return Err(anyhow!("CCCD write failed"));
            }
            for n in self.queued.iter().filter(|n| n.uuid == characteristic.uuid) {
                let _ = sink.send(n.clone());
            }
            self.sinks.push(sink);
            Ok(())
        }

        async fn unsubscribe(&mut self, characteristic: &CharacteristicInfo) -> anyhow::Result<()> {
            self.calls
                .push(format!("unsubscribe {}", uuid_name(characteristic.uuid)));
            if self.fail_unsubscribe.contains(&characteristic.uuid) {
                return Err(anyhow!("CCCD write failed"));
            }
            Ok(())
        }

        async fn disconnect(&mut self) -> anyhow::Result<()> {
            self.calls.push("disconnect".to_string());
            self.sinks.clear();
            Ok(())
        }
    }

    async fn connected_session(transport: MockTransport) -> WandSession<MockTransport> {
        let mut session = WandSession::new(transport);
        session
            .connect("Kano-Wand", Duration::from_secs(1), std::future::pending())
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_connect_matches_prefix_case_insensitively() {
        let session = connected_session(MockTransport::with_wand()).await;
        assert_eq!(session.state(), ConnectionState::ProfileDiscovered);
        assert_eq!(session.device().unwrap().address, 0xAABB);
        assert_eq!(
            session.transport().calls,
            vec!["scan", "connect kano-wand-8a", "discover"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out_without_match() {
        let mut transport = MockTransport::with_wand();
        transport.advertisements.truncate(1);
        let mut session = WandSession::new(transport);

        let err = session
            .connect("Kano-Wand", Duration::from_secs(10), std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, WandError::ConnectTimeout { .. }));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_connect_cancelled_immediately() {
        let mut transport = MockTransport::with_wand();
        transport.advertisements.clear();
        let mut session = WandSession::new(transport);

        let err = session
            .connect("Kano-Wand", Duration::from_secs(3600), std::future::ready(()))
            .await
            .unwrap_err();
        assert!(matches!(err, WandError::Cancelled));
        assert!(session.subscriptions().is_empty());

        // Nothing was connected, so nothing to tear down
        session.shutdown().await.unwrap();
        assert!(!session.transport().calls.contains(&"disconnect".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_discovery_returns_promptly() {
        let mut transport = MockTransport::with_wand();
        transport.stall_discovery = true;
        let mut session = WandSession::new(transport);

        let started = Instant::now();
        let err = session
            .connect(
                "Kano-Wand",
                Duration::from_secs(1),
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WandError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(session.profile().is_none());

        // The link is still open and shutdown has to close it
        assert_eq!(session.state(), ConnectionState::Connected);
        session.shutdown().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.transport().calls.last().unwrap(), "disconnect");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_link_setup_still_disconnects() {
        let mut transport = MockTransport::with_wand();
        transport.stall_connect = true;
        let mut session = WandSession::new(transport);

        let err = session
            .connect(
                "Kano-Wand",
                Duration::from_secs(1),
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WandError::Cancelled));

        session.shutdown().await.unwrap();
        assert_eq!(
            session.transport().calls,
            vec!["scan", "connect kano-wand-8a", "disconnect"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_setup_timeout_is_a_device_error() {
        let mut transport = MockTransport::with_wand();
        transport.stall_connect = true;
        let mut session = WandSession::new(transport);

        let err = session
            .connect("Kano-Wand", Duration::from_secs(1), std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, WandError::Device(_)));
        assert_eq!(session.state(), ConnectionState::Connected);

        session.shutdown().await.unwrap();
        assert_eq!(session.transport().calls.last().unwrap(), "disconnect");
    }

    #[tokio::test]
    async fn test_connect_twice_is_invalid() {
        let mut session = connected_session(MockTransport::with_wand()).await;
        let err = session
            .connect("Kano-Wand", Duration::from_secs(1), std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, WandError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_only_wand_inputs() {
        let mut session = connected_session(MockTransport::with_wand()).await;
        let (tx, _rx) = mpsc::unbounded_channel();

        // Accept everything to prove the skip list holds regardless
        let count = session.subscribe(|_| true, &tx).await.unwrap();
        assert_eq!(count, 2);
        let uuids: Vec<u128> = session.subscriptions().iter().map(|c| c.uuid).collect();
        assert_eq!(uuids, vec![IO_USER_BUTTON_CHAR_UUID, SENSOR_QUATERNIONS_CHAR_UUID]);
        assert_eq!(session.state(), ConnectionState::Subscribed);
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_fatal() {
        let mut transport = MockTransport::with_wand();
        transport.fail_subscribe.insert(SENSOR_QUATERNIONS_CHAR_UUID);
        let mut session = connected_session(transport).await;
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = session
            .subscribe(protocol::is_wand_input, &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, WandError::Subscribe { .. }));
        assert_eq!(session.subscriptions().len(), 1);

        session.shutdown().await.unwrap();
        assert_eq!(
            session.transport().calls[3..],
            [
                "subscribe User Button",
                "subscribe Quaternions",
                "unsubscribe User Button",
                "disconnect"
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_unsubscribes_then_disconnects_once() {
        let mut session = connected_session(MockTransport::with_wand()).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        session.subscribe(protocol::is_wand_input, &tx).await.unwrap();

        session.shutdown().await.unwrap();
        session.shutdown().await.unwrap();

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.subscriptions().is_empty());
        let calls = &session.transport().calls;
        assert_eq!(
            calls[calls.len() - 3..],
            [
                "unsubscribe User Button",
                "unsubscribe Quaternions",
                "disconnect"
            ]
        );
        assert_eq!(calls.iter().filter(|c| *c == "disconnect").count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_failure_stops_teardown() {
        let mut transport = MockTransport::with_wand();
        transport.fail_unsubscribe.insert(IO_USER_BUTTON_CHAR_UUID);
        let mut session = connected_session(transport).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        session.subscribe(protocol::is_wand_input, &tx).await.unwrap();

        let err = session.shutdown().await.unwrap_err();
        assert!(matches!(err, WandError::Unsubscribe { .. }));
        assert_eq!(session.state(), ConnectionState::ShuttingDown);
        assert!(!session.transport().calls.contains(&"disconnect".to_string()));
    }

    #[tokio::test]
    async fn test_explore_reads_selected_descriptors_only() {
        let mut transport = MockTransport::with_wand();
        transport.fail_descriptor_read = true;
        let mut session = connected_session(transport).await;

        session.explore(protocol::is_wand_input).await.unwrap();
        let reads: Vec<&String> = session
            .transport()
            .calls
            .iter()
            .filter(|c| c.starts_with("read"))
            .collect();
        assert_eq!(reads, vec!["read User Button", "read Quaternions"]);
        // Read failures don't change state
        assert_eq!(session.state(), ConnectionState::ProfileDiscovered);
    }
}
