//! Wand Service Module
//!
//! Runs one wand session end to end: connect, subscribe, route
//! notifications through the gesture pipeline, and tear down on shutdown.

use crate::domain::controller::WandController;
use crate::domain::models::InputAction;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::{
    connection::WandSession,
    error::WandError,
    protocol,
    transport::{BleTransport, RawNotification},
};
use crate::infrastructure::input_simulator::InputSink;
use crate::infrastructure::shutdown::ShutdownSignal;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};

/// Session parameters taken from settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name_prefix: String,
    pub scan_timeout: Duration,
    pub enable_mouse_click: bool,
    pub enable_gestures: bool,
    pub dump_descriptors: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ServiceConfig {
    fn from(s: &Settings) -> Self {
        Self {
            name_prefix: s.device_name_prefix.clone(),
            scan_timeout: s.scan_timeout(),
            enable_mouse_click: s.enable_mouse_click,
            enable_gestures: s.enable_gestures,
            dump_descriptors: s.dump_descriptors,
        }
    }
}

/// Owns the session, the gesture state and the input sink.
///
/// Notifications and shutdown are handled by the same task, so teardown
/// never overlaps with a notification being processed.
pub struct WandService<T: BleTransport, S: InputSink> {
    session: WandSession<T>,
    controller: WandController,
    input: S,
    config: ServiceConfig,
}

impl<T: BleTransport, S: InputSink> WandService<T, S> {
    pub fn new(transport: T, input: S, config: ServiceConfig) -> Self {
        Self {
            session: WandSession::new(transport),
            controller: WandController::new(),
            input,
            config,
        }
    }

    pub fn session(&self) -> &WandSession<T> {
        &self.session
    }

    pub fn input(&self) -> &S {
        &self.input
    }

    /// Run until `shutdown` fires or the connection drops. Any error is
    /// terminal; the session has been torn down as far as possible.
    pub async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), WandError> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        match self.start(&mut shutdown, tx).await {
            Ok(()) => {}
            Err(WandError::Cancelled) => {
                info!("Shutdown requested before the wand was ready");
                self.teardown().await;
                return Ok(());
            }
            Err(e) => {
                self.teardown().await;
                return Err(e);
            }
        }
        info!("Wand ready");

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break Ok(()),
                message = rx.recv() => match message {
                    Some(notification) => self.dispatch(notification),
                    None => {
                        error!("Notification stream closed");
                        break Err(WandError::ConnectionLost);
                    }
                },
            }
        };

        info!("Shutting down");
        let closed = self.session.shutdown().await;
        outcome.and(closed)
    }

    async fn start(
        &mut self,
        shutdown: &mut ShutdownSignal,
        tx: mpsc::UnboundedSender<RawNotification>,
    ) -> Result<(), WandError> {
        let prefix = self.config.name_prefix.clone();
        self.session
            .connect(&prefix, self.config.scan_timeout, shutdown.wait())
            .await?;

        if self.config.dump_descriptors {
            self.session.explore(protocol::is_wand_input).await?;
        }

        // `tx` is dropped on return; only the transport's clones keep the
        // channel open from here on
        self.session.subscribe(protocol::is_wand_input, &tx).await?;
        Ok(())
    }

    async fn teardown(&mut self) {
        if let Err(e) = self.session.shutdown().await {
            error!("Teardown after failure: {}", e);
        }
    }

    fn dispatch(&mut self, notification: RawNotification) {
        trace!(
            "Notification from {}: {:02x?}",
            protocol::uuid_name(notification.uuid),
            notification.payload
        );
        let Some(decoded) = protocol::decode(&notification.payload) else {
            return;
        };

        let result = match self.controller.handle(decoded) {
            Some(InputAction::Click) if self.config.enable_mouse_click => self.input.click(),
            Some(InputAction::Gesture(g)) if self.config.enable_gestures => {
                info!("Gesture: {}", g);
                self.input.gesture(g)
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            warn!("Input dispatch failed: {:#}", e);
        }
    }
}
