//! Bluetooth Module
//!
//! BLE session handling for the Kano wand.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      WandService                         │
//! │  (owns the session, the gesture pipeline and the input)  │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌────────────┐  ┌────────────┐  ┌──────────┐
//! │ WandSession│  │ BleTransport│ │ Protocol │
//! │            │  │            │  │          │
//! │ - connect  │  │ - WinRT    │  │ - UUIDs  │
//! │ - subscribe│  │ - mock     │  │ - decode │
//! │ - shutdown │  │   (tests)  │  │          │
//! └────────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Wand UUIDs and notification decoding
//! - [`transport`] - Radio abstraction used by the session
//! - [`connection`] - Connection state machine and subscriptions
//! - [`service`] - Session runner feeding the gesture pipeline
//! - `winrt` - Windows backend (Windows only)

pub mod connection;
pub mod error;
pub mod protocol;
#[cfg(windows)]
pub mod scanner;
pub mod service;
pub mod transport;
#[cfg(windows)]
pub mod winrt;

pub use error::WandError;
pub use service::{ServiceConfig, WandService};
