use crate::domain::models::ConnectionState;
use std::time::Duration;
use thiserror::Error;

/// Session failures. Every variant ends the process.
#[derive(Debug, Error)]
pub enum WandError {
    #[error("no device matching {prefix:?} found within {timeout:?}")]
    ConnectTimeout { prefix: String, timeout: Duration },

    #[error("cancelled while connecting")]
    Cancelled,

    #[error("device error: {0}")]
    Device(String),

    #[error("can't discover profile: {0}")]
    ProfileDiscovery(String),

    #[error("subscribe error on {uuid}: {reason}")]
    Subscribe { uuid: String, reason: String },

    #[error("unsubscribe error on {uuid}: {reason}")]
    Unsubscribe { uuid: String, reason: String },

    #[error("can't disconnect: {0}")]
    Disconnect(String),

    #[error("connection lost")]
    ConnectionLost,

    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },
}
