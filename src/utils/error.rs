//! Errors that stop the bridge.
//!
//! Everything on the hot path is recovered and counted locally, so the only
//! errors that surface as values are the ones that end the process. Each of
//! them maps to exit code 1.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("failed to initialize outbound producer: {0}")]
    OutboundInit(String),

    #[error("could not connect to MQTT broker after {attempts} attempts: {last_error}")]
    ConnectRetriesExhausted { attempts: u32, last_error: String },

    #[error("MQTT dispatch task failed: {0}")]
    DispatchFailed(String),

    #[error("failed to bind health server on {addr}: {source}")]
    HttpBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    /// Process exit status for this fault.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}
