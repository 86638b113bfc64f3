//! Error types for header decoding, capture and configuration.

use thiserror::Error;

use crate::capture::SessionState;

/// Errors raised by the header and packet views.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// The region is read-only or shorter than a fixed IPv4 header.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    /// A value does not fit in the bit width of the target field.
    #[error("value {value} out of range for {field} (max {max})")]
    FieldOverflow {
        field: &'static str,
        value: u32,
        max: u32,
    },
}

/// Errors raised by interface selection and the capture session.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no usable network interfaces found")]
    NoInterfaces,

    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("interface {0} has no IPv4 address")]
    InterfaceUnusable(String),

    #[error("no interface selected")]
    NoInterfaceSelected,

    #[error("failed to acquire raw socket: {0}")]
    SocketUnavailable(#[source] std::io::Error),

    #[error("promiscuous mode unavailable on {interface}: {source}")]
    PromiscuousModeUnavailable {
        interface: String,
        #[source]
        source: std::io::Error,
    },

    #[error("receive failed: {0}")]
    ReceiveFailure(#[source] std::io::Error),

    #[error("cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
