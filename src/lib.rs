//! rawsniff - raw IPv4 capture with in-place header decoding.
//!
//! `domain` holds the zero-copy IPv4 header and packet views. `capture`
//! owns the raw socket and the background receive loop, `discovery`
//! enumerates interfaces and `reporter` turns capture events into output.

pub mod capture;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod reporter;

pub use capture::{CaptureController, CaptureSession, SessionState, StopReport};
pub use config::Config;
pub use domain::{HeaderView, PacketView, Region, HEADER_LEN};
pub use error::{CaptureError, ConfigError, HeaderError};
