//! Network interface discovery.
//!
//! The capture pipeline only depends on the `InterfaceSource` trait; the
//! pnet-backed implementation asks the operating system.

mod pnet_discovery;

pub use pnet_discovery::PnetInterfaces;

use crate::domain::InterfaceCatalog;

/// Something that can enumerate local interfaces.
pub trait InterfaceSource {
    /// List interfaces in a stable order. An empty catalog is not an error.
    fn enumerate_interfaces(&self) -> InterfaceCatalog;
}
