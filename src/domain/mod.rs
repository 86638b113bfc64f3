//! Domain models for IPv4 capture.
//!
//! Header and packet views, the decoded summary record, capture events and
//! interface descriptors. Nothing here touches the network.

mod events;
mod header;
mod interface;
mod packet;
mod summary;

pub use events::CaptureEvent;
pub use header::{EcnCodepoint, HeaderView, Region, HEADER_LEN, MAX_FRAGMENT_OFFSET};
pub use interface::{InterfaceCatalog, InterfaceDescriptor, UNKNOWN};
pub use packet::PacketView;
pub use summary::PacketSummary;
