//! Writes captured datagrams to a classic pcap file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info};

use crate::domain::CaptureEvent;
use crate::reporter::PacketReporter;

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const PCAP_SNAPLEN: u32 = 65535;
/// Raw IP, no link-layer header.
const LINKTYPE_RAW: u32 = 101;

/// Appends every datagram (undersized ones included) to a pcap stream.
///
/// Write failures are logged once and further records are dropped.
pub struct PcapReporter<W: Write + Send = BufWriter<File>> {
    out: W,
    records: u64,
    failed: bool,
}

impl PcapReporter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the pcap file header.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("Writing packets to {}", path.as_ref().display());
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write + Send> PcapReporter<W> {
    /// Wrap `out` and write the pcap file header to it.
    pub fn new(mut out: W) -> io::Result<Self> {
        out.write_all(&PCAP_MAGIC.to_le_bytes())?;
        out.write_all(&PCAP_VERSION_MAJOR.to_le_bytes())?;
        out.write_all(&PCAP_VERSION_MINOR.to_le_bytes())?;
        out.write_all(&0i32.to_le_bytes())?; // thiszone
        out.write_all(&0u32.to_le_bytes())?; // sigfigs
        out.write_all(&PCAP_SNAPLEN.to_le_bytes())?;
        out.write_all(&LINKTYPE_RAW.to_le_bytes())?;

        Ok(Self {
            out,
            records: 0,
            failed: false,
        })
    }

    /// Number of records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_record(&mut self, timestamp: SystemTime, datagram: &[u8]) -> io::Result<()> {
        let since_epoch = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
        let orig_len = datagram.len() as u32;
        let incl_len = orig_len.min(PCAP_SNAPLEN);

        self.out
            .write_all(&(since_epoch.as_secs() as u32).to_le_bytes())?;
        self.out.write_all(&since_epoch.subsec_micros().to_le_bytes())?;
        self.out.write_all(&incl_len.to_le_bytes())?;
        self.out.write_all(&orig_len.to_le_bytes())?;
        self.out.write_all(&datagram[..incl_len as usize])?;
        Ok(())
    }
}

impl<W: Write + Send> PacketReporter for PcapReporter<W> {
    fn report(&mut self, event: &CaptureEvent<'_>) {
        if self.failed {
            return;
        }
        match self.write_record(event.timestamp(), event.datagram()) {
            Ok(()) => self.records += 1,
            Err(e) => {
                error!("Failed to write pcap record: {}", e);
                self.failed = true;
            }
        }
    }

    fn on_stop(&mut self) {
        if let Err(e) = self.out.flush() {
            error!("Failed to flush pcap file: {}", e);
        }
        info!("Wrote {} pcap records", self.records);
    }
}
