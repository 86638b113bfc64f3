use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rawsniff::capture::{CaptureController, PacketSocketOpener, SocketOpener};
use rawsniff::discovery::{InterfaceSource, PnetInterfaces};
use rawsniff::domain::{InterfaceCatalog, InterfaceDescriptor};
use rawsniff::reporter::{ConsoleReporter, FanoutReporter, PcapReporter};
use rawsniff::Config;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit code when no interface has an IPv4 address to capture on.
const EXIT_NO_INTERFACES: u8 = 2;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "rawsniff")]
#[command(about = "Capture raw IPv4 traffic and decode headers in place")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List local network interfaces
    List,
    /// Capture on an interface until Ctrl+C
    Capture {
        /// Interface name (e.g., eth0)
        #[arg(short, long, conflicts_with = "index")]
        interface: Option<String>,
        /// Interface number as shown by `rawsniff list`
        #[arg(long)]
        index: Option<usize>,
        /// Also write captured datagrams to a pcap file
        #[arg(long)]
        pcap: Option<PathBuf>,
        /// Do not print the packet table
        #[arg(short, long)]
        quiet: bool,
        /// Print identification, fragmentation and checksum columns
        #[arg(short, long)]
        verbose: bool,
        /// Pause before the first receive, overriding the config
        #[arg(long)]
        startup_delay_ms: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Commands::Capture {
        startup_delay_ms: Some(ms),
        ..
    } = &cli.command
    {
        config.startup_delay = Duration::from_millis(*ms);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.tracing_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::List => list(&PnetInterfaces::new()),
        Commands::Capture {
            interface,
            index,
            pcap,
            quiet,
            verbose,
            ..
        } => capture(
            CaptureController::new(PnetInterfaces::new(), PacketSocketOpener, config),
            CaptureOptions {
                interface,
                index,
                pcap,
                quiet,
                verbose,
            },
        ),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn list(source: &impl InterfaceSource) -> Result<ExitCode> {
    let catalog = source.enumerate_interfaces();
    print_catalog(&catalog, &mut io::stdout().lock())?;
    if catalog.usable().is_empty() {
        eprintln!("no usable network interfaces found");
        return Ok(ExitCode::from(EXIT_NO_INTERFACES));
    }
    Ok(ExitCode::SUCCESS)
}

/// Selection and output flags of the `capture` subcommand.
#[derive(Debug, Default)]
struct CaptureOptions {
    interface: Option<String>,
    index: Option<usize>,
    pcap: Option<PathBuf>,
    quiet: bool,
    verbose: bool,
}

fn capture<I, O>(mut controller: CaptureController<I, O>, options: CaptureOptions) -> Result<ExitCode>
where
    I: InterfaceSource,
    O: SocketOpener,
{
    let CaptureOptions {
        interface,
        index,
        pcap,
        quiet,
        verbose,
    } = options;

    let catalog = controller.list_interfaces();
    if catalog.usable().is_empty() {
        eprintln!("no usable network interfaces found");
        return Ok(ExitCode::from(EXIT_NO_INTERFACES));
    }

    let chosen = match (interface, index) {
        (Some(name), _) => catalog
            .find(&name)
            .cloned()
            .ok_or_else(|| anyhow!("interface not found: {}", name))?,
        (None, Some(index)) => catalog
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("no interface numbered {}", index))?,
        (None, None) => match catalog.sole()? {
            Some(only) => only.clone(),
            None => prompt(&catalog, &mut io::stdin().lock(), &mut io::stderr())?,
        },
    };
    controller.select_interface(chosen)?;

    let mut reporter = FanoutReporter::new();
    if !quiet {
        reporter = reporter.with(ConsoleReporter::new().with_verbose(verbose));
    }
    if let Some(path) = pcap {
        let writer = PcapReporter::create(&path)
            .with_context(|| format!("failed to create pcap file {}", path.display()))?;
        reporter = reporter.with(writer);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl+C handler")?;

    controller
        .start_capture(reporter)
        .context("failed to start capture")?;
    info!("Capturing, press Ctrl+C to stop");

    while controller.is_running() && !interrupted.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }

    let report = controller
        .stop_capture()
        .context("capture ended with an error")?;
    if report.forced {
        eprintln!("capture loop did not stop in time and was abandoned");
    }
    eprintln!(
        "{} packets captured, {} undersized",
        report.packets, report.undersized
    );
    Ok(ExitCode::SUCCESS)
}

fn print_catalog(catalog: &InterfaceCatalog, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{:>3}  {:<20} {:<20} Name", "No.", "IPv4", "MAC")?;
    for (i, iface) in catalog.iter().enumerate() {
        let marker = if iface.is_usable() { "" } else { "  (no IPv4)" };
        writeln!(out, "{:>3}  {}{}", i, iface, marker)?;
    }
    Ok(())
}

/// Ask the operator to pick a usable interface by number.
///
/// Invalid answers are repeated; end of input gives up.
fn prompt(
    catalog: &InterfaceCatalog,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<InterfaceDescriptor> {
    print_catalog(catalog, out)?;
    loop {
        write!(out, "Select interface number: ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(rawsniff::CaptureError::NoInterfaceSelected.into());
        }

        match line.trim().parse::<usize>().ok().and_then(|i| catalog.get(i)) {
            Some(iface) if iface.is_usable() => return Ok(iface.clone()),
            Some(iface) => writeln!(out, "{} has no IPv4 address", iface.display_name())?,
            None => writeln!(out, "invalid choice: {}", line.trim())?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn catalog() -> InterfaceCatalog {
        InterfaceCatalog::new(vec![
            InterfaceDescriptor {
                name: Some("lo".to_string()),
                ipv4: None,
                mac: None,
            },
            InterfaceDescriptor::new(
                "eth0",
                Ipv4Addr::new(10, 0, 0, 2),
                macaddr::MacAddr6::new(0x02, 0, 0, 0, 0, 0x02),
            ),
            InterfaceDescriptor::new(
                "eth1",
                Ipv4Addr::new(10, 0, 1, 2),
                macaddr::MacAddr6::new(0x02, 0, 0, 0, 0, 0x03),
            ),
        ])
    }

    #[test]
    fn prompt_retries_until_usable_choice() {
        let mut input = io::Cursor::new("nope\n0\n7\n2\n");
        let mut out = Vec::new();

        let chosen = prompt(&catalog(), &mut input, &mut out).unwrap();
        assert_eq!(chosen.display_name(), "eth1");

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("invalid choice: nope"));
        assert!(text.contains("lo has no IPv4 address"));
        assert!(text.contains("invalid choice: 7"));
    }

    #[test]
    fn prompt_gives_up_at_end_of_input() {
        let mut input = io::Cursor::new("");
        let mut out = Vec::new();
        let err = prompt(&catalog(), &mut input, &mut out).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<rawsniff::CaptureError>(),
            Some(rawsniff::CaptureError::NoInterfaceSelected)
        ));
    }

    #[test]
    fn catalog_table_marks_unusable_entries() {
        let mut out = Vec::new();
        print_catalog(&catalog(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("(no IPv4)"));
        assert!(lines[2].contains("10.0.0.2"));
        assert!(!lines[2].contains("(no IPv4)"));
    }

    #[test]
    fn capture_flags_parse() {
        let cli = Cli::parse_from([
            "rawsniff",
            "capture",
            "--interface",
            "eth0",
            "--pcap",
            "out.pcap",
            "--quiet",
            "--startup-delay-ms",
            "0",
        ]);
        match cli.command {
            Commands::Capture {
                interface,
                pcap,
                quiet,
                startup_delay_ms,
                ..
            } => {
                assert_eq!(interface.as_deref(), Some("eth0"));
                assert_eq!(pcap, Some(PathBuf::from("out.pcap")));
                assert!(quiet);
                assert_eq!(startup_delay_ms, Some(0));
            }
            Commands::List => panic!("expected capture"),
        }
    }

    #[test]
    fn interface_and_index_conflict() {
        assert!(Cli::try_parse_from(["rawsniff", "capture", "-i", "eth0", "--index", "1"]).is_err());
    }

    mod exit_codes {
        use super::*;
        use std::sync::atomic::AtomicUsize;

        struct Fixed(Vec<InterfaceDescriptor>);

        impl InterfaceSource for Fixed {
            fn enumerate_interfaces(&self) -> InterfaceCatalog {
                InterfaceCatalog::new(self.0.clone())
            }
        }

        /// Counts open attempts and never hands out a socket.
        struct CountingOpener(Arc<AtomicUsize>);

        impl SocketOpener for CountingOpener {
            type Socket = <PacketSocketOpener as SocketOpener>::Socket;

            fn open(
                &self,
                _interface: &InterfaceDescriptor,
            ) -> Result<Self::Socket, rawsniff::CaptureError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(rawsniff::CaptureError::SocketUnavailable(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "operation not permitted",
                )))
            }
        }

        fn run_capture(interfaces: Vec<InterfaceDescriptor>) -> (ExitCode, usize) {
            let opens = Arc::new(AtomicUsize::new(0));
            let controller = CaptureController::new(
                Fixed(interfaces),
                CountingOpener(opens.clone()),
                Config::default(),
            );
            let code = capture(controller, CaptureOptions::default()).unwrap();
            (code, opens.load(Ordering::SeqCst))
        }

        #[test]
        fn list_exits_with_distinct_code() {
            let code = list(&Fixed(vec![])).unwrap();
            assert_eq!(code, ExitCode::from(EXIT_NO_INTERFACES));
        }

        #[test]
        fn list_succeeds_with_a_usable_interface() {
            let code = list(&Fixed(catalog().iter().cloned().collect())).unwrap();
            assert_eq!(code, ExitCode::SUCCESS);
        }

        #[test]
        fn capture_on_empty_catalog_never_opens_a_socket() {
            let (code, opens) = run_capture(vec![]);
            assert_eq!(code, ExitCode::from(EXIT_NO_INTERFACES));
            assert_eq!(opens, 0);
        }

        #[test]
        fn capture_with_only_unusable_interfaces_never_opens_a_socket() {
            let lo = InterfaceDescriptor {
                name: Some("lo".to_string()),
                ipv4: None,
                mac: None,
            };
            let (code, opens) = run_capture(vec![lo]);
            assert_eq!(code, ExitCode::from(EXIT_NO_INTERFACES));
            assert_eq!(opens, 0);
        }
    }
}
