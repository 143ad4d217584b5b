// tools/xbeetap_cli/main.rs
//
// Headless capture/transmit utility for XBee serial links.
// `ports` enumerates devices, `capture` runs a timed session and exports
// the data_log report, `transmit` sends a hex payload at a fixed interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use xbeetap::{
    collect_stats, list_serial_ports, parse_hex_payload, ByteSource, Packet, Parity,
    SerialByteSource, SerialConfig, SessionController, SessionEndReason, SessionObserver,
    SessionState, DEFAULT_SOURCE_LABEL,
};

#[derive(Parser)]
#[command(name = "xbeetap_cli", about = "XBee serial capture and transmit utility")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available serial ports
    Ports,
    /// Capture packets for a fixed duration, then export the session report
    Capture {
        /// Serial port path (e.g. /dev/ttyUSB0, COM6)
        #[arg(long)]
        port: String,
        /// Baud rate
        #[arg(long, default_value_t = 9600)]
        baud: u32,
        /// Inter-byte timeout in milliseconds (the frame boundary)
        #[arg(long, default_value_t = 100)]
        timeout_ms: u64,
        /// Parity: none, odd, even
        #[arg(long, default_value = "none")]
        parity: Parity,
        /// Capture duration in seconds
        #[arg(long, default_value_t = 10)]
        duration: u64,
        /// Directory the data_log<N>.txt report is written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// Source label used in report lines
        #[arg(long, default_value = DEFAULT_SOURCE_LABEL)]
        label: String,
    },
    /// Send a hex payload, optionally repeated at a fixed interval
    Transmit {
        /// Serial port path
        #[arg(long)]
        port: String,
        /// Baud rate
        #[arg(long, default_value_t = 9600)]
        baud: u32,
        /// Payload as hex, spaces optional (e.g. "7E 00 04")
        #[arg(long)]
        data: String,
        /// Interval between sends in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Number of sends
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
}

/// Prints every framed packet as a serial-monitor line.
struct MonitorObserver;

impl SessionObserver for MonitorObserver {
    fn on_packet_framed(&self, packet: &Packet) {
        println!("{}, Data: {}", packet.timestamp_text(), packet.payload_hex());
    }

    fn on_session_ended(&self, reason: &SessionEndReason) {
        eprintln!("[capture] Session ended ({})", reason.as_str());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Ports => {
            let ports = list_serial_ports()?;
            if ports.is_empty() {
                println!("No serial ports found");
                return Ok(());
            }
            for p in ports {
                let detail = match (&p.manufacturer, &p.product) {
                    (Some(m), Some(prod)) => format!(" ({} {})", m, prod),
                    (Some(m), None) => format!(" ({})", m),
                    (None, Some(prod)) => format!(" ({})", prod),
                    (None, None) => String::new(),
                };
                println!("{}  [{}]{}", p.port_name, p.port_type, detail);
            }
        }

        Command::Capture {
            port,
            baud,
            timeout_ms,
            parity,
            duration,
            output_dir,
            label,
        } => {
            let mut config = SerialConfig::new(port, baud);
            config.parity = parity;
            config.read_timeout = Duration::from_millis(timeout_ms);

            let controller = SessionController::new(label, Arc::new(MonitorObserver));
            controller.start_serial(&config)?;

            // Wait out the capture window, leaving early if the session
            // ends on its own (disconnect or read error).
            let deadline = Instant::now() + Duration::from_secs(duration);
            while Instant::now() < deadline && controller.state() != SessionState::Idle {
                std::thread::sleep(Duration::from_millis(50));
            }
            controller.stop();
            controller.join();

            let stats = collect_stats(&controller.snapshot());
            let path = controller.export_report(&output_dir)?;
            println!(
                "Captured {} packets ({} error markers) -> {}",
                controller.count(),
                stats.error_markers,
                path.display()
            );
        }

        Command::Transmit {
            port,
            baud,
            data,
            interval_ms,
            count,
        } => {
            let payload = parse_hex_payload(&data)?;
            let mut source = SerialByteSource::open(&SerialConfig::new(port, baud))?;
            for sent in 0..count {
                source.write_bytes(&payload)?;
                println!("Sent {} bytes ({}/{})", payload.len(), sent + 1, count);
                if sent + 1 < count {
                    std::thread::sleep(Duration::from_millis(interval_ms));
                }
            }
        }
    }

    Ok(())
}
