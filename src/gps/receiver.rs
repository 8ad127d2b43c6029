use super::gpgga::{GPGGA_TAG, GpsFix, parse_gpgga_sentence};
use crate::guard::OrLog;
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, ErrorKind};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Receivers repeat GGA once per cycle among a handful of other sentences,
/// so a fix normally shows up well within this many lines.
pub const MAX_LINES: usize = 64;

/// Reads lines until the first GGA sentence with a valid checksum and a
/// position fix.
///
/// Returns `None` on end of input, on a read timeout, or after
/// `max_lines` lines without a usable fix.
pub fn read_gpgga_fix<R: BufRead>(mut reader: R, max_lines: usize) -> Option<GpsFix> {
    let mut buf = Vec::new();

    for _ in 0..max_lines {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("GPS stream ended");
                return None;
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                debug!("No data waiting on GPS port");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "GPS read error");
                return None;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if !line.starts_with(GPGGA_TAG) {
            continue;
        }
        // bad checksums are logged and skipped by the decoder
        if let Some(fix) = parse_gpgga_sentence(line) {
            return Some(fix);
        }
    }

    debug!(max_lines, "No GPGGA fix found");
    None
}

/// Opens the serial GPS receiver and returns its next GGA fix.
///
/// Blocks for up to `timeout` per read; call it from
/// `tokio::task::spawn_blocking` inside async code.
#[tracing::instrument(level = "debug")]
pub fn get_gps_location(serial_port: &str, baud_rate: u32, timeout: Duration) -> Option<GpsFix> {
    open_and_read(serial_port, baud_rate, timeout).or_log("get_gps_location")?
}

fn open_and_read(serial_port: &str, baud_rate: u32, timeout: Duration) -> Result<Option<GpsFix>> {
    info!("Opening GPS on port {serial_port} at {baud_rate} baud");

    let port = serialport::new(serial_port, baud_rate)
        .timeout(timeout)
        .open()
        .with_context(|| format!("Failed to open GPS port {serial_port}"))?;
    port.clear(serialport::ClearBuffer::Input)
        .context("Failed to flush GPS port")?;

    Ok(read_gpgga_fix(BufReader::new(port), MAX_LINES))
}
