// src/report.rs
//
// End-of-session report rendering and export.
// Reproduces the legacy data_log artifact: a statistics header followed by
// one line per packet, written to the first unused data_log<N>.txt name.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::io::Packet;

/// Source column label used by the legacy log format.
pub const DEFAULT_SOURCE_LABEL: &str = "XBEE3";

/// Base name of exported report files.
pub const REPORT_FILE_BASE: &str = "data_log";
/// Extension of exported report files.
pub const REPORT_FILE_EXT: &str = "txt";

const HEADER_RULE_LEN: usize = 50;

// ============================================================================
// Statistics
// ============================================================================

/// Derived statistics for a session snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ReportStats {
    /// Occurrences of the `E1` marker summed across all hex-rendered
    /// payloads.
    pub error_markers: usize,
    /// Legacy line counter: starts at 1 and increments once per packet, so
    /// it reads packet count plus one. Preserved literally, off-by-one
    /// included; the percentage below divides by it.
    pub line_count: usize,
    /// `100 * error_markers / line_count`.
    pub error_percentage: f64,
}

/// Compute the legacy statistics for a snapshot.
///
/// The error count greps each packet's uppercase hex rendering for the
/// two-digit token `E1`, non-overlapping. This is a malformed-packet
/// heuristic, not protocol validation; no protocol schema exists for these
/// payloads.
pub fn collect_stats(packets: &[Packet]) -> ReportStats {
    let mut error_markers = 0;
    let mut line_count = 1;
    for packet in packets {
        error_markers += packet.payload_hex().matches("E1").count();
        line_count += 1;
    }
    ReportStats {
        error_markers,
        line_count,
        error_percentage: (error_markers as f64 / line_count as f64) * 100.0,
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the full report: statistics header, then one body line per packet
/// in arrival order, `<timestamp> - <label>: <hex>`.
///
/// Header labels reproduce the legacy artifact byte-for-byte, Portuguese
/// included.
pub fn render_report(packets: &[Packet], source_label: &str) -> String {
    let stats = collect_stats(packets);
    let rule = "-".repeat(HEADER_RULE_LEN);

    let mut out = String::new();
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!(
        "Quantidade de Erros de Pacote: {}\n",
        stats.error_markers
    ));
    out.push_str(&format!("Quantidade de Linhas: {}\n", stats.line_count));
    out.push_str(&format!(
        "Porcentagem de erro: {}%\n",
        stats.error_percentage
    ));
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');

    for packet in packets {
        out.push_str(&format!(
            "{} - {}: {}\n",
            packet.timestamp_text(),
            source_label,
            packet.payload_hex()
        ));
    }
    out
}

// ============================================================================
// Export
// ============================================================================

/// First unused `data_log<N>.txt` path in `dir`, scanning from 1.
/// Existing reports are never overwritten.
pub fn next_report_path(dir: &Path) -> PathBuf {
    let mut index: u32 = 1;
    loop {
        let candidate = dir.join(format!("{}{}.{}", REPORT_FILE_BASE, index, REPORT_FILE_EXT));
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}

/// Render the report for `packets` and write it to the next unused
/// `data_log<N>.txt` under `dir`. Returns the path written.
pub fn write_report(dir: &Path, packets: &[Packet], source_label: &str) -> io::Result<PathBuf> {
    let path = next_report_path(dir);
    let mut file = fs::File::create(&path)?;
    file.write_all(render_report(packets, source_label).as_bytes())?;
    tlog!(
        "[report] Wrote {} packets to {}",
        packets.len(),
        path.display()
    );
    Ok(path)
}
