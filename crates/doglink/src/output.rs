use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use doglink_frame::{ApiKind, Frame, PacketType};
use doglink_session::NodeReport;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    kind: ApiKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    packet_type: Option<PacketType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rssi: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u8>,
    payload_size: usize,
    payload: String,
    wire_size: usize,
    timestamp: String,
}

impl FrameOutput {
    fn new(frame: &Frame) -> Self {
        let (rssi, status) = match frame {
            Frame::Command { rssi, .. } => (Some(*rssi), None),
            Frame::TxResult { status, .. } | Frame::Reset { status } => (None, Some(*status)),
            Frame::Response { .. } => (None, None),
        };
        Self {
            kind: frame.kind(),
            address: frame.address().map(|a| a.to_string()),
            packet_type: frame.packet_type(),
            rssi,
            status,
            payload_size: frame.payload().len(),
            payload: hex::encode_upper(frame.payload()),
            wire_size: frame.wire_size(),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let out = FrameOutput::new(frame);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "ADDRESS", "TYPE", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    frame.kind().name().to_string(),
                    out.address.clone().unwrap_or_else(|| "-".into()),
                    type_label(frame),
                    out.payload_size.to_string(),
                    out.payload.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} address={} type={} size={} payload={}",
                frame.kind().name(),
                out.address.as_deref().unwrap_or("-"),
                type_label(frame),
                out.payload_size,
                out.payload
            );
        }
        OutputFormat::Raw => print_raw(frame.payload()),
    }
}

#[derive(Serialize)]
struct WireOutput<'a> {
    kind: ApiKind,
    address: String,
    packet_type: PacketType,
    wire_size: usize,
    wire: &'a str,
}

/// Print an encoded frame as upper-case hex (or the raw bytes).
pub fn print_wire(
    kind: ApiKind,
    address: doglink_frame::Address,
    packet_type: PacketType,
    wire: &[u8],
    format: OutputFormat,
) {
    let hex = hex::encode_upper(wire);
    match format {
        OutputFormat::Json => print_json(&WireOutput {
            kind,
            address: address.to_string(),
            packet_type,
            wire_size: wire.len(),
            wire: &hex,
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("{}", spaced(&hex)),
        OutputFormat::Raw => print_raw(wire),
    }
}

pub fn print_report(report: &NodeReport, format: OutputFormat) {
    let peer = report.peer.as_deref().unwrap_or("-");
    let stopped_by = serde_json::to_value(report.stopped_by)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    let phase = serde_json::to_value(report.phase)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();

    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["stopped_by".to_string(), stopped_by.clone()])
                .add_row(vec!["phase".to_string(), phase.clone()])
                .add_row(vec!["peer".to_string(), peer.to_string()])
                .add_row(vec![
                    "events_handled".to_string(),
                    report.events_handled.to_string(),
                ])
                .add_row(vec!["uptime_ms".to_string(), report.uptime_ms.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "stopped_by={stopped_by} phase={phase} peer={peer} events={} uptime_ms={}",
                report.events_handled, report.uptime_ms
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn type_label(frame: &Frame) -> String {
    match frame {
        Frame::TxResult { status, .. } | Frame::Reset { status } => format!("status 0x{status:02X}"),
        _ => frame
            .packet_type()
            .map(|pt| pt.name().to_string())
            .unwrap_or_else(|| "-".into()),
    }
}

fn spaced(hex: &str) -> String {
    hex.as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use doglink_frame::Address;

    use super::*;

    #[test]
    fn frame_output_for_ack() {
        let frame = Frame::response(Address::new(0x21, 0x8B), PacketType::Ack, Vec::new());
        let out = serde_json::to_value(FrameOutput::new(&frame)).unwrap();
        assert_eq!(out["kind"], "response");
        assert_eq!(out["address"], "0x218B");
        assert_eq!(out["packet_type"], "ack");
        assert_eq!(out["wire_size"], 10);
        assert!(out.get("rssi").is_none());
    }

    #[test]
    fn tx_result_has_status_but_no_address() {
        let frame = Frame::TxResult {
            frame_id: 1,
            status: 0x02,
        };
        let out = serde_json::to_value(FrameOutput::new(&frame)).unwrap();
        assert_eq!(out["kind"], "tx-result");
        assert_eq!(out["status"], 2);
        assert!(out.get("address").is_none());
        assert_eq!(type_label(&frame), "status 0x02");
    }

    #[test]
    fn spaced_hex() {
        assert_eq!(spaced("7E0006"), "7E 00 06");
    }
}
