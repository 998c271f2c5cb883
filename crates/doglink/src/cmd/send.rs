use doglink_frame::{ApiKind, FrameConfig, FrameReader, FrameWriter, PacketType};
use doglink_transport::UnixDomainSocket;
use tracing::{debug, warn};

use crate::cmd::{parse_address, parse_duration, parse_hex, SendArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let source = parse_address(&args.source)?;
    let packet_type = PacketType::from(args.packet_type);
    let payload = parse_hex("--payload", &args.payload)?;

    if let Some(expected) = packet_type.payload_len() {
        if payload.len() != expected {
            warn!(
                packet_type = %packet_type,
                expected,
                actual = payload.len(),
                "payload length differs from the protocol; the DOG will drop it"
            );
        }
    }

    let stream =
        UnixDomainSocket::connect(&args.path).map_err(|err| transport_error("connect failed", err))?;

    let config = FrameConfig {
        read_timeout: Some(wait_timeout),
        ..FrameConfig::default()
    };
    let reader_stream = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;

    let mut writer = FrameWriter::with_config_link(stream, config.clone())
        .map_err(|err| frame_error("connect failed", err))?;
    writer
        .send(ApiKind::Command, source, packet_type, &payload)
        .map_err(|err| frame_error("send failed", err))?;
    debug!(%source, %packet_type, size = payload.len(), "frame sent");

    if args.wait {
        let mut reader = FrameReader::with_config_link(reader_stream, config)
            .map_err(|err| frame_error("receive failed", err))?;
        let frame = reader
            .read_frame()
            .map_err(|err| frame_error("receive failed", err))?;
        print_frame(&frame, format);
    }

    Ok(SUCCESS)
}
