use doglink_frame::{ApiKind, Frame, FrameConfig, PacketType};

use crate::cmd::{parse_address, parse_hex, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_wire, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let kind = ApiKind::from(args.kind);
    let address = parse_address(&args.address)?;
    let packet_type = PacketType::from(args.packet_type);
    let payload = parse_hex("--payload", &args.payload)?;

    let frame = Frame::packet(kind, address, packet_type, payload)
        .map_err(|err| frame_error("encode failed", err))?;
    // Only print what a receiver with the default limit would accept.
    FrameConfig::default()
        .check_size(&frame)
        .map_err(|err| frame_error("encode failed", err))?;
    let wire = frame
        .to_wire()
        .map_err(|err| frame_error("encode failed", err))?;
    print_wire(kind, address, packet_type, &wire, format);

    Ok(SUCCESS)
}
