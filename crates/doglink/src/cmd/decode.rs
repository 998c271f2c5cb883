use std::io::Cursor;

use doglink_frame::{Frame, FrameError, FrameReader};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex("input", &args.hex)?;
    let frames = decode_all(bytes)?;
    if frames.is_empty() {
        return Err(CliError::new(DATA_INVALID, "no valid frames in input"));
    }
    for frame in &frames {
        print_frame(frame, format);
    }
    Ok(SUCCESS)
}

/// Every frame the receiver accepts, in order. Noise and bad frames are skipped.
fn decode_all(bytes: Vec<u8>) -> CliResult<Vec<Frame>> {
    let mut reader = FrameReader::new(Cursor::new(bytes));
    let mut frames = Vec::new();
    loop {
        match reader.read_frame() {
            Ok(frame) => frames.push(frame),
            Err(FrameError::ConnectionClosed) => return Ok(frames),
            Err(err) => return Err(frame_error("decode failed", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use doglink_frame::{Address, PacketType};

    use super::*;

    #[test]
    fn decodes_ack_between_noise() {
        let bytes = parse_hex(
            "input",
            "00 FF 7E 00 06 01 01 21 8B 00 02 4F 7E 00 06 01 01 21 8B 00 02 00",
        )
        .unwrap();
        let frames = decode_all(bytes).unwrap();
        assert_eq!(
            frames,
            vec![Frame::response(
                Address::new(0x21, 0x8B),
                PacketType::Ack,
                Vec::new()
            )]
        );
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(decode_all(vec![0x01, 0x02, 0x03]).unwrap().is_empty());
    }
}
