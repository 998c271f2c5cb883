use doglink_frame::{DEFAULT_BYTE_TIMEOUT_MS, DEFAULT_MAX_FRAME_LEN, START_MARKER};
use doglink_session::{DEFAULT_LOST_LINK_MS, DEFAULT_MAX_SEND_ATTEMPTS};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("doglink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: doglink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("DOGLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "link: start=0x{START_MARKER:02X} max_frame_len={DEFAULT_MAX_FRAME_LEN} byte_timeout_ms={DEFAULT_BYTE_TIMEOUT_MS}"
    );
    println!(
        "session: lost_link_ms={DEFAULT_LOST_LINK_MS} max_send_attempts={DEFAULT_MAX_SEND_ATTEMPTS}"
    );

    Ok(SUCCESS)
}
