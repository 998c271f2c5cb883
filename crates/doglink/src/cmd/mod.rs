use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use doglink_frame::{Address, ApiKind, PacketType};

use crate::exit::{hex_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a DOG node until Ctrl-C or until the link closes.
    Run(RunArgs),
    /// Act as a FARMER: send one command frame to a DOG.
    Send(SendArgs),
    /// Print the wire bytes of a frame.
    Encode(EncodeArgs),
    /// Decode hex wire bytes and print every valid frame.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Socket path to bind; the first FARMER to connect becomes the link.
    #[arg(required_unless_present = "device", conflicts_with = "device")]
    pub path: Option<PathBuf>,
    /// Serial device node to use as the link instead of a socket.
    #[arg(long, value_name = "PATH")]
    pub device: Option<PathBuf>,
    /// JSON session config file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Tag this DOG answers pair requests for (overrides the config file).
    #[arg(long)]
    pub tag: Option<u8>,
    /// Serial line speed for --device (overrides the config file).
    #[arg(long, value_name = "BAUD")]
    pub baud: Option<u32>,
    /// Lost-link timeout (e.g. 3s, 1500ms; overrides the config file).
    #[arg(long, value_name = "DURATION")]
    pub lost_link: Option<String>,
    /// Read operator key presses from stdin (D = ack, S = unpair).
    #[arg(long)]
    pub keys: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path of a running DOG.
    pub path: PathBuf,
    /// Packet type to send.
    #[arg(long = "type", value_name = "PACKET")]
    pub packet_type: PacketArg,
    /// Payload bytes as hex (e.g. "07" or "04 80 10 00").
    #[arg(long, default_value = "")]
    pub payload: String,
    /// FARMER address the frame claims to come from.
    #[arg(long, value_name = "MSB:LSB", default_value = "21:8B")]
    pub source: String,
    /// Wait for one reply frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Frame role.
    #[arg(long, value_enum, default_value = "response")]
    pub kind: KindArg,
    /// Packet type.
    #[arg(long = "type", value_name = "PACKET")]
    pub packet_type: PacketArg,
    /// Destination (response) or source (command) address.
    #[arg(long, value_name = "MSB:LSB", default_value = "21:8B")]
    pub address: String,
    /// Payload bytes as hex.
    #[arg(long, default_value = "")]
    pub payload: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Wire bytes as hex; spaces and colons are ignored.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PacketArg {
    StatusReport,
    PairRequest,
    Ack,
    EncryptionKey,
    Command,
    ResetEncryption,
}

impl From<PacketArg> for PacketType {
    fn from(arg: PacketArg) -> Self {
        match arg {
            PacketArg::StatusReport => PacketType::StatusReport,
            PacketArg::PairRequest => PacketType::PairRequest,
            PacketArg::Ack => PacketType::Ack,
            PacketArg::EncryptionKey => PacketType::EncryptionKey,
            PacketArg::Command => PacketType::Command,
            PacketArg::ResetEncryption => PacketType::ResetEncryption,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    Command,
    Response,
}

impl From<KindArg> for ApiKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Command => ApiKind::Command,
            KindArg::Response => ApiKind::Response,
        }
    }
}

/// Parse `2s`, `150ms` or a bare number of seconds.
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Parse `21:8B`, `0x218B` or `218B`.
pub(crate) fn parse_address(input: &str) -> CliResult<Address> {
    let invalid = || CliError::usage(format!("invalid address {input:?} (expected MSB:LSB)"));
    let trimmed = input.trim();
    if let Some((msb, lsb)) = trimmed.split_once(':') {
        let msb = u8::from_str_radix(msb, 16).map_err(|_| invalid())?;
        let lsb = u8::from_str_radix(lsb, 16).map_err(|_| invalid())?;
        return Ok(Address::new(msb, lsb));
    }
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 4 {
        return Err(invalid());
    }
    u16::from_str_radix(digits, 16)
        .map(Address::from_u16)
        .map_err(|_| invalid())
}

/// Decode hex, ignoring whitespace and `:` separators.
pub(crate) fn parse_hex(context: &str, input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(digits).map_err(|err| hex_error(context, err))
}
