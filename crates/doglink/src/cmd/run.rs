use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use doglink_session::{
    spawn_key_reader, NodeRuntime, SessionConfig, StaticTelemetry, TracingActuator,
};
use doglink_transport::{LinkStream, UnixDomainSocket};
use tracing::info;

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{session_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_report, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(Arc::clone(&shutdown))?;

    // Keep the listener alive for the whole run; dropping it unlinks the socket.
    let (stream, _listener) = open_link(&args, &config)?;

    let runtime = NodeRuntime::default().with_shutdown(shutdown);
    if args.keys {
        spawn_key_reader(std::io::stdin(), runtime.events())
            .map_err(|err| session_error("key input failed", err))?;
    }

    let report = runtime
        .run(stream, &config, TracingActuator::new(), StaticTelemetry::default())
        .map_err(|err| session_error("node failed", err))?;
    print_report(&report, format);

    Ok(SUCCESS)
}

fn load_config(args: &RunArgs) -> CliResult<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_path(path).map_err(|err| {
            session_error(&format!("failed loading {}", path.display()), err)
        })?,
        None => SessionConfig::default(),
    };
    if let Some(tag) = args.tag {
        config.own_tag = tag;
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if let Some(lost_link) = &args.lost_link {
        config.lost_link_ms = parse_duration(lost_link)?.as_millis() as u64;
    }
    config
        .validate()
        .map_err(|err| session_error("invalid config", err))?;
    Ok(config)
}

fn open_link(
    args: &RunArgs,
    config: &SessionConfig,
) -> CliResult<(LinkStream, Option<UnixDomainSocket>)> {
    if let Some(device) = &args.device {
        let stream = LinkStream::open_device(device, config.baud_rate)
            .map_err(|err| transport_error("open failed", err))?;
        info!(device = %device.display(), baud = config.baud_rate, "device link open");
        return Ok((stream, None));
    }

    let path = args
        .path
        .as_ref()
        .ok_or_else(|| CliError::usage("a socket path or --device is required"))?;
    let listener = UnixDomainSocket::bind(path).map_err(|err| transport_error("bind failed", err))?;
    info!(path = %path.display(), "waiting for FARMER");
    let stream = listener
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    Ok((stream, Some(listener)))
}

fn install_ctrlc_handler(shutdown: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
