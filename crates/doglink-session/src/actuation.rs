//! Hardware seams: what the session drives and what it reports.

use doglink_frame::packet::STATUS_REPORT_LEN;
use tracing::info;

use crate::command::DriveCommand;

/// Raw IMU sample carried in a status report.
pub type Telemetry = [u8; STATUS_REPORT_LEN];

/// The craft's actuators as seen by the session.
pub trait Actuation {
    /// Pairing succeeded: bring the craft up.
    fn activate(&mut self);

    /// Session over: stop everything.
    fn deactivate(&mut self);

    /// Apply one decoded control command.
    fn apply_command(&mut self, command: &DriveCommand);

    /// The key arrived and commands may follow. Drives any secondary indicator.
    fn session_active(&mut self) {}
}

impl<A: Actuation + ?Sized> Actuation for Box<A> {
    fn activate(&mut self) {
        (**self).activate();
    }

    fn deactivate(&mut self) {
        (**self).deactivate();
    }

    fn apply_command(&mut self, command: &DriveCommand) {
        (**self).apply_command(command);
    }

    fn session_active(&mut self) {
        (**self).session_active();
    }
}

/// Supplies the sample sent with every status report.
pub trait TelemetrySource {
    fn sample(&mut self) -> Telemetry;
}

impl<F> TelemetrySource for F
where
    F: FnMut() -> Telemetry,
{
    fn sample(&mut self) -> Telemetry {
        self()
    }
}

/// Reports the same sample every time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticTelemetry(pub Telemetry);

impl TelemetrySource for StaticTelemetry {
    fn sample(&mut self) -> Telemetry {
        self.0
    }
}

/// Actuator that only logs, for running a node without hardware.
#[derive(Debug, Default)]
pub struct TracingActuator {
    active: bool,
    commands: u64,
}

impl TracingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Commands applied since the last activation.
    pub fn commands_applied(&self) -> u64 {
        self.commands
    }
}

impl Actuation for TracingActuator {
    fn activate(&mut self) {
        self.active = true;
        self.commands = 0;
        info!("actuation on");
    }

    fn deactivate(&mut self) {
        if self.active {
            info!(commands = self.commands, "actuation off");
        }
        self.active = false;
    }

    fn apply_command(&mut self, command: &DriveCommand) {
        self.commands += 1;
        info!(
            direction_speed = command.direction_speed,
            turn = command.turn,
            brake = command.brake,
            peripheral = command.peripheral,
            "drive command"
        );
    }

    fn session_active(&mut self) {
        info!("session key accepted");
    }
}
