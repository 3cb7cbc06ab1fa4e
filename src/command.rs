// Commands that run against the drive subsystem once per loop tick
//
// The runner keeps one default command (teleop) and at most one scheduled
// command (e.g. an autonomous drive). A scheduled command preempts the
// default until it finishes or is cancelled.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::CMD_TIMEOUT;
use crate::drive::{DifferentialDrive, DriveSubsystem};
use crate::hal::{MotorController, PidGains, Result, Solenoid};
use crate::messages::{DriveCommand, Gear};

/// Gains used by `DriveDistance` unless overridden
pub const DEFAULT_DISTANCE_GAINS: PidGains = PidGains {
    kp: 0.5,
    ki: 0.0,
    kd: 0.0,
};

pub trait Command<S>: Send {
    fn name(&self) -> &str;

    fn initialize(&mut self, _subsystem: &mut S) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, subsystem: &mut S) -> Result<()>;

    fn is_finished(&self) -> bool {
        false
    }

    fn end(&mut self, _subsystem: &mut S, _interrupted: bool) -> Result<()> {
        Ok(())
    }
}

struct Slot<S> {
    command: Box<dyn Command<S>>,
    initialized: bool,
}

impl<S> Slot<S> {
    fn new(command: Box<dyn Command<S>>) -> Self {
        Self {
            command,
            initialized: false,
        }
    }

    fn run(&mut self, subsystem: &mut S) -> Result<()> {
        if !self.initialized {
            debug!("Initializing command {}", self.command.name());
            self.command.initialize(subsystem)?;
            self.initialized = true;
        }
        self.command.execute(subsystem)
    }
}

/// Runs the default command, or the scheduled one while it is active
pub struct CommandRunner<S> {
    default: Option<Slot<S>>,
    active: Option<Slot<S>>,
    pending: Option<Box<dyn Command<S>>>,
}

impl<S> Default for CommandRunner<S> {
    fn default() -> Self {
        Self {
            default: None,
            active: None,
            pending: None,
        }
    }
}

impl<S> CommandRunner<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default_command(&mut self, command: Box<dyn Command<S>>) {
        info!("Default command: {}", command.name());
        self.default = Some(Slot::new(command));
    }

    /// Queue a command to take over on the next tick, interrupting any active one
    pub fn schedule(&mut self, command: Box<dyn Command<S>>) {
        info!("Scheduling command: {}", command.name());
        self.pending = Some(command);
    }

    /// Name of the command that will run on the next tick
    pub fn current(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .map(|c| c.name())
            .or_else(|| self.active.as_ref().map(|s| s.command.name()))
            .or_else(|| self.default.as_ref().map(|s| s.command.name()))
    }

    /// Interrupt the scheduled command, if any
    pub fn cancel(&mut self, subsystem: &mut S) -> Result<()> {
        self.pending = None;
        if let Some(mut slot) = self.active.take() {
            info!("Cancelling command {}", slot.command.name());
            if slot.initialized {
                slot.command.end(subsystem, true)?;
            }
        }
        Ok(())
    }

    /// Run one tick
    pub fn run(&mut self, subsystem: &mut S) -> Result<()> {
        if let Some(next) = self.pending.take() {
            self.cancel(subsystem)?;
            self.active = Some(Slot::new(next));
            // Default gets a fresh initialize when it resumes
            if let Some(default) = self.default.as_mut() {
                default.initialized = false;
            }
        }

        if let Some(slot) = self.active.as_mut() {
            slot.run(subsystem)?;
            if slot.command.is_finished() {
                info!("Command {} finished", slot.command.name());
                slot.command.end(subsystem, false)?;
                self.active = None;
            }
            return Ok(());
        }

        match self.default.as_mut() {
            Some(slot) => slot.run(subsystem),
            None => Ok(()),
        }
    }
}

/// Latest operator input with its arrival time
#[derive(Debug, Clone, Copy)]
pub struct OperatorInput {
    pub command: DriveCommand,
    pub received_at: Instant,
}

impl OperatorInput {
    pub fn now(command: DriveCommand) -> Self {
        Self {
            command,
            received_at: Instant::now(),
        }
    }
}

/// Default command: arcade drive from the latest operator input
///
/// Input older than the timeout drives at zero.
pub struct TeleopDrive {
    input: watch::Receiver<Option<OperatorInput>>,
    timeout: Duration,
}

impl TeleopDrive {
    pub fn new(input: watch::Receiver<Option<OperatorInput>>) -> Self {
        Self::with_timeout(input, CMD_TIMEOUT)
    }

    pub fn with_timeout(input: watch::Receiver<Option<OperatorInput>>, timeout: Duration) -> Self {
        Self { input, timeout }
    }

    fn fresh_command(&self) -> Option<DriveCommand> {
        let latest = *self.input.borrow();
        latest
            .filter(|input| input.received_at.elapsed() <= self.timeout)
            .map(|input| input.command)
    }
}

impl<M, S, D> Command<DriveSubsystem<M, S, D>> for TeleopDrive
where
    M: MotorController,
    S: Solenoid,
    D: DifferentialDrive,
{
    fn name(&self) -> &str {
        "TeleopDrive"
    }

    fn execute(&mut self, drive: &mut DriveSubsystem<M, S, D>) -> Result<()> {
        let Some(cmd) = self.fresh_command() else {
            return drive.arcade_drive(0.0, 0.0);
        };

        match cmd.gear {
            Some(Gear::High) if !drive.is_high_gear() => drive.shift_high()?,
            Some(Gear::Low) if drive.is_high_gear() => drive.shift_low()?,
            _ => {}
        }
        drive.arcade_drive(cmd.forward, cmd.turn)
    }
}

impl<M, S, D> DriveSubsystem<M, S, D>
where
    M: MotorController,
    S: Solenoid,
    D: DifferentialDrive,
{
    /// Register teleop as the default command for this subsystem
    pub fn init_default_command(
        &self,
        runner: &mut CommandRunner<Self>,
        input: watch::Receiver<Option<OperatorInput>>,
    ) {
        runner.set_default_command(Box::new(TeleopDrive::new(input)));
    }
}

/// Autonomous: drive straight until the scaled encoder reaches `distance`
///
/// Safety is off for the duration since commands arrive only when the loop
/// ticks; it is restored on end.
pub struct DriveDistance {
    distance: f64,
    speed: f64,
    gains: PidGains,
    reached: bool,
}

impl DriveDistance {
    /// Negative distance drives backwards; `speed` magnitude is used
    pub fn new(distance: f64, speed: f64) -> Self {
        Self::with_gains(distance, speed, DEFAULT_DISTANCE_GAINS)
    }

    pub fn with_gains(distance: f64, speed: f64, gains: PidGains) -> Self {
        Self {
            distance,
            speed,
            gains,
            reached: false,
        }
    }
}

impl<M, S, D> Command<DriveSubsystem<M, S, D>> for DriveDistance
where
    M: MotorController,
    S: Solenoid,
    D: DifferentialDrive,
{
    fn name(&self) -> &str {
        "DriveDistance"
    }

    fn initialize(&mut self, drive: &mut DriveSubsystem<M, S, D>) -> Result<()> {
        info!(
            "Driving {} units at speed {}",
            self.distance,
            self.speed.abs()
        );
        self.reached = false;
        drive.set_safety(false);
        drive.set_pid(self.gains.kp, self.gains.ki, self.gains.kd)?;
        drive.reset_encoder()
    }

    fn execute(&mut self, drive: &mut DriveSubsystem<M, S, D>) -> Result<()> {
        let position = drive.scaled_encoder_position()?;
        if position.abs() >= self.distance.abs() {
            self.reached = true;
            return Ok(());
        }

        let power = self.speed.abs().copysign(self.distance);
        drive.arcade_drive(power, 0.0)?;
        debug!(
            "DriveDistance: position={:.3}, error={:.3}",
            position,
            drive.scaled_error()?
        );
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.reached
    }

    fn end(&mut self, drive: &mut DriveSubsystem<M, S, D>, interrupted: bool) -> Result<()> {
        if interrupted {
            info!("DriveDistance interrupted");
        }
        drive.arcade_drive(0.0, 0.0)?;
        drive.set_safety(true);
        Ok(())
    }
}
