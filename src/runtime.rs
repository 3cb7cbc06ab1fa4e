// Periodic drive loop with operator-input watchdog
// Each tick: drain operator input and control requests, run the active
// command, enforce drive safety, then publish dashboard values and health.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

use crate::command::{CommandRunner, DriveDistance, OperatorInput};
use crate::config::{
    CMD_TIMEOUT, MAX_LOOP_HZ, RobotMap, TOPIC_CMD_CONTROL, TOPIC_CMD_DRIVE, TOPIC_DASHBOARD,
    TOPIC_HEALTH,
};
use crate::drive::{DifferentialDrive, DriveSubsystem};
use crate::hal::{self, MotorController, SimHardware, Solenoid};
use crate::messages::{ControlRequest, DashboardFrame, DriveCommand, RuntimeHealth};
use crate::telemetry::{LiveWindow, NetworkTable};

/// Startup options for the runtime
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub robot_map: Option<PathBuf>,
    pub loop_hz: u64,
    pub sim_ticks_per_update: f64,
}

/// Tick period for a loop rate, clamped to 1..=MAX_LOOP_HZ so it is never zero
pub fn loop_period(loop_hz: u64) -> Duration {
    Duration::from_millis(1000 / loop_hz.clamp(1, MAX_LOOP_HZ))
}

pub struct Runtime {
    input: watch::Sender<Option<OperatorInput>>,
    cmd_received_at: Option<Instant>,
    health: RuntimeHealth,
}

impl Runtime {
    /// Returns the runtime and the receiver the teleop command reads from
    pub fn new() -> (Self, watch::Receiver<Option<OperatorInput>>) {
        let (input, rx) = watch::channel(None);
        let runtime = Self {
            input,
            cmd_received_at: None,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        };
        (runtime, rx)
    }

    /// Process incoming operator input
    fn on_command(&mut self, cmd: DriveCommand) {
        let input = OperatorInput::now(cmd);
        self.cmd_received_at = Some(input.received_at);
        self.input.send_replace(Some(input));
    }

    /// Update health from the age of the latest operator input
    fn update_health(&mut self) -> RuntimeHealth {
        let fresh = self
            .cmd_received_at
            .is_some_and(|at| at.elapsed() <= CMD_TIMEOUT);

        if fresh {
            if self.health != RuntimeHealth::Ok {
                info!("Operator input received, driving");
            }
            self.health = RuntimeHealth::Ok;
        } else {
            if self.health != RuntimeHealth::CmdStale {
                warn!("Operator input stale, driving at zero");
            }
            self.health = RuntimeHealth::CmdStale;
        }
        self.health
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }
}

/// Apply a one-off control request to the drive
pub fn handle_control<M, S, D>(
    request: ControlRequest,
    drive: &mut DriveSubsystem<M, S, D>,
    runner: &mut CommandRunner<DriveSubsystem<M, S, D>>,
) -> hal::Result<()>
where
    M: MotorController,
    S: Solenoid,
    D: DifferentialDrive,
{
    info!("Control request: {:?}", request);
    match request {
        ControlRequest::Stop => {
            runner.cancel(drive)?;
            drive.stop()
        }
        ControlRequest::Restart => drive.restart(),
        ControlRequest::ResetEncoder => drive.reset_encoder(),
        ControlRequest::SetSafety { enabled } => {
            drive.set_safety(enabled);
            Ok(())
        }
        ControlRequest::SetPid { kp, ki, kd } => drive.set_pid(kp, ki, kd),
        ControlRequest::ShiftHigh => drive.shift_high(),
        ControlRequest::ShiftLow => drive.shift_low(),
        ControlRequest::DriveDistance { distance, speed } => {
            runner.schedule(Box::new(DriveDistance::new(distance, speed)));
            Ok(())
        }
    }
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let map = match &options.robot_map {
        Some(path) => {
            info!("Loading robot map from {}", path.display());
            RobotMap::load(path)?
        }
        None => RobotMap::default(),
    };

    let table = Arc::new(NetworkTable::new());
    let live = LiveWindow::new();
    let mut hardware = SimHardware::new().with_ticks_per_update(options.sim_ticks_per_update);
    let mut drive = DriveSubsystem::new(&map, &mut hardware, table.clone(), &live)?;
    for entry in live.entries() {
        info!(
            "Live monitor: {}/{} (CAN {})",
            entry.group, entry.label, entry.device_id
        );
    }

    let (mut runtime, input) = Runtime::new();
    let mut runner = CommandRunner::new();
    drive.init_default_command(&mut runner, input);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_drive = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_control = session.declare_subscriber(TOPIC_CMD_CONTROL).await?;
    let pub_dashboard = session.declare_publisher(TOPIC_DASHBOARD).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let loop_hz = options.loop_hz.clamp(1, MAX_LOOP_HZ);
    let mut tick = interval(loop_period(loop_hz));

    info!(
        "Runtime started: {}Hz loop, {}ms input timeout",
        loop_hz,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_DRIVE, TOPIC_CMD_CONTROL);
    info!("Publishing to: {}, {}", TOPIC_DASHBOARD, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending operator input (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_drive.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse drive command: {}", e),
            }
        }

        // 2. Apply control requests in arrival order
        while let Ok(Some(sample)) = sub_control.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ControlRequest>(&payload) {
                Ok(request) => handle_control(request, &mut drive, &mut runner)?,
                Err(e) => warn!("Failed to parse control request: {}", e),
            }
        }

        // 3. Run commands, then stop the motors if nothing fed the drive
        runtime.update_health();
        runner.run(&mut drive)?;
        drive.enforce_safety()?;

        // 4. Publish dashboard
        drive.publish_readouts()?;
        let frame = DashboardFrame::from(table.snapshot());
        pub_dashboard.put(serde_json::to_string(&frame)?).await?;

        // 5. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}
