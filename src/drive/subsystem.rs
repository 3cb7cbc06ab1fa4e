// Drive subsystem: six Talons and a gear shifter behind an arcade interface
//
// Four primary motors take the arcade mix. The two tension motors are geared
// to the rear wheels and mirror whatever the rear motors actually applied.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::mixer::{DifferentialDrive, RobotDrive, WheelOutputs};
use crate::config::{ENCODER_SCALE, FL_CURRENT_OFFSET, LIVE_WINDOW_GROUP, RobotMap};
use crate::hal::{ControlMode, HardwareFactory, MotorController, PidGains, Result, Solenoid};
use crate::telemetry::{Dashboard, LiveMonitor};

/// Dashboard keys published by the subsystem
pub mod keys {
    pub const FORWARD_POWER: &str = "ForwardPow";
    pub const TURN_POWER: &str = "TurnPower";
    pub const FL_CURRENT: &str = "FL Cur";
    pub const FR_CURRENT: &str = "FR Cur";
    pub const RL_CURRENT: &str = "RL Cur";
    pub const RR_CURRENT: &str = "RR Cur";
    pub const ENCODER: &str = "Encoder";
    pub const SCALED_ENCODER: &str = "Scaled Encoder";
    pub const LEFT_VOLTAGE: &str = "L Voltage";
    pub const RIGHT_VOLTAGE: &str = "R Voltage";
    pub const ERROR: &str = "Error";
}

/// Physical position of each motor controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorSlot {
    FrontLeft,
    RearLeft,
    FrontRight,
    RearRight,
    TensionLeft,
    TensionRight,
}

impl MotorSlot {
    pub const ALL: [MotorSlot; 6] = [
        MotorSlot::FrontLeft,
        MotorSlot::RearLeft,
        MotorSlot::FrontRight,
        MotorSlot::RearRight,
        MotorSlot::TensionLeft,
        MotorSlot::TensionRight,
    ];

    /// Label used for live-monitor registration
    pub fn label(&self) -> &'static str {
        match self {
            MotorSlot::FrontLeft => "Front Left",
            MotorSlot::RearLeft => "Rear Left",
            MotorSlot::FrontRight => "Front Right",
            MotorSlot::RearRight => "Rear Right",
            MotorSlot::TensionLeft => "Tension Left",
            MotorSlot::TensionRight => "Tension Right",
        }
    }
}

pub struct DriveSubsystem<M, S, D = RobotDrive>
where
    M: MotorController,
    S: Solenoid,
    D: DifferentialDrive,
{
    front_left: M,
    rear_left: M,
    front_right: M,
    rear_right: M,
    tension_left: M,
    tension_right: M,
    shifter: S,
    drive: D,
    dashboard: Arc<dyn Dashboard>,
    timed_out: bool,
}

impl<M, S> DriveSubsystem<M, S, RobotDrive>
where
    M: MotorController,
    S: Solenoid,
{
    /// Build the subsystem with the stock arcade helper configured from the map
    pub fn new<F>(
        map: &RobotMap,
        hardware: &mut F,
        dashboard: Arc<dyn Dashboard>,
        live: &dyn LiveMonitor,
    ) -> Result<Self>
    where
        F: HardwareFactory<Motor = M, Solenoid = S>,
    {
        Self::with_drive(map, hardware, RobotDrive::new(&map.drive), dashboard, live)
    }
}

impl<M, S, D> DriveSubsystem<M, S, D>
where
    M: MotorController,
    S: Solenoid,
    D: DifferentialDrive,
{
    /// Open every device named in the map; the first failure aborts construction
    pub fn with_drive<F>(
        map: &RobotMap,
        hardware: &mut F,
        drive: D,
        dashboard: Arc<dyn Dashboard>,
        live: &dyn LiveMonitor,
    ) -> Result<Self>
    where
        F: HardwareFactory<Motor = M, Solenoid = S>,
    {
        info!("Opening drive subsystem devices");
        let subsystem = Self {
            front_left: hardware.open_motor(map.can_front_left)?,
            rear_left: hardware.open_motor(map.can_rear_left)?,
            front_right: hardware.open_motor(map.can_front_right)?,
            rear_right: hardware.open_motor(map.can_rear_right)?,
            tension_right: hardware.open_motor(map.can_tension_right)?,
            tension_left: hardware.open_motor(map.can_tension_left)?,
            shifter: hardware.open_solenoid(map.shifter_channel)?,
            drive,
            dashboard,
            timed_out: false,
        };

        for slot in [
            MotorSlot::FrontLeft,
            MotorSlot::RearLeft,
            MotorSlot::FrontRight,
            MotorSlot::RearRight,
        ] {
            live.add_actuator(
                LIVE_WINDOW_GROUP,
                slot.label(),
                subsystem.motor(slot).device_id(),
            );
        }

        info!("Drive subsystem ready");
        Ok(subsystem)
    }

    /// Arcade drive
    ///
    /// # Arguments
    /// * `forward_power` - Forward power, nominally in [-1, 1]
    /// * `turn_power` - Turn power, nominally in [-1, 1]
    ///
    /// Values are handed to the drive helper untouched.
    pub fn arcade_drive(&mut self, forward_power: f64, turn_power: f64) -> Result<()> {
        let outputs = self.drive.arcade(forward_power, turn_power);
        debug!(
            "Arcade drive: forward={}, turn={} -> left={}, right={}",
            forward_power, turn_power, outputs.left, outputs.right
        );

        self.apply_outputs(outputs)?;

        self.timed_out = false;
        self.dashboard.put_number(keys::FORWARD_POWER, forward_power);
        self.dashboard.put_number(keys::TURN_POWER, turn_power);
        self.display_currents()
    }

    /// Command the primary motors, then mirror the rear motors onto the tension motors
    fn apply_outputs(&mut self, outputs: WheelOutputs) -> Result<()> {
        self.front_left.set(outputs.left)?;
        self.rear_left.set(outputs.left)?;
        self.front_right.set(outputs.right)?;
        self.rear_right.set(outputs.right)?;

        // Tension motors follow what the rear motors applied, not the mix
        self.tension_right.set_control_mode(ControlMode::PercentOutput)?;
        self.tension_left.set_control_mode(ControlMode::PercentOutput)?;
        self.tension_right.set(self.rear_right.get()?)?;
        self.tension_left.set(self.rear_left.get()?)
    }

    /// Publish motor currents
    ///
    /// The front-left reading (less a fixed offset) is published under both the
    /// front-left and rear-right keys; rear-right is never read.
    pub fn display_currents(&self) -> Result<()> {
        let front_left = self.front_left.output_current()?;
        let front_right = self.front_right.output_current()?;
        let rear_left = self.rear_left.output_current()?;

        self.dashboard
            .put_number(keys::FL_CURRENT, front_left - FL_CURRENT_OFFSET);
        self.dashboard.put_number(keys::FR_CURRENT, front_right);
        self.dashboard.put_number(keys::RL_CURRENT, rear_left);
        self.dashboard
            .put_number(keys::RR_CURRENT, front_left - FL_CURRENT_OFFSET);
        Ok(())
    }

    /// Disable all six controllers so nothing reaches the wheels
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping drive: all controllers disabled");
        self.set_all_modes(ControlMode::Disabled)
    }

    /// Return all six controllers to percent output
    pub fn restart(&mut self) -> Result<()> {
        info!("Restarting drive: all controllers in percent output");
        self.set_all_modes(ControlMode::PercentOutput)
    }

    fn set_all_modes(&mut self, mode: ControlMode) -> Result<()> {
        self.front_left.set_control_mode(mode)?;
        self.front_right.set_control_mode(mode)?;
        self.rear_left.set_control_mode(mode)?;
        self.rear_right.set_control_mode(mode)?;
        self.tension_right.set_control_mode(mode)?;
        self.tension_left.set_control_mode(mode)
    }

    /// Raw tick count of the rear-right encoder
    pub fn encoder_position(&self) -> Result<i32> {
        self.rear_right.encoder_position()
    }

    /// Encoder position in scaled units
    pub fn scaled_encoder_position(&self) -> Result<f64> {
        Ok(f64::from(self.encoder_position()?) / ENCODER_SCALE)
    }

    /// Turn the drive helper's motor-safety watchdog on or off
    ///
    /// Autonomous routines turn it off while they issue commands at an
    /// irregular cadence.
    pub fn set_safety(&mut self, enabled: bool) {
        info!("Drive safety {}", if enabled { "enabled" } else { "disabled" });
        self.drive.set_safety_enabled(enabled);
    }

    /// Configure the rear-right closed loop
    pub fn set_pid(&mut self, kp: f64, ki: f64, kd: f64) -> Result<()> {
        debug!("Setting PID: kp={}, ki={}, kd={}", kp, ki, kd);
        self.rear_right.set_pid(PidGains::new(kp, ki, kd))
    }

    /// Zero the rear-right encoder
    pub fn reset_encoder(&mut self) -> Result<()> {
        self.rear_right.set_encoder_position(0)
    }

    /// Output voltage of the left drive (front-left controller)
    pub fn left_drive_voltage(&self) -> Result<f64> {
        self.front_left.output_voltage()
    }

    /// Output voltage of the right drive (front-right controller)
    pub fn right_drive_voltage(&self) -> Result<f64> {
        self.front_right.output_voltage()
    }

    /// Rear-right closed-loop error in scaled units
    pub fn scaled_error(&self) -> Result<f64> {
        Ok(f64::from(self.rear_right.closed_loop_error()?) / ENCODER_SCALE)
    }

    pub fn shift_high(&mut self) -> Result<()> {
        debug!("Shifting to high gear");
        self.shifter.set(true)
    }

    pub fn shift_low(&mut self) -> Result<()> {
        debug!("Shifting to low gear");
        self.shifter.set(false)
    }

    pub fn is_high_gear(&self) -> bool {
        self.shifter.get()
    }

    /// Zero every drive motor if the drive helper's watchdog has expired
    ///
    /// Returns true when outputs were zeroed on this call.
    pub fn enforce_safety(&mut self) -> Result<bool> {
        if self.drive.is_alive() {
            return Ok(false);
        }
        if !self.timed_out {
            warn!("Drive watchdog expired, stopping motors");
            self.timed_out = true;
        }
        self.apply_outputs(WheelOutputs::zero())?;
        Ok(true)
    }

    /// Publish encoder, voltage and error readouts
    pub fn publish_readouts(&self) -> Result<()> {
        self.dashboard
            .put_number(keys::ENCODER, f64::from(self.encoder_position()?));
        self.dashboard
            .put_number(keys::SCALED_ENCODER, self.scaled_encoder_position()?);
        self.dashboard
            .put_number(keys::LEFT_VOLTAGE, self.left_drive_voltage()?);
        self.dashboard
            .put_number(keys::RIGHT_VOLTAGE, self.right_drive_voltage()?);
        self.dashboard.put_number(keys::ERROR, self.scaled_error()?);
        Ok(())
    }

    /// Read-only access to an owned controller
    pub fn motor(&self, slot: MotorSlot) -> &M {
        match slot {
            MotorSlot::FrontLeft => &self.front_left,
            MotorSlot::RearLeft => &self.rear_left,
            MotorSlot::FrontRight => &self.front_right,
            MotorSlot::RearRight => &self.rear_right,
            MotorSlot::TensionLeft => &self.tension_left,
            MotorSlot::TensionRight => &self.tension_right,
        }
    }

    pub fn shifter(&self) -> &S {
        &self.shifter
    }

    pub fn drive(&self) -> &D {
        &self.drive
    }
}

impl<M, S, D> Drop for DriveSubsystem<M, S, D>
where
    M: MotorController,
    S: Solenoid,
    D: DifferentialDrive,
{
    fn drop(&mut self) {
        // Leave the controllers disabled when the subsystem goes away
        if let Err(e) = self.set_all_modes(ControlMode::Disabled) {
            warn!("Failed to disable drive on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::mixer::arcade_mix;
    use crate::hal::{HalError, SimHardware, SimMotorController, SimSolenoid};
    use crate::telemetry::{LiveWindow, NetworkTable};

    /// Drive helper that records every call and mixes without squaring
    #[derive(Debug, Default)]
    struct RecordingDrive {
        calls: Vec<(f64, f64)>,
        safety: bool,
        alive: bool,
    }

    impl DifferentialDrive for RecordingDrive {
        fn arcade(&mut self, forward: f64, turn: f64) -> WheelOutputs {
            self.calls.push((forward, turn));
            arcade_mix(forward, turn, false)
        }

        fn set_safety_enabled(&mut self, enabled: bool) {
            self.safety = enabled;
        }

        fn is_safety_enabled(&self) -> bool {
            self.safety
        }

        fn is_alive(&self) -> bool {
            self.alive
        }
    }

    type TestSubsystem = DriveSubsystem<SimMotorController, SimSolenoid, RecordingDrive>;

    fn build(hw: &mut SimHardware) -> (TestSubsystem, Arc<NetworkTable>) {
        let table = Arc::new(NetworkTable::new());
        let drive = RecordingDrive {
            safety: true,
            alive: true,
            ..Default::default()
        };
        let subsystem = DriveSubsystem::with_drive(
            &RobotMap::default(),
            hw,
            drive,
            table.clone(),
            &LiveWindow::new(),
        )
        .unwrap();
        (subsystem, table)
    }

    fn output(subsystem: &TestSubsystem, slot: MotorSlot) -> f64 {
        subsystem.motor(slot).get().unwrap()
    }

    #[test]
    fn test_construction_registers_primary_motors() {
        let live = LiveWindow::new();
        let table: Arc<dyn Dashboard> = Arc::new(NetworkTable::new());
        let subsystem =
            DriveSubsystem::new(&RobotMap::default(), &mut SimHardware::new(), table, &live)
                .unwrap();

        let entries = live.entries();
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            ["Front Left", "Rear Left", "Front Right", "Rear Right"]
        );
        assert!(entries.iter().all(|e| e.group == "Robot Drive"));
        assert_eq!(entries[3].device_id, 4);
        assert!(subsystem.drive().is_safety_enabled());
        assert!(!subsystem.is_high_gear());
    }

    #[test]
    fn test_construction_fails_on_missing_device() {
        let table: Arc<dyn Dashboard> = Arc::new(NetworkTable::new());
        let result = DriveSubsystem::new(
            &RobotMap::default(),
            &mut SimHardware::new().without_motor(6),
            table.clone(),
            &LiveWindow::new(),
        );
        assert!(matches!(result, Err(HalError::MotorNotFound { id: 6 })));

        let result = DriveSubsystem::new(
            &RobotMap::default(),
            &mut SimHardware::new().without_solenoid(0),
            table,
            &LiveWindow::new(),
        );
        assert!(matches!(
            result,
            Err(HalError::SolenoidNotFound { channel: 0 })
        ));
    }

    #[test]
    fn test_arcade_drive_commands_primary_motors() {
        let (mut subsystem, table) = build(&mut SimHardware::new());
        subsystem.arcade_drive(0.5, 0.25).unwrap();

        assert_eq!(subsystem.drive().calls, vec![(0.5, 0.25)]);
        assert_eq!(output(&subsystem, MotorSlot::FrontLeft), 0.75);
        assert_eq!(output(&subsystem, MotorSlot::RearLeft), 0.75);
        assert_eq!(output(&subsystem, MotorSlot::FrontRight), 0.25);
        assert_eq!(output(&subsystem, MotorSlot::RearRight), 0.25);
        assert_eq!(table.get_number(keys::FORWARD_POWER), Some(0.5));
        assert_eq!(table.get_number(keys::TURN_POWER), Some(0.25));
        assert!(table.get_number(keys::FL_CURRENT).is_some());
    }

    #[test]
    fn test_arcade_drive_passes_out_of_range_values_through() {
        let (mut subsystem, table) = build(&mut SimHardware::new());
        subsystem.arcade_drive(2.5, -3.0).unwrap();
        assert_eq!(subsystem.drive().calls, vec![(2.5, -3.0)]);
        assert_eq!(table.get_number(keys::FORWARD_POWER), Some(2.5));
        assert_eq!(table.get_number(keys::TURN_POWER), Some(-3.0));
    }

    #[test]
    fn test_tension_motors_mirror_rear_motors() {
        let (mut subsystem, _) = build(&mut SimHardware::new());
        subsystem.stop().unwrap();
        subsystem.restart().unwrap();
        subsystem.arcade_drive(-0.3, 0.5).unwrap();

        let rear_left = output(&subsystem, MotorSlot::RearLeft);
        let rear_right = output(&subsystem, MotorSlot::RearRight);
        assert_eq!(output(&subsystem, MotorSlot::TensionLeft), rear_left);
        assert_eq!(output(&subsystem, MotorSlot::TensionRight), rear_right);
        for slot in [MotorSlot::TensionLeft, MotorSlot::TensionRight] {
            assert_eq!(
                subsystem.motor(slot).control_mode(),
                ControlMode::PercentOutput
            );
        }
    }

    #[test]
    fn test_tension_motors_mirror_read_back_not_mix() {
        // Rear motors disabled: they apply zero, so the tension motors do too
        let (mut subsystem, _) = build(&mut SimHardware::new());
        subsystem.stop().unwrap();
        subsystem.arcade_drive(0.8, 0.0).unwrap();

        assert_eq!(subsystem.motor(MotorSlot::RearRight).commanded(), 0.8);
        assert_eq!(output(&subsystem, MotorSlot::RearRight), 0.0);
        assert_eq!(subsystem.motor(MotorSlot::TensionRight).commanded(), 0.0);
        assert_eq!(subsystem.motor(MotorSlot::TensionLeft).commanded(), 0.0);
        assert_eq!(
            subsystem.motor(MotorSlot::TensionRight).control_mode(),
            ControlMode::PercentOutput
        );
    }

    #[test]
    fn test_display_currents_reuses_front_left_reading() {
        let map = RobotMap::default();
        let mut hw = SimHardware::new()
            .with_current(map.can_front_left, 2.0)
            .with_current(map.can_front_right, 1.0)
            .with_current(map.can_rear_left, 3.0)
            .with_current(map.can_rear_right, 2.0);
        let (subsystem, table) = build(&mut hw);
        subsystem.display_currents().unwrap();

        assert_eq!(table.get_number(keys::FL_CURRENT), Some(0.5));
        assert_eq!(table.get_number(keys::FR_CURRENT), Some(1.0));
        assert_eq!(table.get_number(keys::RL_CURRENT), Some(3.0));
        assert_eq!(table.get_number(keys::RR_CURRENT), Some(0.5));
    }

    #[test]
    fn test_stop_and_restart() {
        let (mut subsystem, _) = build(&mut SimHardware::new());
        subsystem.stop().unwrap();
        for slot in MotorSlot::ALL {
            assert_eq!(subsystem.motor(slot).control_mode(), ControlMode::Disabled);
        }

        // Idempotent
        subsystem.stop().unwrap();
        subsystem.restart().unwrap();
        for slot in MotorSlot::ALL {
            assert_eq!(
                subsystem.motor(slot).control_mode(),
                ControlMode::PercentOutput
            );
        }
    }

    #[test]
    fn test_scaled_encoder_position() {
        let map = RobotMap::default();
        for ticks in [0, 645, -1290, 1000, i32::MAX] {
            let (subsystem, _) =
                build(&mut SimHardware::new().with_encoder(map.can_rear_right, ticks));
            assert_eq!(subsystem.encoder_position().unwrap(), ticks);
            assert_eq!(
                subsystem.scaled_encoder_position().unwrap(),
                f64::from(ticks) / 645.0
            );
        }
    }

    #[test]
    fn test_reset_encoder() {
        let map = RobotMap::default();
        let (mut subsystem, _) =
            build(&mut SimHardware::new().with_encoder(map.can_rear_right, 5000));
        subsystem.reset_encoder().unwrap();
        assert_eq!(subsystem.encoder_position().unwrap(), 0);
        assert_eq!(subsystem.scaled_encoder_position().unwrap(), 0.0);
    }

    #[test]
    fn test_scaled_error() {
        let map = RobotMap::default();
        let (subsystem, _) =
            build(&mut SimHardware::new().with_closed_loop_error(map.can_rear_right, -1935));
        assert_eq!(subsystem.scaled_error().unwrap(), -3.0);
    }

    #[test]
    fn test_set_pid_targets_rear_right() {
        let (mut subsystem, _) = build(&mut SimHardware::new());
        subsystem.set_pid(0.5, -0.01, 2.0).unwrap();
        assert_eq!(
            subsystem.motor(MotorSlot::RearRight).pid(),
            PidGains::new(0.5, -0.01, 2.0)
        );
        assert_eq!(
            subsystem.motor(MotorSlot::FrontLeft).pid(),
            PidGains::default()
        );
    }

    #[test]
    fn test_set_safety_forwards_to_drive() {
        let (mut subsystem, _) = build(&mut SimHardware::new());
        subsystem.set_safety(false);
        assert!(!subsystem.drive().is_safety_enabled());
        subsystem.set_safety(true);
        assert!(subsystem.drive().is_safety_enabled());
    }

    #[test]
    fn test_drive_voltages() {
        let map = RobotMap::default();
        let mut hw = SimHardware::new()
            .with_voltage(map.can_front_left, 11.2)
            .with_voltage(map.can_front_right, -10.8);
        let (subsystem, _) = build(&mut hw);
        assert_eq!(subsystem.left_drive_voltage().unwrap(), 11.2);
        assert_eq!(subsystem.right_drive_voltage().unwrap(), -10.8);
    }

    #[test]
    fn test_shifter_has_no_hysteresis() {
        let (mut subsystem, _) = build(&mut SimHardware::new());
        subsystem.shift_high().unwrap();
        subsystem.shift_low().unwrap();
        assert!(!subsystem.shifter().get());

        subsystem.shift_low().unwrap();
        subsystem.shift_high().unwrap();
        assert!(subsystem.shifter().get());
        assert!(subsystem.is_high_gear());
    }

    #[test]
    fn test_enforce_safety_zeroes_all_drive_motors() {
        let (mut subsystem, _) = build(&mut SimHardware::new());
        subsystem.arcade_drive(0.6, 0.0).unwrap();
        assert!(!subsystem.enforce_safety().unwrap());
        assert_eq!(output(&subsystem, MotorSlot::FrontLeft), 0.6);
        assert_eq!(output(&subsystem, MotorSlot::TensionRight), 0.6);

        subsystem.drive.alive = false;
        assert!(subsystem.enforce_safety().unwrap());
        for slot in MotorSlot::ALL {
            assert_eq!(output(&subsystem, slot), 0.0, "{:?} still driving", slot);
        }
    }

    #[test]
    fn test_safety_stop_with_real_watchdog_stops_tension_motors() {
        let table: Arc<dyn Dashboard> = Arc::new(NetworkTable::new());
        let mut map = RobotMap::default();
        map.drive.safety_expiration_ms = 0;
        let mut subsystem =
            DriveSubsystem::new(&map, &mut SimHardware::new(), table, &LiveWindow::new()).unwrap();
        subsystem.arcade_drive(0.6, 0.0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert!(subsystem.enforce_safety().unwrap());
        assert_eq!(subsystem.motor(MotorSlot::RearRight).get().unwrap(), 0.0);
        assert_eq!(subsystem.motor(MotorSlot::TensionRight).get().unwrap(), 0.0);
        assert_eq!(subsystem.motor(MotorSlot::TensionLeft).get().unwrap(), 0.0);
    }

    #[test]
    fn test_publish_readouts() {
        let map = RobotMap::default();
        let mut hw = SimHardware::new()
            .with_encoder(map.can_rear_right, 1290)
            .with_closed_loop_error(map.can_rear_right, 645);
        let (subsystem, table) = build(&mut hw);
        subsystem.publish_readouts().unwrap();
        assert_eq!(table.get_number(keys::ENCODER), Some(1290.0));
        assert_eq!(table.get_number(keys::SCALED_ENCODER), Some(2.0));
        assert_eq!(table.get_number(keys::ERROR), Some(1.0));
        assert_eq!(table.get_number(keys::LEFT_VOLTAGE), Some(0.0));
    }

    #[test]
    fn test_hardware_fault_propagates() {
        let map = RobotMap::default();
        let (mut subsystem, _) = build(&mut SimHardware::new().with_fault(map.can_rear_right));
        assert!(matches!(
            subsystem.arcade_drive(0.1, 0.0),
            Err(HalError::Fault { id: 4, .. })
        ));
        assert!(subsystem.encoder_position().is_err());
    }
}
