// Simulated drive hardware
//
// Devices behave like a Talon on an unloaded bench: applied output follows the
// control mode, voltage follows the bus, and the encoder optionally advances in
// proportion to each commanded output. Readings can be pinned per CAN id.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{ControlMode, HalError, HardwareFactory, MotorController, PidGains, Result, Solenoid};

/// Nominal battery voltage
pub const BUS_VOLTAGE: f64 = 12.0;

/// Current drawn at full output when no reading is pinned
pub const AMPS_AT_FULL_OUTPUT: f64 = 40.0;

/// Pinned readings for one simulated motor controller
#[derive(Debug, Clone, Copy, Default)]
struct MotorSeed {
    current: Option<f64>,
    voltage: Option<f64>,
    encoder: i32,
    closed_loop_error: i32,
    faulted: bool,
}

/// Factory for simulated devices
#[derive(Debug, Default)]
pub struct SimHardware {
    seeds: HashMap<u8, MotorSeed>,
    missing_motors: HashSet<u8>,
    missing_solenoids: HashSet<u8>,
    ticks_per_update: f64,
}

impl SimHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder ticks added per `set` call at full output
    pub fn with_ticks_per_update(mut self, ticks: f64) -> Self {
        self.ticks_per_update = ticks;
        self
    }

    pub fn with_current(mut self, can_id: u8, amps: f64) -> Self {
        self.seeds.entry(can_id).or_default().current = Some(amps);
        self
    }

    pub fn with_voltage(mut self, can_id: u8, volts: f64) -> Self {
        self.seeds.entry(can_id).or_default().voltage = Some(volts);
        self
    }

    pub fn with_encoder(mut self, can_id: u8, ticks: i32) -> Self {
        self.seeds.entry(can_id).or_default().encoder = ticks;
        self
    }

    pub fn with_closed_loop_error(mut self, can_id: u8, error: i32) -> Self {
        self.seeds.entry(can_id).or_default().closed_loop_error = error;
        self
    }

    /// Every call on this motor fails once opened
    pub fn with_fault(mut self, can_id: u8) -> Self {
        self.seeds.entry(can_id).or_default().faulted = true;
        self
    }

    /// Opening this CAN id fails
    pub fn without_motor(mut self, can_id: u8) -> Self {
        self.missing_motors.insert(can_id);
        self
    }

    /// Opening this solenoid channel fails
    pub fn without_solenoid(mut self, channel: u8) -> Self {
        self.missing_solenoids.insert(channel);
        self
    }
}

impl HardwareFactory for SimHardware {
    type Motor = SimMotorController;
    type Solenoid = SimSolenoid;

    fn open_motor(&mut self, can_id: u8) -> Result<SimMotorController> {
        if self.missing_motors.contains(&can_id) {
            return Err(HalError::MotorNotFound { id: can_id });
        }
        let seed = self.seeds.get(&can_id).copied().unwrap_or_default();
        debug!("Opened simulated motor controller {}", can_id);
        Ok(SimMotorController {
            id: can_id,
            mode: ControlMode::PercentOutput,
            commanded: 0.0,
            encoder: seed.encoder,
            gains: PidGains::default(),
            seed,
            ticks_per_update: self.ticks_per_update,
            remainder: 0.0,
        })
    }

    fn open_solenoid(&mut self, channel: u8) -> Result<SimSolenoid> {
        if self.missing_solenoids.contains(&channel) {
            return Err(HalError::SolenoidNotFound { channel });
        }
        Ok(SimSolenoid {
            channel,
            state: false,
        })
    }
}

/// Simulated motor controller
#[derive(Debug)]
pub struct SimMotorController {
    id: u8,
    mode: ControlMode,
    commanded: f64,
    encoder: i32,
    gains: PidGains,
    seed: MotorSeed,
    ticks_per_update: f64,
    remainder: f64,
}

impl SimMotorController {
    fn check(&self) -> Result<()> {
        if self.seed.faulted {
            return Err(HalError::Fault {
                id: self.id,
                reason: "simulated fault".to_string(),
            });
        }
        Ok(())
    }

    fn applied(&self) -> f64 {
        match self.mode {
            ControlMode::PercentOutput => self.commanded,
            ControlMode::Disabled => 0.0,
        }
    }

    /// Last commanded output, regardless of mode
    pub fn commanded(&self) -> f64 {
        self.commanded
    }

    pub fn pid(&self) -> PidGains {
        self.gains
    }
}

impl MotorController for SimMotorController {
    fn device_id(&self) -> u8 {
        self.id
    }

    fn set_control_mode(&mut self, mode: ControlMode) -> Result<()> {
        self.check()?;
        self.mode = mode;
        Ok(())
    }

    fn control_mode(&self) -> ControlMode {
        self.mode
    }

    fn set(&mut self, output: f64) -> Result<()> {
        self.check()?;
        self.commanded = output;

        // Integrate fractional ticks so slow outputs still move the encoder
        let travel = self.applied() * self.ticks_per_update + self.remainder;
        let whole = travel.trunc();
        self.remainder = travel - whole;
        self.encoder = self.encoder.saturating_add(whole as i32);
        Ok(())
    }

    fn get(&self) -> Result<f64> {
        self.check()?;
        Ok(self.applied())
    }

    fn output_current(&self) -> Result<f64> {
        self.check()?;
        Ok(self
            .seed
            .current
            .unwrap_or_else(|| self.applied().abs() * AMPS_AT_FULL_OUTPUT))
    }

    fn output_voltage(&self) -> Result<f64> {
        self.check()?;
        Ok(self.seed.voltage.unwrap_or_else(|| self.applied() * BUS_VOLTAGE))
    }

    fn encoder_position(&self) -> Result<i32> {
        self.check()?;
        Ok(self.encoder)
    }

    fn set_encoder_position(&mut self, ticks: i32) -> Result<()> {
        self.check()?;
        self.encoder = ticks;
        self.remainder = 0.0;
        Ok(())
    }

    fn set_pid(&mut self, gains: PidGains) -> Result<()> {
        self.check()?;
        self.gains = gains;
        Ok(())
    }

    fn closed_loop_error(&self) -> Result<i32> {
        self.check()?;
        Ok(self.seed.closed_loop_error)
    }
}

/// Simulated single-channel solenoid
#[derive(Debug)]
pub struct SimSolenoid {
    channel: u8,
    state: bool,
}

impl Solenoid for SimSolenoid {
    fn channel(&self) -> u8 {
        self.channel
    }

    fn set(&mut self, on: bool) -> Result<()> {
        self.state = on;
        Ok(())
    }

    fn get(&self) -> bool {
        self.state
    }
}
