// Hardware abstraction for the drive subsystem
//
// Provides:
// - Motor controller and solenoid traits (one handle per physical device)
// - A factory trait used once at subsystem construction
// - Simulated devices for tests and bench runs

pub mod sim;

pub use sim::{SimHardware, SimMotorController, SimSolenoid};

/// Motor controller output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Output follows the commanded fraction of bus voltage
    PercentOutput,
    /// Output forced to zero, commands ignored
    Disabled,
}

/// Closed-loop tuning constants
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// Error types for device access
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("No motor controller at CAN id {id}")]
    MotorNotFound { id: u8 },

    #[error("No solenoid on channel {channel}")]
    SolenoidNotFound { channel: u8 },

    #[error("Device {id} fault: {reason}")]
    Fault { id: u8, reason: String },
}

pub type Result<T> = std::result::Result<T, HalError>;

/// A CAN motor controller with an attached quadrature encoder
pub trait MotorController: Send {
    fn device_id(&self) -> u8;

    fn set_control_mode(&mut self, mode: ControlMode) -> Result<()>;

    fn control_mode(&self) -> ControlMode;

    /// Command an output in [-1.0, 1.0]
    fn set(&mut self, output: f64) -> Result<()>;

    /// Read back the applied output
    fn get(&self) -> Result<f64>;

    /// Output current in amps
    fn output_current(&self) -> Result<f64>;

    /// Output voltage in volts
    fn output_voltage(&self) -> Result<f64>;

    /// Raw encoder ticks
    fn encoder_position(&self) -> Result<i32>;

    fn set_encoder_position(&mut self, ticks: i32) -> Result<()>;

    fn set_pid(&mut self, gains: PidGains) -> Result<()>;

    /// Current closed-loop error in raw ticks
    fn closed_loop_error(&self) -> Result<i32>;
}

/// A single-channel pneumatic solenoid
pub trait Solenoid: Send {
    fn channel(&self) -> u8;

    fn set(&mut self, on: bool) -> Result<()>;

    fn get(&self) -> bool;
}

/// Opens device handles by hardware address
pub trait HardwareFactory {
    type Motor: MotorController;
    type Solenoid: Solenoid;

    fn open_motor(&mut self, can_id: u8) -> Result<Self::Motor>;

    fn open_solenoid(&mut self, channel: u8) -> Result<Self::Solenoid>;
}
