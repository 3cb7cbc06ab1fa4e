// Keyboard teleop: W/S drive, A/D turn, R/F speed, H/L gear, Space stop, Enter restart, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use frc_drive_runtime::config::{TOPIC_CMD_CONTROL, TOPIC_CMD_DRIVE};
use frc_drive_runtime::messages::{ControlRequest, DriveCommand, Gear};

const FORWARD_POWERS: [f64; 3] = [0.25, 0.5, 1.0];
const TURN_POWERS: [f64; 3] = [0.3, 0.5, 0.8];
const INPUT_TIMEOUT_MS: u64 = 100; // Reset powers after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_drive = session.declare_publisher(TOPIC_CMD_DRIVE).await?;
    let pub_control = session.declare_publisher(TOPIC_CMD_CONTROL).await?;

    info!("Controls: W/S=drive, A/D=turn, R/F=speed, H/L=gear, Space=stop, Enter=restart, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&pub_drive, &pub_control).await;
    disable_raw_mode()?;

    result
}

async fn send_control(
    publisher: &zenoh::pubsub::Publisher<'_>,
    request: ControlRequest,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Sending {:?}", request);
    publisher.put(serde_json::to_string(&request)?).await?;
    Ok(())
}

async fn run_teleop(
    pub_drive: &zenoh::pubsub::Publisher<'_>,
    pub_control: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Persistent drive state
    let mut forward = 0.0;
    let mut turn = 0.0;
    let mut gear: Option<Gear> = None;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Movement - update power and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        forward = FORWARD_POWERS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        forward = -FORWARD_POWERS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        turn = -TURN_POWERS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        turn = TURN_POWERS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Gear, sent with every drive command until changed
                    KeyCode::Char('h') if pressed => {
                        gear = Some(Gear::High);
                        info!("Gear: HIGH");
                    }
                    KeyCode::Char('l') if pressed => {
                        gear = Some(Gear::Low);
                        info!("Gear: LOW");
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Mode toggles
                    KeyCode::Char(' ') if pressed => {
                        send_control(pub_control, ControlRequest::Stop).await?
                    }
                    KeyCode::Enter if pressed => {
                        send_control(pub_control, ControlRequest::Restart).await?
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset powers if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            forward = 0.0;
            turn = 0.0;
        }

        // Always publish at ~50Hz
        let cmd = DriveCommand {
            forward,
            turn,
            gear,
        };
        pub_drive.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
