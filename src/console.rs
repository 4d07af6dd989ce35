//! Line-oriented front-end on stdin/stdout.
//!
//! Prints every [`AppState`] change and maps one word per line to a
//! coordinator command. Ctrl-C and end of input both shut the services down.

use crate::application::ServiceCoordinator;
use crate::domain::models::{AppState, CommandOutcome, FakeBpmStatus, ServicesState};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

const HELP: &str = "\
Commands:
  start   start advertising and the web server
  stop    stop both
  fake    toggle the fake BPM generator
  status  print the current state
  hw      print Bluetooth hardware and permission state
  help    print this list
  quit    stop everything and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Fake,
    Status,
    Hardware,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "fake" => Ok(Self::Fake),
            "status" | "s" => Ok(Self::Status),
            "hw" | "hardware" => Ok(Self::Hardware),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

pub fn describe(state: &AppState) -> String {
    let bpm = state
        .bpm
        .map(|bpm| bpm.to_string())
        .unwrap_or_else(|| "--".to_string());
    let client = if state.is_client_connected {
        "connected"
    } else {
        "none"
    };
    format!(
        "[{}] BPM: {} | client: {}",
        state.services_state, bpm, client
    )
}

fn describe_outcome(command: &str, outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Accepted => format!("{}: accepted", command),
        CommandOutcome::AlreadyInState(state) => {
            format!("{}: ignored, services are {}", command, state)
        }
    }
}

fn describe_fake(status: FakeBpmStatus) -> &'static str {
    match status {
        FakeBpmStatus::Started => "fake BPM: started",
        FakeBpmStatus::Stopped => "fake BPM: stopped",
        FakeBpmStatus::AlreadyRunning => "fake BPM: already running",
        FakeBpmStatus::NotPermitted => "fake BPM: services must be started first",
    }
}

/// Returns `false` once the user asked to quit.
async fn execute(coordinator: &ServiceCoordinator, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::Start => {
            let outcome = coordinator.start_services().await;
            println!("{}", describe_outcome("start", &outcome));
        }
        ConsoleCommand::Stop => {
            let outcome = coordinator.stop_services().await;
            println!("{}", describe_outcome("stop", &outcome));
        }
        ConsoleCommand::Fake => {
            println!("{}", describe_fake(coordinator.toggle_fake_bpm().await));
        }
        ConsoleCommand::Status => {
            println!("{}", describe(&coordinator.app_state().borrow()));
            if let Some(endpoint) = coordinator.web_server().endpoint().await {
                println!("Posting to {}", endpoint);
            }
        }
        ConsoleCommand::Hardware => {
            println!("Hardware: {:?}", coordinator.get_hardware_state().await);
            let missing = coordinator.get_missing_permissions();
            if missing.is_empty() {
                println!("Permissions: granted");
            } else {
                let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
                println!("Permissions missing: {}", names.join(", "));
            }
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => return false,
    }
    true
}

async fn shutdown(coordinator: &ServiceCoordinator) {
    coordinator.stop_fake_bpm().await;
    if coordinator.stop_services().await != CommandOutcome::Accepted {
        return;
    }

    let mut services = coordinator.services_state();
    let stopped = tokio::time::timeout(
        SHUTDOWN_TIMEOUT,
        services.wait_for(|s| *s == ServicesState::Stopped),
    )
    .await
    .is_ok_and(|r| r.is_ok());
    if !stopped {
        warn!("Services did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }
}

pub async fn run(coordinator: &ServiceCoordinator) -> anyhow::Result<()> {
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut app_state = coordinator.app_state();
    println!("{}", describe(&app_state.borrow_and_update()));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ConsoleCommand>() {
                    Ok(command) => {
                        if !execute(coordinator, command).await {
                            break;
                        }
                    }
                    Err(e) => println!("{} (try 'help')", e),
                }
            }
            changed = app_state.changed() => {
                if changed.is_err() {
                    warn!("App state publisher is gone");
                    break;
                }
                let snapshot = app_state.borrow_and_update().clone();
                println!("{}", describe(&snapshot));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
        }
    }

    shutdown(coordinator).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::BridgeError;

    #[test]
    fn test_parse_commands() {
        assert_eq!("start".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Start));
        assert_eq!(" STOP \n".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Stop));
        assert_eq!("hw".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Hardware));
        assert_eq!("q".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Quit));
        assert!("launch".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn test_describe() {
        let idle = AppState::default();
        assert_eq!(describe(&idle), "[Stopped] BPM: -- | client: none");

        let live = AppState {
            bpm: Some(72),
            is_client_connected: true,
            services_state: ServicesState::Started,
        };
        assert_eq!(describe(&live), "[Started] BPM: 72 | client: connected");

        let failed = AppState {
            services_state: ServicesState::Error(BridgeError::HardwareDisabled),
            ..AppState::default()
        };
        assert!(describe(&failed).starts_with("[Error"));
    }
}
