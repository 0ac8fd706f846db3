//! Command-line front end.
//!
//! Every invocation prints exactly one JSON line on stdout:
//! `{"result":"ok",...}` on success or `{"result":"ng","message":...}` on
//! failure. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use boardctl_protocol::{EnvReading, IrSignal};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use crate::board::Board;
use crate::config::BoardConfig;
use crate::error::{BoardError, Result};

/// Exit status for any failure.
pub const FAILURE_EXIT_CODE: u8 = 255;

/// Control the RasPi extension board.
#[derive(Debug, Parser)]
#[command(name = "boardctl", version, about)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serial device, overriding the configuration.
    #[arg(long, value_name = "PATH")]
    pub device: Option<String>,

    /// Log more to stderr (-v info, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

/// Board operations.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// Read temperature, humidity and brightness.
    Env,

    /// Send an infrared pattern.
    Cmd {
        /// Transmission interval.
        interval: String,
        /// Signal pattern.
        pattern: String,
    },
}

/// A validated request, ready to run against the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Read the environment sensors.
    Env,
    /// Emit an infrared signal.
    SendIr(IrSignal),
}

impl Request {
    /// Validate command-line input. Touches neither the lock nor the port.
    pub fn from_command(command: Option<&CliCommand>) -> Result<Self> {
        match command {
            Some(CliCommand::Env) => Ok(Request::Env),
            Some(CliCommand::Cmd { interval, pattern }) => IrSignal::parse(interval, pattern)
                .map(Request::SendIr)
                .map_err(BoardError::argument),
            None => Err(BoardError::Argument("command required".to_string())),
        }
    }
}

/// The JSON line printed on stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    result: &'static str,
    #[serde(flatten)]
    reading: Option<EnvReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl Envelope {
    /// Success without data.
    pub fn ok() -> Self {
        Envelope {
            result: "ok",
            reading: None,
            message: None,
        }
    }

    /// Success carrying an environment reading.
    pub fn env(reading: EnvReading) -> Self {
        Envelope {
            result: "ok",
            reading: Some(reading),
            message: None,
        }
    }

    /// Failure with a human-readable message.
    pub fn ng(message: impl Into<String>) -> Self {
        Envelope {
            result: "ng",
            reading: None,
            message: Some(message.into()),
        }
    }

    /// Whether this envelope reports success.
    pub fn is_ok(&self) -> bool {
        self.result == "ok"
    }

    /// The reading, if any.
    pub fn reading(&self) -> Option<&EnvReading> {
        self.reading.as_ref()
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Render as a single JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"result":"ng","message":"failed to encode result: {}"}}"#, e)
        })
    }

    /// Process exit status for this envelope.
    pub fn exit_code(&self) -> ExitCode {
        if self.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

impl From<&BoardError> for Envelope {
    fn from(err: &BoardError) -> Self {
        Envelope::ng(err.to_string())
    }
}

/// Load the configuration selected by the command line.
pub fn load_config(cli: &Cli) -> Result<BoardConfig> {
    let mut config = match &cli.config {
        Some(path) => BoardConfig::load(path)?,
        None => BoardConfig::default(),
    };
    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Run a validated request.
pub fn dispatch(board: &Board, request: &Request) -> Result<Envelope> {
    match request {
        Request::Env => board.get_env().map(Envelope::env),
        Request::SendIr(signal) => board.send_ir(signal).map(|()| Envelope::ok()),
    }
}

/// Run the command line against the real board.
pub fn run(cli: &Cli) -> Envelope {
    let outcome = Request::from_command(cli.command.as_ref()).and_then(|request| {
        let config = load_config(cli)?;
        debug!("Using {:?}", config);
        dispatch(&Board::from_config(&config), &request)
    });
    outcome.unwrap_or_else(|e| Envelope::from(&e))
}

/// Run the command line against the given board.
pub fn run_with(cli: &Cli, board: &Board) -> Envelope {
    Request::from_command(cli.command.as_ref())
        .and_then(|request| dispatch(board, &request))
        .unwrap_or_else(|e| Envelope::from(&e))
}

/// Handle a command line clap rejected.
///
/// Help and version requests are printed as usual; anything else becomes a
/// failure envelope on stdout.
pub fn report_parse_error(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        _ => {
            let text = err.to_string();
            let message = text
                .lines()
                .next()
                .unwrap_or_default()
                .trim_start_matches("error: ")
                .to_string();
            let envelope = Envelope::ng(message);
            println!("{}", envelope.to_json());
            envelope.exit_code()
        }
    }
}
