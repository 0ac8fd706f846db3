//! High-level board operations.

use boardctl_protocol::{parse_brightness, parse_temp_humidity, BoardCommand, EnvReading, IrSignal};
use tracing::{debug, info};

use crate::config::BoardConfig;
use crate::error::{BoardError, Result};
use crate::executor::CommandExecutor;

/// The RasPi extension board.
#[derive(Clone)]
pub struct Board {
    executor: CommandExecutor,
}

impl Board {
    /// Create a board that talks through `executor`.
    pub fn new(executor: CommandExecutor) -> Self {
        Board { executor }
    }

    /// Create a board for the real device described by `config`.
    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(CommandExecutor::from_config(config))
    }

    /// Read temperature, humidity and brightness.
    ///
    /// Runs `temp_read` then `bri_read`; the first failure ends the read and
    /// no partial reading is returned.
    pub fn get_env(&self) -> Result<EnvReading> {
        let temp_read = BoardCommand::TempRead;
        let body = self.run(&temp_read)?;
        let (temperature, humidity) = parse_temp_humidity(&body)
            .map_err(|e| BoardError::parse(temp_read.name(), e))?;

        let bri_read = BoardCommand::BriRead;
        let body = self.run(&bri_read)?;
        let brightness =
            parse_brightness(&body).map_err(|e| BoardError::parse(bri_read.name(), e))?;

        let reading = EnvReading {
            temperature,
            humidity,
            brightness,
        };
        info!(
            "Environment: {:.1}C {:.1}% brightness {}",
            reading.temperature, reading.humidity, reading.brightness
        );
        Ok(reading)
    }

    /// Emit an infrared signal.
    pub fn send_ir(&self, signal: &IrSignal) -> Result<()> {
        let command = BoardCommand::ir_send(signal);
        self.run(&command)?;
        info!(
            "Sent IR pattern ({} symbols, interval {})",
            signal.pattern().len(),
            signal.interval()
        );
        Ok(())
    }

    fn run(&self, command: &BoardCommand) -> Result<String> {
        debug!("Executing {}", command.name());
        self.executor.execute(&command.to_command_string())
    }
}
