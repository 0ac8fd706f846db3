//! Commands that can be sent to the extension board.

use crate::types::IrSignal;

/// Commands understood by the extension board CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    /// Read the temperature/humidity sensor.
    TempRead,

    /// Read the brightness sensor.
    BriRead,

    /// Emit an infrared pattern.
    ///
    /// The pattern travels on its own line after the interval.
    IrSend {
        /// Transmission interval in board timing units.
        interval: u32,
        /// Encoded signal pattern.
        pattern: String,
    },
}

impl BoardCommand {
    /// Build an `ir_send` command from a signal.
    pub fn ir_send(signal: &IrSignal) -> Self {
        BoardCommand::IrSend {
            interval: signal.interval(),
            pattern: signal.pattern().to_string(),
        }
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            BoardCommand::TempRead => "temp_read".to_string(),
            BoardCommand::BriRead => "bri_read".to_string(),
            BoardCommand::IrSend { interval, pattern } => {
                format!("ir_send {}\n{}", interval, pattern)
            }
        }
    }

    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            BoardCommand::TempRead => "temp_read",
            BoardCommand::BriRead => "bri_read",
            BoardCommand::IrSend { .. } => "ir_send",
        }
    }
}
