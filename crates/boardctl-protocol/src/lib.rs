//! RasPi Extension Board Protocol
//!
//! This crate provides types and utilities for talking to the RasPi extension
//! board over its serial console. The board exposes a small line-based text
//! CLI: the host writes a command line, the board echoes it, prints its output
//! and finishes with a prompt.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → board): ASCII text terminated with `\n`
//! - **Echo**: The first line of every reply is the command as received
//! - **Prompt**: Every reply ends with the literal prompt `RasPi-ExtBoard> `
//!
//! There is no length prefix or checksum. A reply is complete when the
//! accumulated bytes end with the prompt.
//!
//! # Commands
//!
//! - `temp_read` - replies with `TMP: <int>` and `HUM: <int>` in tenths
//! - `bri_read` - replies with `BRI: <int>` in whole sensor units
//! - `ir_send <interval>\n<pattern>` - emits an infrared pattern, prompt only
//!
//! # Example
//!
//! ```rust
//! use boardctl_protocol::{parse_temp_humidity, BoardCommand, PromptCodec};
//!
//! let cmd = BoardCommand::TempRead;
//! let wire = PromptCodec::encode_command(&cmd.to_command_string());
//! assert_eq!(wire, b"temp_read\n");
//!
//! let mut codec = PromptCodec::new();
//! codec.push(b"temp_read\nTMP: 235\nHUM: 412\nRasPi-ExtBoard> ");
//! let body = codec.decode_response().unwrap();
//!
//! let (temperature, humidity) = parse_temp_humidity(&body)?;
//! assert_eq!(temperature, 23.5);
//! assert_eq!(humidity, 41.2);
//! # Ok::<(), boardctl_protocol::ProtocolError>(())
//! ```

mod codec;
mod commands;
mod error;
mod responses;
mod types;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
pub use types::*;
