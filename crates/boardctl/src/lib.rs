//! # boardctl
//!
//! Host-side control of the RasPi extension board over its serial console.
//!
//! The board speaks the prompt-terminated text protocol implemented in
//! [`boardctl_protocol`]. This crate adds everything needed to actually run
//! commands against it:
//!
//! - [`port`]: the byte pipe to the board and the serial implementation
//! - [`lock`]: host-wide exclusive access to the board
//! - [`executor`]: one locked, time-bounded command exchange
//! - [`board`]: environment reads and infrared transmission
//! - [`cli`]: the `boardctl` command line and its JSON output
//!
//! ## Example
//!
//! ```no_run
//! use boardctl::{Board, BoardConfig};
//!
//! let board = Board::from_config(&BoardConfig::default());
//! let reading = board.get_env()?;
//! println!("{:.1}C {:.1}%", reading.temperature, reading.humidity);
//! # Ok::<(), boardctl::BoardError>(())
//! ```

pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod lock;
pub mod port;
pub mod scripted;

pub use board::Board;
pub use config::BoardConfig;
pub use error::{BoardError, Result};
pub use executor::CommandExecutor;
pub use lock::{FileLock, InProcessLock, LockGuard, ResourceLock};
pub use port::{Port, PortFactory, SerialPortFactory};

pub use boardctl_protocol::{EnvReading, IrSignal};
