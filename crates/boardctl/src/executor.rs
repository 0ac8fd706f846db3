//! Command execution against the board.
//!
//! One call to [`CommandExecutor::execute`] is one exchange:
//!
//! 1. Take the board lock.
//! 2. Open a port.
//! 3. Start the deadline and hand the port to a worker thread, which writes
//!    the command and reads until the reply ends with the prompt.
//! 4. Wait for whichever comes first: the reply, a write failure, or the
//!    deadline.
//! 5. Stop the worker, which closes the port, then release the lock.
//!
//! The lock is held for the entire exchange, so concurrent callers are
//! strictly serialized even across processes.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use boardctl_protocol::PromptCodec;
use crossbeam_channel::{after, bounded, select, Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::config::BoardConfig;
use crate::error::{BoardError, Result};
use crate::lock::{FileLock, LockGuard, ResourceLock};
use crate::port::{Port, PortFactory, SerialPortFactory};

/// Default deadline for one exchange.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes requested per port read.
pub const READ_CHUNK_SIZE: usize = 128;

/// Pause after a read that produced nothing, so a port that fails fast does
/// not spin.
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Serializes command exchanges with the board.
#[derive(Clone)]
pub struct CommandExecutor {
    lock: Arc<dyn ResourceLock>,
    ports: Arc<dyn PortFactory>,
    timeout: Duration,
}

impl CommandExecutor {
    /// Create an executor over the given lock and port factory.
    pub fn new(lock: Arc<dyn ResourceLock>, ports: Arc<dyn PortFactory>) -> Self {
        CommandExecutor {
            lock,
            ports,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Create an executor for the real board described by `config`.
    pub fn from_config(config: &BoardConfig) -> Self {
        let lock = FileLock::new(config.lock_path.clone())
            .with_wait_timeout(config.lock_wait_timeout());
        let ports = SerialPortFactory::from_config(config);
        Self::new(Arc::new(lock), Arc::new(ports)).with_timeout(config.command_timeout())
    }

    /// Set the deadline for one exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one command and return the reply body.
    ///
    /// The body is the reply without the echoed command (first line) and
    /// the prompt (last line).
    pub fn execute(&self, command: &str) -> Result<String> {
        let guard = LockGuard::acquire(self.lock.as_ref())?;

        let result = self.exchange(command);
        let released = guard.release();

        match (result, released) {
            (Ok(body), Ok(())) => Ok(body),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!("Failed to release lock after error: {}", release_err);
                Err(e)
            }
        }
    }

    /// Open a port and run the exchange. Called with the lock held.
    fn exchange(&self, command: &str) -> Result<String> {
        let port = self.ports.create().map_err(|source| BoardError::Port {
            device: self.ports.device(),
            source,
        })?;

        let started = Instant::now();
        let deadline = after(self.timeout);
        let (frame_tx, frame_rx) = bounded::<String>(1);
        let (error_tx, error_rx) = bounded::<BoardError>(1);
        let cancel = Arc::new(AtomicBool::new(false));

        let worker = ExchangeWorker {
            port,
            command: command.to_string(),
            cancel: Arc::clone(&cancel),
        };
        let handle = thread::Builder::new()
            .name("boardctl-exchange".to_string())
            .spawn(move || worker.run(frame_tx, error_tx))
            .map_err(|e| BoardError::Worker(format!("failed to spawn exchange thread: {}", e)))?;

        let outcome = select! {
            recv(frame_rx) -> msg => match msg {
                Ok(frame) => Ok(frame),
                Err(_) => Self::worker_gone(&frame_rx, &error_rx),
            },
            recv(error_rx) -> msg => match msg {
                Ok(err) => Err(err),
                Err(_) => Self::worker_gone(&frame_rx, &error_rx),
            },
            recv(deadline) -> _ => Err(BoardError::Timeout {
                command: command.to_string(),
                timeout: self.timeout,
            }),
        };

        // The worker owns the port; stopping it is what closes the port.
        cancel.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            warn!("Exchange worker for {:?} panicked", command);
        }

        match &outcome {
            Ok(frame) => debug!(
                "{:?} completed in {:.1}ms ({} bytes)",
                command,
                started.elapsed().as_secs_f64() * 1000.0,
                frame.len()
            ),
            Err(BoardError::Timeout { .. }) => {
                warn!("{:?} got no prompt within {:?}", command, self.timeout)
            }
            Err(e) => debug!("{:?} failed: {}", command, e),
        }

        outcome.map(|frame| PromptCodec::strip_frame(&frame))
    }

    /// Resolve a disconnected channel.
    ///
    /// The worker drops both senders when it ends, so one channel can report
    /// disconnection while the other still holds the worker's message.
    fn worker_gone(frame_rx: &Receiver<String>, error_rx: &Receiver<BoardError>) -> Result<String> {
        if let Ok(frame) = frame_rx.try_recv() {
            return Ok(frame);
        }
        if let Ok(err) = error_rx.try_recv() {
            return Err(err);
        }
        Err(BoardError::Worker(
            "exchange thread ended without a result".to_string(),
        ))
    }
}

/// The write/read half of one exchange, run on its own thread.
struct ExchangeWorker {
    port: Box<dyn Port>,
    command: String,
    cancel: Arc<AtomicBool>,
}

impl ExchangeWorker {
    fn run(mut self, frame_tx: Sender<String>, error_tx: Sender<BoardError>) {
        match self.write_command() {
            Ok(()) => {
                if let Some(frame) = self.read_until_prompt() {
                    // The caller may already have given up.
                    let _ = frame_tx.send(frame);
                }
            }
            Err(source) => {
                let _ = error_tx.send(BoardError::Write {
                    command: self.command.clone(),
                    source,
                });
            }
        }

        if let Err(e) = self.port.close() {
            debug!("Error closing port after {:?}: {}", self.command, e);
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn write_command(&mut self) -> io::Result<()> {
        let data = PromptCodec::encode_command(&self.command);
        trace!("Sending {:?} ({} bytes)", self.command, data.len());

        let mut written = 0;
        while written < data.len() {
            if self.cancelled() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "exchange cancelled"));
            }
            match self.port.write(&data[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "port accepted no bytes",
                    ))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read until the reply ends with the prompt. Returns `None` if cancelled.
    fn read_until_prompt(&mut self) -> Option<String> {
        let mut codec = PromptCodec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        while !self.cancelled() {
            match self.port.read(&mut chunk) {
                Ok(0) => thread::sleep(IDLE_BACKOFF),
                Ok(n) => {
                    codec.push(&chunk[..n]);
                    trace!("Received {} bytes ({} buffered)", n, codec.buffered_len());
                    if let Some(frame) = codec.decode_frame() {
                        return Some(frame);
                    }
                }
                Err(e) => {
                    // Usually the port's own read timeout: no data yet.
                    trace!("No data from port: {}", e);
                    thread::sleep(IDLE_BACKOFF);
                }
            }
        }

        debug!(
            "Stopped reading for {:?} with {} bytes buffered: {:?}",
            self.command,
            codec.buffered_len(),
            codec.buffer_as_str()
        );
        None
    }
}
