//! Scripted in-memory ports for tests and dry runs.
//!
//! Each [`ScriptedPortFactory::create`] call consumes the next queued
//! [`Script`], so a sequence of exchanges can be described up front. Every
//! port records what happens to it in a shared event log.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use boardctl_protocol::PROMPT;
use parking_lot::Mutex;

use crate::port::{Port, PortFactory};

/// Default time a scripted read waits before reporting "no data".
pub const DEFAULT_SCRIPTED_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Size of the chunks [`Script::reply`] splits a reply into.
const REPLY_CHUNK_SIZE: usize = 7;

/// One step of a scripted reply, served by a single read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Return these bytes.
    Data(Vec<u8>),
    /// Fail with this error kind after the read timeout.
    Error(io::ErrorKind),
}

/// How a scripted port behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// After the first write, serve these read steps, then go silent.
    Reply(Vec<ReadStep>),
    /// Accept writes but never send anything.
    Silent,
    /// Fail every write.
    FailWrite,
    /// Fail to open.
    FailOpen,
}

impl Script {
    /// Reply with `text` in small chunks, preceded by one read timeout.
    pub fn reply(text: &str) -> Self {
        let mut steps = vec![ReadStep::Error(io::ErrorKind::TimedOut)];
        steps.extend(
            text.as_bytes()
                .chunks(REPLY_CHUNK_SIZE)
                .map(|chunk| ReadStep::Data(chunk.to_vec())),
        );
        Script::Reply(steps)
    }

    /// Echo `command`, print `body` and finish with the prompt.
    pub fn respond(command: &str, body: &str) -> Self {
        if body.is_empty() {
            Self::reply(&format!("{}\n{}", command, PROMPT))
        } else {
            Self::reply(&format!("{}\n{}\n{}", command, body, PROMPT))
        }
    }
}

/// Something that happened to a scripted port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    /// Port `id` was opened.
    Open(usize),
    /// Port `id` accepted a write.
    Write(usize, Vec<u8>),
    /// Port `id` was closed.
    Close(usize),
}

#[derive(Debug, Default)]
struct FactoryState {
    scripts: VecDeque<Script>,
    events: Vec<PortEvent>,
    next_id: usize,
    open_ports: usize,
    max_open_ports: usize,
    reads_after_close: usize,
}

/// Hands out [`ScriptedPort`]s following queued scripts.
///
/// Clones share the same queue and event log.
#[derive(Debug, Clone)]
pub struct ScriptedPortFactory {
    state: Arc<Mutex<FactoryState>>,
    read_timeout: Duration,
}

impl Default for ScriptedPortFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPortFactory {
    /// Create a factory with no scripts queued.
    pub fn new() -> Self {
        ScriptedPortFactory {
            state: Arc::new(Mutex::new(FactoryState::default())),
            read_timeout: DEFAULT_SCRIPTED_READ_TIMEOUT,
        }
    }

    /// Set how long an idle read blocks.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Queue a script for the next opened port.
    pub fn push(&self, script: Script) -> &Self {
        self.state.lock().scripts.push_back(script);
        self
    }

    /// All events so far, in order.
    pub fn events(&self) -> Vec<PortEvent> {
        self.state.lock().events.clone()
    }

    /// All writes so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                PortEvent::Write(_, data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of ports opened so far.
    pub fn opens(&self) -> usize {
        self.count(|event| matches!(event, PortEvent::Open(_)))
    }

    /// Number of ports closed so far.
    pub fn closes(&self) -> usize {
        self.count(|event| matches!(event, PortEvent::Close(_)))
    }

    /// Number of ports currently open.
    pub fn open_ports(&self) -> usize {
        self.state.lock().open_ports
    }

    /// Largest number of ports that were open at the same time.
    pub fn max_open_ports(&self) -> usize {
        self.state.lock().max_open_ports
    }

    /// Reads attempted on ports that were already closed.
    pub fn reads_after_close(&self) -> usize {
        self.state.lock().reads_after_close
    }

    /// Scripts not yet consumed.
    pub fn remaining_scripts(&self) -> usize {
        self.state.lock().scripts.len()
    }

    fn count(&self, pred: impl Fn(&PortEvent) -> bool) -> usize {
        self.state.lock().events.iter().filter(|event| pred(event)).count()
    }
}

impl PortFactory for ScriptedPortFactory {
    fn create(&self) -> io::Result<Box<dyn Port>> {
        let mut state = self.state.lock();
        let script = state.scripts.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no scripted port available")
        })?;
        if script == Script::FailOpen {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "scripted open failure",
            ));
        }

        let id = state.next_id;
        state.next_id += 1;
        state.open_ports += 1;
        state.max_open_ports = state.max_open_ports.max(state.open_ports);
        state.events.push(PortEvent::Open(id));

        let pending = match &script {
            Script::Reply(steps) => steps.iter().cloned().collect(),
            _ => VecDeque::new(),
        };

        Ok(Box::new(ScriptedPort {
            id,
            script,
            pending,
            written: false,
            closed: false,
            read_timeout: self.read_timeout,
            factory: Arc::clone(&self.state),
        }))
    }

    fn device(&self) -> String {
        "scripted".to_string()
    }
}

/// A port produced by [`ScriptedPortFactory`].
pub struct ScriptedPort {
    id: usize,
    script: Script,
    pending: VecDeque<ReadStep>,
    written: bool,
    closed: bool,
    read_timeout: Duration,
    factory: Arc<Mutex<FactoryState>>,
}

impl ScriptedPort {
    fn idle(&self) -> io::Result<usize> {
        thread::sleep(self.read_timeout);
        Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
    }
}

impl Port for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            self.factory.lock().reads_after_close += 1;
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port is closed"));
        }
        if !self.written {
            return self.idle();
        }

        match self.pending.pop_front() {
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.pending.push_front(ReadStep::Data(data.split_off(n)));
                }
                Ok(n)
            }
            Some(ReadStep::Error(kind)) => {
                thread::sleep(self.read_timeout);
                Err(io::Error::new(kind, "scripted read error"))
            }
            None => self.idle(),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port is closed"));
        }
        if self.script == Script::FailWrite {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted write failure"));
        }

        self.written = true;
        self.factory
            .lock()
            .events
            .push(PortEvent::Write(self.id, data.to_vec()));
        Ok(data.len())
    }

    fn close(&mut self) -> io::Result<()> {
        if !self.closed {
            self.closed = true;
            let mut state = self.factory.lock();
            state.open_ports -= 1;
            state.events.push(PortEvent::Close(self.id));
        }
        Ok(())
    }
}

impl Drop for ScriptedPort {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
