//! Prompt-framed codec for board communication.
//!
//! The board does not frame its replies. A reply is the echoed command line,
//! any output lines, and finally the prompt, with no trailing newline. The
//! codec accumulates received bytes until they end with the prompt.

use bytes::BytesMut;

/// Prompt printed by the board after every command.
pub const PROMPT: &str = "RasPi-ExtBoard> ";

/// Line terminator for commands sent to the board.
pub const COMMAND_TERMINATOR: u8 = b'\n';

/// Initial capacity of the receive buffer.
const INITIAL_CAPACITY: usize = 256;

/// A codec for writing commands and reading prompt-terminated replies.
///
/// The receive buffer is append-only: bytes are never dropped until a
/// complete reply is taken out with [`PromptCodec::decode_frame`] or
/// [`PromptCodec::decode_response`].
#[derive(Debug, Default)]
pub struct PromptCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl PromptCodec {
    /// Create a new prompt codec.
    pub fn new() -> Self {
        PromptCodec {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Whether the buffered data ends with the prompt.
    pub fn is_complete(&self) -> bool {
        self.buffer.ends_with(PROMPT.as_bytes())
    }

    /// Take the complete raw reply, including echo and prompt.
    ///
    /// Returns `None` if the buffer does not yet end with the prompt.
    pub fn decode_frame(&mut self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }

        let frame = self.buffer.split();
        Some(String::from_utf8_lossy(&frame).into_owned())
    }

    /// Take the complete reply with the echo and prompt lines removed.
    pub fn decode_response(&mut self) -> Option<String> {
        self.decode_frame().map(|frame| Self::strip_frame(&frame))
    }

    /// Remove the echoed command (first line) and the prompt (last line).
    ///
    /// A frame with fewer than two lines has no body.
    pub fn strip_frame(frame: &str) -> String {
        let lines: Vec<&str> = frame.split('\n').collect();
        if lines.len() < 2 {
            return String::new();
        }
        lines[1..lines.len() - 1].join("\n")
    }

    /// Encode a command for transmission.
    ///
    /// Appends the newline terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(COMMAND_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}
