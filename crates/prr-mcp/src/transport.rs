//! Newline-delimited JSON-RPC transport over stdio.
//!
//! stdout carries protocol messages only; all logging goes to stderr.

use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// A message received from the client.
#[derive(Debug)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Line-oriented JSON-RPC reader/writer.
pub struct StdioTransport {
    reader: Box<dyn BufRead + Send>,
    writer: Box<dyn Write + Send>,
}

impl StdioTransport {
    pub fn stdio() -> Self {
        Self {
            reader: Box::new(io::BufReader::new(io::stdin())),
            writer: Box::new(io::stdout()),
        }
    }

    /// Transport over arbitrary streams, used by tests.
    pub fn new(reader: Box<dyn BufRead + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self { reader, writer }
    }

    /// Read one message. `Ok(None)` signals EOF; blank lines are skipped.
    pub fn read_message(&mut self) -> io::Result<Option<IncomingMessage>> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!(message = line, "received");

            // Requests carry an id; anything without one is a notification.
            if let Ok(request) = serde_json::from_str::<JsonRpcRequest>(line) {
                return Ok(Some(IncomingMessage::Request(request)));
            }
            if let Ok(notification) = serde_json::from_str::<JsonRpcNotification>(line) {
                return Ok(Some(IncomingMessage::Notification(notification)));
            }

            warn!(message = line, "unparseable JSON-RPC message");
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid JSON-RPC message: {line}"),
            ));
        }
    }

    /// Write one response followed by a newline and flush.
    pub fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        debug!(message = %json, "sending");
        writeln!(self.writer, "{json}")?;
        self.writer.flush()
    }
}
