//! Newline-delimited JSON framing.
//!
//! Inbound bytes are buffered until a `\n` arrives; every complete line is
//! parsed on its own. Lines that do not parse are dropped instead of being
//! reported: the same pipe may carry diagnostic text, and a peer must not be
//! able to break the session by printing a stray line.

use std::collections::VecDeque;
use std::io;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const READ_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Accumulates raw chunks and cuts them into parsed lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every message completed by it, in order.
    pub fn feed<T: DeserializeOwned>(&mut self, chunk: impl AsRef<[u8]>) -> Vec<T> {
        self.buffer.extend_from_slice(chunk.as_ref());

        let mut messages = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(message) = parse_line(&line[..newline]) {
                messages.push(message);
            }
        }
        messages
    }

    /// Parses whatever is left once the stream has ended without a final `\n`.
    pub fn finish<T: DeserializeOwned>(&mut self) -> Option<T> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line<T: DeserializeOwned>(line: &[u8]) -> Option<T> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    match serde_json::from_slice(line) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!(
                error = %err,
                line = %String::from_utf8_lossy(line),
                "dropping non-protocol line"
            );
            None
        }
    }
}

/// Serializes `message` as compact JSON followed by exactly one `\n`.
///
/// serde_json escapes control characters inside strings, so the output never
/// contains a raw newline before the terminator.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Reads messages of type `T` from a byte stream.
pub struct FramedReader<R, T> {
    reader: R,
    framer: LineFramer,
    ready: VecDeque<T>,
    chunk: Box<[u8]>,
}

impl<R, T> FramedReader<R, T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            framer: LineFramer::new(),
            ready: VecDeque::new(),
            chunk: vec![0; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Next complete message, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> io::Result<Option<T>> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Ok(Some(message));
            }

            let read = self.reader.read(&mut self.chunk).await?;
            if read == 0 {
                return Ok(self.framer.finish());
            }

            let messages: Vec<T> = self.framer.feed(&self.chunk[..read]);
            self.ready.extend(messages);
        }
    }
}

/// Writes one message per line, flushing after each.
pub struct FramedWriter<W> {
    writer: W,
}

impl<W> FramedWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), TransportError> {
        let line = encode_line(message)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
