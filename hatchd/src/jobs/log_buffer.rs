/* -------------------------------------------------------------------------- *\
 *                |   █████╗ ██╗   ██╗██████╗  █████╗ ███████╗ |              *
 *                |  ██╔══██╗██║   ██║██╔══██╗██╔══██╗██╔════╝ |              *
 *                |  ███████║██║   ██║██████╔╝███████║█████╗   |              *
 *                |  ██╔══██║██║   ██║██╔══██╗██╔══██║██╔══╝   |              *
 *                |  ██║  ██║╚██████╔╝██║  ██║██║  ██║███████╗ |              *
 *                |  ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝ |              *
 *                +--------------------------------------------+              *
 *                                                                            *
 *                         Distributed Systems Runtime                        *
 * -------------------------------------------------------------------------- *
 * Copyright 2022 - 2024, the aurae contributors                              *
 * SPDX-License-Identifier: Apache-2.0                                        *
\* -------------------------------------------------------------------------- */

//! Append-only byte log with a single writer and any number of independent
//! readers.
//!
//! Every reader owns a private cursor and a [CancellationToken]. A reader
//! created at any point, including after [LogBuffer::close], observes the
//! full byte sequence from offset zero and then end-of-stream. Appends wake
//! every waiting reader; each re-checks its own predicate, so cancelling one
//! reader never disturbs the others.

use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, LogBufferError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LogBufferError {
    #[error("log buffer is closed")]
    Closed,
    #[error("log reader was cancelled")]
    Cancelled,
}

/// The outcome of a single [LogReader::read] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRead {
    /// Number of bytes copied into the caller's buffer.
    pub len: usize,
    /// True when the reader has reached the tail of a closed log. No further
    /// reads will yield data.
    pub eof: bool,
}

#[derive(Debug, Default)]
struct State {
    data: Vec<u8>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    appended: Notify,
}

/// The write side of the log. Owned by exactly one job; readers hold a weak
/// view and do not keep the buffer alive.
#[derive(Debug, Default)]
pub struct LogBuffer {
    shared: Arc<Shared>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` to the log and wakes every waiting reader. There must
    /// be a single appending task; the append itself is atomic with respect
    /// to readers.
    pub fn append(&self, bytes: &[u8]) -> Result<usize> {
        {
            let mut state = self.shared.state.lock().expect("log buffer lock");
            if state.closed {
                return Err(LogBufferError::Closed);
            }
            state.data.extend_from_slice(bytes);
        }
        self.shared.appended.notify_waiters();
        Ok(bytes.len())
    }

    /// Marks the log complete. Idempotent. Readers that reach the tail return
    /// end-of-stream; further appends fail.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock().expect("log buffer lock");
            state.closed = true;
        }
        self.shared.appended.notify_waiters();
    }

    /// Creates an independent reader positioned at offset zero. Each reader
    /// is single-task; create one per consumer.
    pub fn reader(&self, cancel: CancellationToken) -> LogReader {
        LogReader { shared: Arc::downgrade(&self.shared), pos: 0, cancel }
    }
}

/// A cursor over the log. Not safe to share between tasks; the buffer itself
/// is.
#[derive(Debug)]
pub struct LogReader {
    shared: Weak<Shared>,
    pos: usize,
    cancel: CancellationToken,
}

impl LogReader {
    /// Copies available bytes into `buf`, waiting when the cursor is at the
    /// tail of a still-open log.
    ///
    /// Returns [LogBufferError::Cancelled] once the reader's token trips,
    /// even while parked waiting for data.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<LogRead> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(LogBufferError::Cancelled);
            }

            // The owner dropped the buffer (service shutdown). Everything
            // observable has been observed.
            let Some(shared) = self.shared.upgrade() else {
                return Ok(LogRead { len: 0, eof: true });
            };

            let notified = shared.appended.notified();
            tokio::pin!(notified);

            {
                let state = shared.state.lock().expect("log buffer lock");
                if self.pos < state.data.len() {
                    let n = buf.len().min(state.data.len() - self.pos);
                    buf[..n].copy_from_slice(
                        &state.data[self.pos..self.pos + n],
                    );
                    self.pos += n;
                    let eof = state.closed && self.pos == state.data.len();
                    return Ok(LogRead { len: n, eof });
                }

                if state.closed {
                    return Ok(LogRead { len: 0, eof: true });
                }

                // Register for the wakeup before releasing the lock so an
                // append between unlock and await cannot be missed.
                notified.as_mut().enable();
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.cancel.cancelled() => {
                    return Err(LogBufferError::Cancelled);
                }
            }
        }
    }

    /// Drains the log from the current cursor until end-of-stream.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let LogRead { len, eof } = self.read(&mut buf).await?;
            out.extend_from_slice(&buf[..len]);
            if eof {
                return Ok(out);
            }
        }
    }
}
