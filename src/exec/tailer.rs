// src/exec/tailer.rs

//! Tailing the tee log file while the terminal process is alive.

use std::io::{self, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::exec::log_file::LogFile;
use crate::types::TextEncoding;

/// Wait between reads that found no new data.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reads lines appended to a log file.
///
/// The file is opened and positioned at its end when the tailer is created,
/// so the tailer should be created before anything writes to the file.
///
/// [`LogTailer::next_line`] yields each complete line (including its line
/// terminator). While the writer is alive and no data is available it waits
/// [`POLL_INTERVAL`] between attempts; the wait ends early on cancellation.
/// Once `is_alive` reports false the remaining contents are drained, a
/// trailing unterminated line is flushed, the log file is deleted and the
/// sequence ends.
#[derive(Debug)]
pub struct LogTailer {
    log_file: Arc<LogFile>,
    reader: BufReader<tokio::fs::File>,
    encoding: TextEncoding,
    cancel: CancellationToken,
    pending: Vec<u8>,
    draining: bool,
    done: bool,
}

impl LogTailer {
    pub fn open(
        log_file: Arc<LogFile>,
        encoding: TextEncoding,
        cancel: CancellationToken,
    ) -> io::Result<Self> {
        let mut file = std::fs::File::open(log_file.path())?;
        let offset = file.seek(SeekFrom::End(0))?;
        trace!(log_file = ?log_file.path(), offset, "opened log file for tailing");

        Ok(Self {
            log_file,
            reader: BufReader::new(tokio::fs::File::from_std(file)),
            encoding,
            cancel,
            pending: Vec::new(),
            draining: false,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.log_file.path()
    }

    /// Next line of output, or `None` once the sequence has ended.
    pub async fn next_line(&mut self, is_alive: impl Fn() -> bool) -> io::Result<Option<String>> {
        if self.done {
            return Ok(None);
        }

        loop {
            if self.cancel.is_cancelled() {
                debug!(log_file = ?self.path(), "tailing cancelled");
                return Ok(self.finish());
            }

            let read = self.reader.read_until(b'\n', &mut self.pending).await?;
            if read > 0 && self.pending.ends_with(b"\n") {
                return Ok(Some(self.take_pending()));
            }

            if self.draining {
                // Reached end of file after the writer exited.
                if self.pending.is_empty() {
                    return Ok(self.finish());
                }
                return Ok(Some(self.take_pending()));
            }

            if !is_alive() {
                debug!(log_file = ?self.path(), "writer exited; draining remaining output");
                self.draining = true;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }

    fn take_pending(&mut self) -> String {
        let line = self.encoding.decode(&self.pending);
        self.pending.clear();
        line
    }

    fn finish(&mut self) -> Option<String> {
        self.done = true;
        self.log_file.remove();
        None
    }
}
