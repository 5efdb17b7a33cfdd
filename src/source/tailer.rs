use crate::config::types::{ReadStart, SourceConfig};
use crate::pipeline::channel::Sender;
use crate::pipeline::stats::PipelineStats;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TailerError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read error at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
}

/// One line of the source log, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine(Vec<u8>);

impl RawLine {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for RawLine {
    fn from(line: &str) -> Self {
        Self(line.as_bytes().to_vec())
    }
}

/// Follows a single append-only file and yields each completed line.
///
/// End of file is never terminal: the tailer sleeps for `poll_interval` and
/// reads again. A trailing fragment without `\n` is held until the rest of
/// the line arrives. Truncation and rotation are not detected.
pub struct Tailer {
    path: PathBuf,
    reader: BufReader<File>,
    poll_interval: Duration,
    offset: u64,
    pending: Vec<u8>,
}

impl Tailer {
    /// Open the file and seek according to `config.start`.
    pub async fn open(config: &SourceConfig) -> Result<Self, TailerError> {
        let open_err = |source| TailerError::Open {
            path: config.path.clone(),
            source,
        };

        let mut file = File::open(&config.path).await.map_err(open_err)?;
        let offset = match config.start {
            ReadStart::Beginning => file.seek(SeekFrom::Start(0)).await.map_err(open_err)?,
            ReadStart::End => file.seek(SeekFrom::End(0)).await.map_err(open_err)?,
        };

        info!(path = %config.path.display(), offset, "Opened source for tailing");

        Ok(Self {
            path: config.path.clone(),
            reader: BufReader::new(file),
            poll_interval: config.poll_interval,
            offset,
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset just past the last byte read, including any held fragment.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Wait for the next complete line.
    pub async fn next_line(&mut self) -> Result<RawLine, TailerError> {
        loop {
            let bytes_read = self
                .reader
                .read_until(b'\n', &mut self.pending)
                .await
                .map_err(|source| TailerError::Read {
                    offset: self.offset,
                    source,
                })?;

            if bytes_read == 0 {
                sleep(self.poll_interval).await;
                continue;
            }
            self.offset += bytes_read as u64;

            if self.pending.last() != Some(&b'\n') {
                // Partial line at end of file; keep it until the terminator shows up
                debug!(held = self.pending.len(), "Holding incomplete line");
                continue;
            }

            let mut line = std::mem::take(&mut self.pending);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(RawLine::new(line));
        }
    }

    /// Push lines onto `output` until shutdown, a read error, or the queue closing.
    pub async fn run(
        mut self,
        output: Sender<RawLine>,
        shutdown: CancellationToken,
        stats: Arc<PipelineStats>,
    ) -> Result<(), TailerError> {
        info!(path = %self.path.display(), "Tailer started");

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = self.next_line() => line?,
            };
            stats.record_line_read();

            tokio::select! {
                _ = shutdown.cancelled() => break,
                sent = output.send(line) => {
                    if sent.is_err() {
                        warn!("Raw line queue closed, tailer stopping");
                        return Ok(());
                    }
                }
            }
        }

        info!(offset = self.offset, "Tailer stopped on shutdown");
        Ok(())
    }
}
