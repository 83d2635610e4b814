//! Filesystem replay adapter implementing the `BlockSource` port.
//!
//! Replays captured stream messages from a directory holding one JSON
//! document per block, named `<height>.json`. Files are delivered in
//! height order; in follow mode the directory is re-scanned after the
//! backlog drains, which turns a capture directory being appended to
//! into a live stream.
//!
//! This is the development and backtest harness for the engine: point
//! it at a capture of real stream traffic and the indexer reproduces
//! the exact ledger, block by block.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use meridian_core::error::{ChainError, ChainResult};
use meridian_core::models::BlockMessage;
use meridian_core::ports::{BlockSource, BlockStream};

/// Configuration for the replay source.
#[derive(Debug, Clone)]
pub struct ReplaySourceConfig {
    /// Directory holding `<height>.json` message files.
    pub data_dir: PathBuf,
    /// Keep polling for new files once the backlog is drained.
    pub follow: bool,
    /// Poll interval in follow mode.
    pub poll_interval: Duration,
}

impl Default for ReplaySourceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            follow: false,
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Replay adapter implementing the BlockSource port.
pub struct ReplayBlockSource {
    config: ReplaySourceConfig,
}

impl ReplayBlockSource {
    pub fn new(config: ReplaySourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BlockSource for ReplayBlockSource {
    #[instrument(skip(self), fields(dir = %self.config.data_dir.display()))]
    async fn subscribe(&self, start_after: Option<u64>) -> ChainResult<BlockStream> {
        let backlog = scan_heights(&self.config.data_dir, start_after).await?;
        debug!(backlog = backlog.len(), "Replay subscription established");

        let state = ReplayState {
            data_dir: self.config.data_dir.clone(),
            follow: self.config.follow,
            poll_interval: self.config.poll_interval,
            pending: backlog.into(),
            last_seen: start_after,
        };

        Ok(Box::pin(futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(height) = state.pending.pop_front() {
                    state.last_seen = Some(height);
                    let item = read_message(&state.data_dir, height).await;
                    return Some((item, state));
                }

                if !state.follow {
                    return None;
                }

                tokio::time::sleep(state.poll_interval).await;
                match scan_heights(&state.data_dir, state.last_seen).await {
                    Ok(heights) => state.pending = heights.into(),
                    Err(e) => return Some((Err(e), state)),
                }
            }
        })))
    }
}

struct ReplayState {
    data_dir: PathBuf,
    follow: bool,
    poll_interval: Duration,
    pending: VecDeque<u64>,
    last_seen: Option<u64>,
}

/// List message heights above `after`, sorted ascending.
///
/// Files that don't look like `<height>.json` are ignored so the
/// directory can hold notes or partial downloads.
async fn scan_heights(dir: &Path, after: Option<u64>) -> ChainResult<Vec<u64>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ChainError::StreamIo(format!("{}: {}", dir.display(), e)))?;

    let mut heights = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ChainError::StreamIo(e.to_string()))?
    {
        if let Some(height) = parse_height(&entry.file_name())
            && after.is_none_or(|a| height > a)
        {
            heights.push(height);
        }
    }

    heights.sort_unstable();
    Ok(heights)
}

fn parse_height(name: &OsStr) -> Option<u64> {
    name.to_str()?.strip_suffix(".json")?.parse().ok()
}

async fn read_message(dir: &Path, height: u64) -> ChainResult<BlockMessage> {
    let path = dir.join(format!("{height}.json"));
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ChainError::StreamIo(format!("{}: {}", path.display(), e)))?;

    serde_json::from_slice(&bytes).map_err(|e| ChainError::MalformedMessage {
        height,
        message: e.to_string(),
    })
}
