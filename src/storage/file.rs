//! Append-only JSON-lines order store.
//!
//! Every insert appends one serialized order per line and syncs it to disk
//! before returning. Opening the store replays the file; for a uid written
//! more than once the last line wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{OrderError, Result};
use crate::models::Order;
use crate::storage::OrderStore;

#[derive(Debug)]
struct FileState {
    file: File,
    index: HashMap<String, Order>,
    /// uids in first-write order, so listings are stable across restarts
    arrival: Vec<String>,
    /// The file ends in a partial line that must be terminated before the
    /// next append
    torn_tail: bool,
}

impl FileState {
    /// Appends one encoded line and syncs it.
    ///
    /// A failed write is truncated back to the last complete line. If even the
    /// truncation fails, the tail is marked torn so the next append starts on
    /// a fresh line instead of fusing with the fragment.
    async fn append(&mut self, line: &[u8]) -> Result<()> {
        let committed = self.file.metadata().await?.len();
        let was_torn = self.torn_tail;

        let result = self.write_line(line).await;
        if result.is_err() {
            self.rollback(committed, was_torn).await;
        }
        result
    }

    async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        if self.torn_tail {
            self.file.write_all(b"\n").await?;
            self.torn_tail = false;
        }
        self.file.write_all(line).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(())
    }

    async fn rollback(&mut self, committed: u64, was_torn: bool) {
        match self.file.set_len(committed).await {
            Ok(()) => self.torn_tail = was_torn,
            Err(e) => {
                warn!("Cannot truncate failed append: {}", e);
                self.torn_tail = true;
            }
        }
    }
}

/// Durable order store kept in a single JSON-lines file.
#[derive(Debug)]
pub struct FileOrderStore {
    path: PathBuf,
    state: Mutex<Option<FileState>>,
}

impl FileOrderStore {
    /// Opens (creating if needed) the store file at `path` and loads it.
    ///
    /// Lines that fail to decode, such as a torn final write, are skipped with
    /// a warning.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut index = HashMap::new();
        let mut arrival = Vec::new();
        let mut torn_tail = false;
        match fs::read_to_string(&path).await {
            Ok(contents) => {
                torn_tail = !contents.is_empty() && !contents.ends_with('\n');
                for (line_no, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Order>(line) {
                        Ok(order) => {
                            if !index.contains_key(&order.order_uid) {
                                arrival.push(order.order_uid.clone());
                            }
                            index.insert(order.order_uid.clone(), order);
                        }
                        Err(e) => warn!(
                            "Skipping unreadable line {} in {}: {}",
                            line_no + 1,
                            path.display(),
                            e
                        ),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!(
            "Opened order store {} with {} orders",
            path.display(),
            index.len()
        );

        Ok(Self {
            path,
            state: Mutex::new(Some(FileState {
                file,
                index,
                arrival,
                torn_tail,
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn closed() -> OrderError {
    OrderError::Store("store closed".to_string())
}

#[async_trait]
impl OrderStore for FileOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut line = serde_json::to_vec(order)
            .map_err(|e| OrderError::Internal(format!("cannot encode order: {e}")))?;
        line.push(b'\n');

        let mut guard = self.state.lock().await;
        let state = guard.as_mut().ok_or_else(closed)?;

        state.append(&line).await?;

        if !state.index.contains_key(&order.order_uid) {
            state.arrival.push(order.order_uid.clone());
        }
        state.index.insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or_else(closed)?;
        Ok(state.index.get(order_uid).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or_else(closed)?;
        Ok(state
            .arrival
            .iter()
            .filter_map(|uid| state.index.get(uid).cloned())
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let guard = self.state.lock().await;
        guard.as_ref().map(|_| ()).ok_or_else(closed)
    }

    async fn close(&self) -> Result<()> {
        let state = self.state.lock().await.take();
        if let Some(mut state) = state {
            state.file.flush().await?;
            state.file.sync_all().await?;
            info!("Closed order store {}", self.path.display());
        }
        Ok(())
    }
}
