use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{builder, DirSizeCache, IndexEntry, MetadataSnapshot};
use crate::search;

/// One published generation: a snapshot plus the size memo derived from it.
#[derive(Debug)]
pub struct IndexState {
    generation: u64,
    built_at: DateTime<Utc>,
    snapshot: MetadataSnapshot,
    sizes: DirSizeCache,
}

impl IndexState {
    fn new(generation: u64, snapshot: MetadataSnapshot) -> Self {
        Self { generation, built_at: Utc::now(), snapshot, sizes: DirSizeCache::new() }
    }

    pub fn generation(&self) -> u64 { self.generation }
    pub fn built_at(&self) -> DateTime<Utc> { self.built_at }
    pub fn snapshot(&self) -> &MetadataSnapshot { &self.snapshot }

    pub fn size_of(&self, dir: &str) -> u64 {
        self.sizes.size_of(&self.snapshot, dir)
    }

    /// Directories whose size is memoized for this generation.
    pub fn cached_dirs(&self) -> usize { self.sizes.cached_dirs() }

    pub fn search(&self, query: &str) -> Vec<IndexEntry> {
        search::search(query, &self.snapshot)
    }
}

/// Handle to the currently published index. Cheap to clone; all clones share the slot.
///
/// Readers take an `Arc` of the current state and keep using it even if a newer generation is
/// published meanwhile. Publishing replaces the slot under a write lock, so any read issued
/// after `publish` returns sees the new generation or a later one.
#[derive(Debug, Clone)]
pub struct SharedIndex {
    root: Arc<PathBuf>,
    current: Arc<RwLock<Arc<IndexState>>>,
}

impl SharedIndex {
    /// Start with an empty generation-0 index; nothing is walked until a rebuild runs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
            current: Arc::new(RwLock::new(Arc::new(IndexState::new(0, MetadataSnapshot::default())))),
        }
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn current(&self) -> Arc<IndexState> { self.current.read().clone() }

    /// Swap in `snapshot` as the next generation and return its number.
    pub fn publish(&self, snapshot: MetadataSnapshot) -> u64 {
        let mut slot = self.current.write();
        let generation = slot.generation + 1;
        *slot = Arc::new(IndexState::new(generation, snapshot));
        generation
    }

    /// Walk the root on the calling thread and publish the result.
    pub fn rebuild_now(&self) -> u64 {
        let snapshot = builder::rebuild(&self.root);
        self.publish(snapshot)
    }

    /// Walk on the blocking pool so async callers are not stalled by filesystem I/O.
    pub async fn refresh(&self) -> anyhow::Result<u64> {
        let this = self.clone();
        let generation = tokio::task::spawn_blocking(move || this.rebuild_now()).await?;
        Ok(generation)
    }

    pub fn search(&self, query: &str) -> Vec<IndexEntry> { self.current().search(query) }

    pub fn size_of(&self, dir: &str) -> u64 { self.current().size_of(dir) }
}

/// Timing of the background refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    pub warmup: Duration,
    pub interval: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self { warmup: Duration::from_secs(1), interval: Duration::from_secs(10 * 60) }
    }
}

/// Spawn the periodic rebuild task. Aborting the returned handle abandons any walk in flight.
pub fn spawn_refresh_loop(index: SharedIndex, schedule: RefreshSchedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(schedule.warmup).await;
        loop {
            let started = Instant::now();
            info!(target: "index", root = %index.root().display(), "started making search index");
            match index.refresh().await {
                Ok(generation) => {
                    let files = index.current().snapshot().len();
                    info!(target: "index", generation, files, "completed search index in {:?}", started.elapsed());
                }
                Err(e) => error!(target: "index", "index refresh task failed: {}", e),
            }
            tokio::time::sleep(schedule.interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn publish_bumps_generation_and_discards_sizes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("d")).unwrap();
        fs::write(tmp.path().join("d/a.bin"), vec![0u8; 10]).unwrap();

        let index = SharedIndex::new(tmp.path());
        assert_eq!(index.current().generation(), 0);
        assert_eq!(index.size_of("d"), 0);

        assert_eq!(index.rebuild_now(), 1);
        assert_eq!(index.size_of("d"), 10);

        fs::write(tmp.path().join("d/b.bin"), vec![0u8; 5]).unwrap();
        // memo still answers for generation 1
        assert_eq!(index.size_of("d"), 10);
        assert_eq!(index.rebuild_now(), 2);
        assert_eq!(index.size_of("d"), 15);
    }

    #[test]
    fn held_state_survives_publish() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("one.txt"), b"1").unwrap();
        let index = SharedIndex::new(tmp.path());
        index.rebuild_now();
        let old = index.current();
        fs::write(tmp.path().join("two.txt"), b"22").unwrap();
        index.rebuild_now();
        assert_eq!(old.snapshot().len(), 1);
        assert_eq!(index.current().snapshot().len(), 2);
    }

    #[tokio::test]
    async fn refresh_runs_off_the_async_thread() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("x.log"), b"abc").unwrap();
        let index = SharedIndex::new(tmp.path());
        let generation = index.refresh().await.unwrap();
        assert_eq!(generation, 1);
        assert_eq!(index.search("x.log").len(), 1);
    }

    #[tokio::test]
    async fn refresh_loop_publishes_after_warmup() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("x.log"), b"abc").unwrap();
        let index = SharedIndex::new(tmp.path());
        let schedule = RefreshSchedule { warmup: Duration::from_millis(10), interval: Duration::from_secs(3600) };
        let handle = spawn_refresh_loop(index.clone(), schedule);
        for _ in 0..200 {
            if index.current().generation() > 0 { break; }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert_eq!(index.current().generation(), 1);
        assert_eq!(index.current().snapshot().len(), 1);
    }
}
