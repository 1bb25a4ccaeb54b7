//! Durable crawl state: frontier, dedupe sets, and the JSON snapshot format.
//!
//! The state object groups `visited`, `queued`, the FIFO frontier, the
//! first-seen depth map, and the processed counter under one lock owner so
//! the cross-field invariants hold: a URL is in `frontier` iff it is in
//! `queued`, and `visited` and `queued` are disjoint at the moment an entry
//! is dequeued and marked visited.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

/// One frontier entry: a URL and its discovery distance from the seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

/// In-memory engine state, durable as a JSON snapshot.
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    visited: HashSet<String>,
    queued: HashSet<String>,
    frontier: VecDeque<FrontierEntry>,
    depths: HashMap<String, u32>,
    processed: u64,
    seed_url: String,
}

/// On-disk snapshot shape. `visited` and `queued` serialize as URL → true
/// objects; `queue` mirrors the frontier in order.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    visited: HashMap<String, bool>,
    #[serde(default)]
    queue: Vec<FrontierEntry>,
    #[serde(default)]
    queued: HashMap<String, bool>,
    #[serde(default)]
    url_depths: HashMap<String, u32>,
    #[serde(default)]
    processed: u64,
    #[serde(default)]
    base_url: String,
}

impl CrawlState {
    /// Fresh state with the frontier seeded at depth 0.
    #[must_use]
    pub fn seeded(seed_url: String) -> Self {
        let mut state = Self {
            seed_url: seed_url.clone(),
            ..Self::default()
        };
        state.enqueue(seed_url, 0);
        state
    }

    /// Pop the frontier head, removing it from `queued`.
    pub fn pop_front(&mut self) -> Option<FrontierEntry> {
        let entry = self.frontier.pop_front()?;
        self.queued.remove(&entry.url);
        Some(entry)
    }

    /// Push a URL unless it is already visited or queued. Records the
    /// first-seen depth. Returns whether the URL was actually enqueued.
    pub fn enqueue(&mut self, url: String, depth: u32) -> bool {
        if self.visited.contains(&url) || self.queued.contains(&url) {
            return false;
        }
        self.queued.insert(url.clone());
        self.depths.entry(url.clone()).or_insert(depth);
        self.frontier.push_back(FrontierEntry { url, depth });
        true
    }

    /// Mark a URL visited and bump the processed counter. Returns false if
    /// it was already visited (a concurrent worker won the race).
    pub fn mark_visited(&mut self, url: &str) -> bool {
        if !self.visited.insert(url.to_string()) {
            return false;
        }
        self.processed += 1;
        true
    }

    #[must_use]
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    #[must_use]
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    #[must_use]
    pub fn seed_url(&self) -> &str {
        &self.seed_url
    }

    /// Load a snapshot. `Ok(None)` when the file does not exist; an existing
    /// but unreadable or corrupt file is a hard error (the operator must
    /// remove or fix it).
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read state file {}", path.display()));
            }
        };
        let file: StateFile = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt state file {}", path.display()))?;

        // Older snapshots lack the `queued` mirror; rebuild it from the queue.
        let queued: HashSet<String> = if file.queued.is_empty() && !file.queue.is_empty() {
            file.queue.iter().map(|entry| entry.url.clone()).collect()
        } else {
            file.queued.into_keys().collect()
        };

        Ok(Some(Self {
            visited: file.visited.into_keys().collect(),
            queued,
            frontier: file.queue.into_iter().collect(),
            depths: file.url_depths,
            processed: file.processed,
            seed_url: file.base_url,
        }))
    }

    /// Serialize this state to its JSON snapshot form.
    pub fn to_json(&self) -> Result<String> {
        let file = StateFile {
            visited: self.visited.iter().map(|u| (u.clone(), true)).collect(),
            queue: self.frontier.iter().cloned().collect(),
            queued: self.queued.iter().map(|u| (u.clone(), true)).collect(),
            url_depths: self.depths.clone(),
            processed: self.processed,
            base_url: self.seed_url.clone(),
        };
        serde_json::to_string_pretty(&file).context("failed to serialize crawl state")
    }

    /// Write the snapshot, creating parent directories as needed.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = self.to_json()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write state file {}", path.display()))?;
        Ok(())
    }

    /// Debug-check of the structural invariants; used by tests.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        self.frontier.len() == self.queued.len()
            && self.frontier.iter().all(|entry| self.queued.contains(&entry.url))
            && self.queued.is_disjoint(&self.visited)
    }
}
