//! Directory informer - watches a directory of PathSet objects
//!
//! A background thread scans `*.toml` files every poll interval and compares
//! blake3 fingerprints with the previous scan:
//! - new or changed objects are sent as updates
//! - removed files send a delete for the last known object
//! - every resync interval all known objects are sent again
//! - scan failures go to the error channel
//!
//! Files that do not parse as a PathSet are logged and skipped.

use anyhow::{Context, Result, bail};
use framework::{Informer, Shutdown, WatchChannels, WatchSenders};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::crd::CRD_SUFFIX;
use crate::object::PathSet;

/// One object file as seen by a scan
#[derive(Debug, Clone)]
pub struct Scanned {
    pub fingerprint: String,
    /// `None` when the file is not a valid PathSet
    pub object: Option<PathSet>,
}

/// Read and fingerprint every object file directly under `dir`
pub fn scan(dir: &Path) -> Result<BTreeMap<PathBuf, Scanned>> {
    let mut scanned = BTreeMap::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to scan objects dir: {}", dir.display()))?;
        let path = entry.path();
        if !is_object_file(path) || !entry.file_type().is_file() {
            continue;
        }

        let content =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let fingerprint = blake3::hash(&content).to_hex().to_string();

        let object = match PathSet::from_toml(&String::from_utf8_lossy(&content)) {
            Ok(mut object) => {
                object.metadata.version = Some(fingerprint[..16].to_string());
                Some(object)
            }
            Err(e) => {
                log::debug!("Skipping {}: {e:#}", path.display());
                None
            }
        };

        scanned.insert(
            path.to_path_buf(),
            Scanned {
                fingerprint,
                object,
            },
        );
    }

    Ok(scanned)
}

fn is_object_file(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    name.ends_with(".toml") && !name.ends_with(CRD_SUFFIX) && !name.starts_with('.')
}

/// Event derived from comparing two scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Update(PathSet),
    Delete(PathSet),
}

/// Remembers the previous scan and turns new scans into events
#[derive(Debug)]
pub struct Tracker {
    known: BTreeMap<PathBuf, Scanned>,
    resync_interval: Option<Duration>,
    last_resync: Option<Instant>,
}

impl Tracker {
    pub fn new(resync_interval: Option<Duration>) -> Self {
        Self {
            known: BTreeMap::new(),
            resync_interval,
            last_resync: None,
        }
    }

    pub fn observe(&mut self, scanned: BTreeMap<PathBuf, Scanned>, now: Instant) -> Vec<Event> {
        let mut events = Vec::new();

        for (path, previous) in &self.known {
            if !scanned.contains_key(path) {
                if let Some(object) = &previous.object {
                    events.push(Event::Delete(object.clone()));
                }
            }
        }

        let resync = match (self.resync_interval, self.last_resync) {
            (Some(interval), Some(last)) => now.duration_since(last) >= interval,
            (_, None) => true,
            (None, Some(_)) => false,
        };

        for (path, current) in &scanned {
            let changed = self
                .known
                .get(path)
                .is_none_or(|previous| previous.fingerprint != current.fingerprint);

            match &current.object {
                Some(object) if changed || resync => events.push(Event::Update(object.clone())),
                None if changed => log::warn!("Ignoring invalid object file {}", path.display()),
                _ => {}
            }
        }

        if resync {
            self.last_resync = Some(now);
        }
        self.known = scanned;
        events
    }
}

pub struct DirectoryInformer {
    dir: PathBuf,
    poll_interval: Duration,
    resync_interval: Option<Duration>,
}

impl DirectoryInformer {
    pub fn new(dir: &Path, poll_interval: Duration, resync_interval: Option<Duration>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            poll_interval,
            resync_interval,
        }
    }
}

impl Informer<PathSet> for DirectoryInformer {
    fn watch(&self, shutdown: &Shutdown) -> Result<WatchChannels<PathSet>> {
        if !self.dir.is_dir() {
            bail!("Objects directory does not exist: {}", self.dir.display());
        }

        let (senders, channels) = framework::channels();
        let dir = self.dir.clone();
        let poll_interval = self.poll_interval;
        let tracker = Tracker::new(self.resync_interval);
        let shutdown = shutdown.clone();

        thread::Builder::new()
            .name("opkit-informer".to_string())
            .spawn(move || watch_loop(&dir, poll_interval, tracker, &senders, &shutdown))
            .context("Failed to spawn informer thread")?;

        log::info!("Watching {} for PathSet objects", self.dir.display());
        Ok(channels)
    }
}

fn watch_loop(
    dir: &Path,
    poll_interval: Duration,
    mut tracker: Tracker,
    senders: &WatchSenders<PathSet>,
    shutdown: &Shutdown,
) {
    loop {
        match scan(dir) {
            Ok(scanned) => {
                for event in tracker.observe(scanned, Instant::now()) {
                    let sent = match event {
                        Event::Update(object) => senders.updates.send(object).is_ok(),
                        Event::Delete(object) => senders.deletes.send(object).is_ok(),
                    };
                    if !sent {
                        return;
                    }
                }
            }
            Err(e) => {
                if senders.errors.send(e).is_err() {
                    return;
                }
            }
        }

        if shutdown.wait_timeout(poll_interval) {
            log::debug!("Informer for {} stopped", dir.display());
            return;
        }
    }
}
