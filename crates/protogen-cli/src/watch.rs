//! `protogen watch`
//!
//! Polls the input root for new top-level entries: directories holding a
//! `config.json` somewhere beneath them, and `.zip` archives. An entry is
//! processed once its snapshot (file count, total size, newest modification
//! time) has stayed the same for the debounce window, so half-copied
//! deliveries are left alone. Entries present at startup are treated as
//! already processed.

use anyhow::Context;
use protogen_bundle::{ArchiveStager, find_configs, is_zip};
use protogen_core::GenerationResult;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub interval: Duration,
    pub debounce: Duration,
    pub staging: PathBuf,
}

/// Snapshot of one entry used to decide whether it is still changing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint {
    files: u64,
    bytes: u64,
    newest: Option<SystemTime>,
}

impl Fingerprint {
    /// Walk `path` (a file or a directory tree) without following symbolic links
    pub fn of(path: &Path) -> io::Result<Self> {
        let mut fingerprint = Fingerprint::default();

        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let metadata = entry.metadata()?;
            fingerprint.files += 1;
            fingerprint.bytes += metadata.len();
            fingerprint.newest = fingerprint.newest.max(metadata.modified().ok());
        }

        Ok(fingerprint)
    }
}

#[derive(Debug)]
struct Observed {
    fingerprint: Fingerprint,
    stable_since: Instant,
}

/// Decides when a new entry is ready to process
#[derive(Debug)]
pub struct ArrivalTracker {
    debounce: Duration,
    seen: BTreeSet<PathBuf>,
    pending: BTreeMap<PathBuf, Observed>,
}

impl ArrivalTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            seen: BTreeSet::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Mark everything currently in `input` as already handled
    pub fn prime(&mut self, input: &Path) -> io::Result<()> {
        self.seen.extend(candidates(input)?);
        Ok(())
    }

    /// Record a snapshot; returns true exactly once, when `path` has been
    /// unchanged for the debounce window
    pub fn observe(&mut self, path: &Path, fingerprint: Fingerprint, now: Instant) -> bool {
        if self.seen.contains(path) {
            return false;
        }

        match self.pending.get_mut(path) {
            Some(observed) if observed.fingerprint == fingerprint => {
                if now.saturating_duration_since(observed.stable_since) < self.debounce {
                    return false;
                }
                self.pending.remove(path);
                self.seen.insert(path.to_path_buf());
                true
            }
            Some(observed) => {
                observed.fingerprint = fingerprint;
                observed.stable_since = now;
                false
            }
            None => {
                self.pending.insert(
                    path.to_path_buf(),
                    Observed {
                        fingerprint,
                        stable_since: now,
                    },
                );
                false
            }
        }
    }

    /// Scan `input` and return the entries that became ready, sorted
    pub fn poll(&mut self, input: &Path, now: Instant) -> io::Result<Vec<PathBuf>> {
        let present: BTreeSet<PathBuf> = candidates(input)?.into_iter().collect();

        // Forget entries that went away so a later re-delivery is processed again
        self.seen.retain(|path| present.contains(path));
        self.pending.retain(|path, _| present.contains(path));

        let mut ready = Vec::new();
        for path in present {
            if self.seen.contains(&path) {
                continue;
            }
            match Fingerprint::of(&path) {
                Ok(fingerprint) => {
                    if self.observe(&path, fingerprint, now) {
                        ready.push(path);
                    }
                }
                Err(e) => debug!(path = %path.display(), error = %e, "entry not readable yet"),
            }
        }
        Ok(ready)
    }
}

/// Top-level directories and zip archives in `input`, skipping hidden entries
fn candidates(input: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
        if !hidden && (path.is_dir() || is_zip(&path)) {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Generate for every configuration in one arrival
///
/// Output goes to `<output>/<arrival stem>/`, or a numbered sibling when one
/// arrival holds several configurations. Each configuration is generated
/// exactly once; failures are logged and not retried.
pub fn process(
    arrival: &Path,
    options: &WatchOptions,
    stager: &ArchiveStager,
) -> Vec<(PathBuf, GenerationResult)> {
    let configs = if is_zip(arrival) {
        match stager.stage(arrival) {
            Ok(staged) => staged.configs,
            Err(e) => {
                warn!(arrival = %arrival.display(), error = %e, "cannot stage archive");
                return Vec::new();
            }
        }
    } else {
        match find_configs(arrival) {
            Ok(configs) => configs,
            Err(e) => {
                warn!(arrival = %arrival.display(), error = %e, "cannot scan directory");
                return Vec::new();
            }
        }
    };

    if configs.is_empty() {
        warn!(arrival = %arrival.display(), "no config.json found, skipping");
        return Vec::new();
    }

    let stem = arrival
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "arrival".to_string());

    let mut results = Vec::with_capacity(configs.len());
    for (index, config) in configs.iter().enumerate() {
        let output = if index == 0 {
            options.output.join(&stem)
        } else {
            options.output.join(format!("{stem}-{index}"))
        };

        let result = protogen_core::generate(config, &output);
        match &result {
            GenerationResult::Success { emitted_files } => info!(
                config = %config.display(),
                output = %output.display(),
                files = emitted_files.len(),
                "generated"
            ),
            GenerationResult::Failure { phase, detail, .. } => warn!(
                config = %config.display(),
                phase = %phase,
                "generation failed: {}",
                detail
            ),
        }
        results.push((output, result));
    }
    results
}

/// Watch until `stop` receives a message or its sender is dropped
pub fn run(options: &WatchOptions, stop: &Receiver<()>) -> anyhow::Result<()> {
    fs::create_dir_all(&options.output)
        .with_context(|| format!("cannot create output root {}", options.output.display()))?;

    let stager = ArchiveStager::new(&options.staging);
    let mut tracker = ArrivalTracker::new(options.debounce);
    tracker
        .prime(&options.input)
        .with_context(|| format!("cannot read input root {}", options.input.display()))?;

    info!(
        input = %options.input.display(),
        output = %options.output.display(),
        "watching for new schemas"
    );

    loop {
        match stop.recv_timeout(options.interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!("watch stopped");
                return Ok(());
            }
        }

        let ready = match tracker.poll(&options.input, Instant::now()) {
            Ok(ready) => ready,
            Err(e) => {
                warn!(input = %options.input.display(), error = %e, "cannot scan input root");
                continue;
            }
        };

        for arrival in ready {
            info!(arrival = %arrival.display(), "processing");
            process(&arrival, options, &stager);
        }
    }
}
