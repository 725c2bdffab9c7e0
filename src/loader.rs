//! Background preloading of the files the engine reads at bind time.
//!
//! One worker thread fetches a fixed manifest, in order, from a [`Fetcher`]
//! into a local directory. The main thread polls [`AssetLoader::status`]
//! between frames; the worker publishes progress and the final outcome
//! through the same lock, so the handoff needs no other synchronization.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

const SHADERS: [&str; 4] = [
    "COGLES2FixedPipeline",
    "COGLES2NormalMap",
    "COGLES2ParallaxMap",
    "COGLES2Renderer2D",
];

/// A remote file and the local name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub url: String,
    pub file_name: String,
}

impl AssetEntry {
    pub fn new(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: file_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    entries: Vec<AssetEntry>,
}

impl AssetManifest {
    pub fn new(entries: Vec<AssetEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AssetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AssetManifest {
    /// Fragment/vertex shader pairs, the GUI font and the mesh archive.
    fn default() -> Self {
        let mut entries = Vec::with_capacity(SHADERS.len() * 2 + 2);
        for shader in SHADERS {
            for ext in ["fsh", "vsh"] {
                let file_name = format!("{shader}.{ext}");
                entries.push(AssetEntry::new(format!("shaders/{file_name}"), file_name));
            }
        }
        entries.push(AssetEntry::new("builtInFont.bmp", "builtInFont.bmp"));
        entries.push(AssetEntry::new("sydney.zip", "sydney.zip"));
        Self { entries }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid asset url {0:?}")]
    InvalidUrl(String),
    #[error("failed to read {url}")]
    Io {
        url: String,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Whether a later attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Io { .. })
    }
}

/// Source of asset bytes (an HTTP mount, a packaged directory, ...).
///
/// Called from the loader's worker thread.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(url)
    }
}

/// Serves relative URLs from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileMount {
    root: PathBuf,
}

impl FileMount {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, FetchError> {
        let relative = Path::new(url);
        let contained = !url.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl Fetcher for FileMount {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(url)?;
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(url.to_string()),
            _ => FetchError::Io {
                url: url.to_string(),
                source,
            },
        })
    }
}

/// Bounded retry for transient fetch failures, with a linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per file, including the first. Never below one.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Pause before attempt `attempt + 1`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to create asset directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid local file name {0:?}")]
    InvalidFileName(String),
    #[error("fetching {file} failed after {attempts} attempt(s)")]
    Fetch {
        file: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error("unable to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("asset loader thread stopped unexpectedly")]
    WorkerStopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    pub file_name: String,
    pub bytes: usize,
    pub attempts: u32,
}

/// Per-file outcome of a completed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub dir: PathBuf,
    pub records: Vec<FetchRecord>,
}

impl LoadReport {
    pub fn total_bytes(&self) -> usize {
        self.records.iter().map(|r| r.bytes).sum()
    }

    pub fn retried(&self) -> usize {
        self.records.iter().filter(|r| r.attempts > 1).count()
    }
}

#[derive(Debug, Clone)]
pub enum LoadStatus {
    Pending { completed: usize, total: usize },
    Complete(LoadReport),
    Failed(Arc<LoadError>),
}

impl LoadStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, LoadStatus::Pending { .. })
    }
}

/// Handle to the single worker thread running the preload.
#[derive(Debug)]
pub struct AssetLoader {
    status: Arc<Mutex<LoadStatus>>,
    handle: Option<JoinHandle<()>>,
}

impl AssetLoader {
    pub fn spawn(
        manifest: AssetManifest,
        fetcher: Arc<dyn Fetcher>,
        dest_dir: PathBuf,
        policy: RetryPolicy,
    ) -> Result<Self> {
        for entry in manifest.entries() {
            local_path(&dest_dir, &entry.file_name)?;
        }
        let status = Arc::new(Mutex::new(LoadStatus::Pending {
            completed: 0,
            total: manifest.len(),
        }));
        let worker_status = Arc::clone(&status);
        info!(
            "loading {} asset(s) into {}",
            manifest.len(),
            dest_dir.display()
        );
        let handle = thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || {
                let outcome = load_all(&manifest, fetcher.as_ref(), &dest_dir, policy, &worker_status);
                *worker_status.lock() = match outcome {
                    Ok(report) => {
                        info!(
                            "loaded {} asset(s), {} bytes",
                            report.records.len(),
                            report.total_bytes()
                        );
                        LoadStatus::Complete(report)
                    }
                    Err(err) => {
                        error!("asset loading failed: {}", error_chain(&err));
                        LoadStatus::Failed(Arc::new(err))
                    }
                };
            })
            .context("failed to spawn asset loader thread")?;

        Ok(Self {
            status,
            handle: Some(handle),
        })
    }

    /// Current progress or outcome. A worker that exited without reporting
    /// is surfaced as [`LoadError::WorkerStopped`].
    pub fn status(&self) -> LoadStatus {
        let mut status = self.status.lock();
        let exited = self.handle.as_ref().map_or(true, JoinHandle::is_finished);
        if exited && !status.is_finished() {
            *status = LoadStatus::Failed(Arc::new(LoadError::WorkerStopped));
        }
        status.clone()
    }

    /// Blocks until the worker is done and returns the final status.
    pub fn join(mut self) -> LoadStatus {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("asset loader thread panicked");
            }
        }
        let mut status = self.status.lock();
        if !status.is_finished() {
            *status = LoadStatus::Failed(Arc::new(LoadError::WorkerStopped));
        }
        status.clone()
    }
}

/// `error: cause: cause` rendering of an error and its sources.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn load_all(
    manifest: &AssetManifest,
    fetcher: &dyn Fetcher,
    dest_dir: &Path,
    policy: RetryPolicy,
    status: &Mutex<LoadStatus>,
) -> Result<LoadReport, LoadError> {
    fs::create_dir_all(dest_dir).map_err(|source| LoadError::CreateDir {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let total = manifest.len();
    let mut records = Vec::with_capacity(total);
    for (index, entry) in manifest.entries().iter().enumerate() {
        let target = local_path(dest_dir, &entry.file_name)?;
        let (data, attempts) = fetch_with_retry(fetcher, &entry.url, policy).map_err(
            |(source, attempts)| LoadError::Fetch {
                file: entry.file_name.clone(),
                attempts,
                source,
            },
        )?;
        write_atomically(&target, &data)?;
        debug!(
            "fetched {} -> {} ({} bytes)",
            entry.url,
            target.display(),
            data.len()
        );
        records.push(FetchRecord {
            file_name: entry.file_name.clone(),
            bytes: data.len(),
            attempts,
        });
        *status.lock() = LoadStatus::Pending {
            completed: index + 1,
            total,
        };
    }

    Ok(LoadReport {
        dir: dest_dir.to_path_buf(),
        records,
    })
}

fn local_path(dest_dir: &Path, file_name: &str) -> Result<PathBuf, LoadError> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dest_dir.join(file_name)),
        _ => Err(LoadError::InvalidFileName(file_name.to_string())),
    }
}

fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: RetryPolicy,
) -> Result<(Vec<u8>, u32), (FetchError, u32)> {
    let mut attempt = 1;
    loop {
        match fetcher.fetch(url) {
            Ok(data) => return Ok((data, attempt)),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "fetch of {url} failed (attempt {attempt}/{}): {err}; retrying in {delay:?}",
                    policy.max_attempts
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err((err, attempt)),
        }
    }
}

/// Writes through a sibling `.part` file so `path` only ever holds complete
/// contents.
fn write_atomically(path: &Path, data: &[u8]) -> Result<(), LoadError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result = fs::write(&partial, data).and_then(|()| fs::rename(&partial, path));
    result.map_err(|source| {
        let _ = fs::remove_file(&partial);
        LoadError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;
    use tempfile::tempdir;

    static SMALL_MANIFEST: Lazy<AssetManifest> = Lazy::new(|| {
        AssetManifest::new(vec![
            AssetEntry::new("shaders/a.vsh", "a.vsh"),
            AssetEntry::new("model.zip", "model.zip"),
        ])
    });

    fn populate(root: &Path, manifest: &AssetManifest) {
        for entry in manifest.entries() {
            let path = root.join(&entry.url);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, entry.file_name.as_bytes()).unwrap();
        }
    }

    /// Fails with a transient error for the first `failures` calls.
    struct FlakyFetcher {
        failures: u32,
        calls: AtomicU32,
        error: fn(&str) -> FetchError,
    }

    impl Fetcher for FlakyFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)(url))
            } else {
                Ok(url.as_bytes().to_vec())
            }
        }
    }

    fn io_error(url: &str) -> FetchError {
        FetchError::Io {
            url: url.to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        }
    }

    fn not_found(url: &str) -> FetchError {
        FetchError::NotFound(url.to_string())
    }

    #[test]
    fn default_manifest_lists_shaders_font_and_archive() {
        let manifest = AssetManifest::default();
        assert_eq!(manifest.len(), 10);
        let shaders = manifest
            .entries()
            .iter()
            .filter(|e| e.url.starts_with("shaders/COGLES2"))
            .count();
        assert_eq!(shaders, 8);
        assert_eq!(
            manifest.entries()[1],
            AssetEntry::new("shaders/COGLES2FixedPipeline.vsh", "COGLES2FixedPipeline.vsh")
        );
        assert_eq!(manifest.entries()[9].file_name, "sydney.zip");
    }

    #[test]
    fn file_mount_rejects_escaping_urls() {
        let mount = FileMount::new("/srv/assets");
        for url in ["../secret", "/etc/passwd", "shaders/../../x", ""] {
            assert!(
                matches!(mount.fetch(url), Err(FetchError::InvalidUrl(_))),
                "{url} accepted"
            );
        }
    }

    #[test]
    fn loads_every_entry_into_destination() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        populate(source.path(), &SMALL_MANIFEST);

        let loader = AssetLoader::spawn(
            SMALL_MANIFEST.clone(),
            Arc::new(FileMount::new(source.path())),
            dest.path().join("data"),
            RetryPolicy::no_retry(),
        )
        .unwrap();

        let LoadStatus::Complete(report) = loader.join() else {
            panic!("load did not complete");
        };
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.retried(), 0);
        assert_eq!(
            fs::read(dest.path().join("data/a.vsh")).unwrap(),
            b"a.vsh".to_vec()
        );
        assert_eq!(report.total_bytes(), "a.vsh".len() + "model.zip".len());
    }

    #[test]
    fn missing_asset_is_terminal_and_leaves_no_partial_file() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::create_dir_all(source.path().join("shaders")).unwrap();
        fs::write(source.path().join("shaders/a.vsh"), b"ok").unwrap();

        let loader = AssetLoader::spawn(
            SMALL_MANIFEST.clone(),
            Arc::new(FileMount::new(source.path())),
            dest.path().to_path_buf(),
            RetryPolicy::default(),
        )
        .unwrap();

        match loader.join() {
            LoadStatus::Failed(err) => match err.as_ref() {
                LoadError::Fetch {
                    file,
                    attempts,
                    source: FetchError::NotFound(_),
                } => {
                    assert_eq!(file, "model.zip");
                    assert_eq!(*attempts, 1, "missing files are not retried");
                }
                other => panic!("unexpected error {other:?}"),
            },
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(dest.path().join("a.vsh").exists());
        assert!(!dest.path().join("model.zip").exists());
        assert!(!dest.path().join("model.zip.part").exists());
    }

    #[test]
    fn transient_errors_are_retried_up_to_policy() {
        let fetcher = FlakyFetcher {
            failures: 2,
            calls: AtomicU32::new(0),
            error: io_error,
        };
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let (data, attempts) = fetch_with_retry(&fetcher, "x", policy).unwrap();
        assert_eq!(data, b"x".to_vec());
        assert_eq!(attempts, 3);

        let fetcher = FlakyFetcher {
            failures: 5,
            calls: AtomicU32::new(0),
            error: io_error,
        };
        let (err, attempts) = fetch_with_retry(&fetcher, "x", policy).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(attempts, 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn permanent_errors_fail_on_first_attempt() {
        let fetcher = FlakyFetcher {
            failures: 1,
            calls: AtomicU32::new(0),
            error: not_found,
        };
        let (_, attempts) =
            fetch_with_retry(&fetcher, "x", RetryPolicy::default()).unwrap_err();
        assert_eq!(attempts, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_policy_never_drops_below_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
    }

    #[test]
    fn manifest_with_bad_local_name_is_rejected_before_spawning() {
        let dest = tempdir().unwrap();
        let manifest = AssetManifest::new(vec![AssetEntry::new("a.vsh", "../a.vsh")]);
        let err = AssetLoader::spawn(
            manifest,
            Arc::new(FileMount::new(dest.path())),
            dest.path().join("data"),
            RetryPolicy::no_retry(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::InvalidFileName(name)) if name == "../a.vsh"
        ));
        assert!(!dest.path().join("data").exists());
    }

    struct PanickingFetcher;

    impl Fetcher for PanickingFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            panic!("fetcher blew up on {url}");
        }
    }

    #[test]
    fn worker_that_dies_is_reported_as_stopped() {
        let dest = tempdir().unwrap();
        let loader = AssetLoader::spawn(
            SMALL_MANIFEST.clone(),
            Arc::new(PanickingFetcher),
            dest.path().to_path_buf(),
            RetryPolicy::no_retry(),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let status = loop {
            let status = loader.status();
            if status.is_finished() {
                break status;
            }
            assert!(Instant::now() < deadline, "worker never stopped");
            thread::sleep(Duration::from_millis(2));
        };
        assert!(matches!(
            status,
            LoadStatus::Failed(ref err) if matches!(**err, LoadError::WorkerStopped)
        ));
        assert!(matches!(
            loader.join(),
            LoadStatus::Failed(ref err) if matches!(**err, LoadError::WorkerStopped)
        ));
    }

    #[test]
    fn local_names_must_be_plain_file_names() {
        let dir = Path::new("/data");
        assert!(local_path(dir, "font.bmp").is_ok());
        for bad in ["../x", "sub/x", "/abs", ""] {
            assert!(local_path(dir, bad).is_err(), "{bad} accepted");
        }
    }
}
