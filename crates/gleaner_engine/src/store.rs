use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gleaner_logging::{gleaner_info, gleaner_warn};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use walkdir::WalkDir;

use gleaner_core::{is_recognized_image, suffixed_filename};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// SHA-256 of a blob's bytes; the sole deduplication key. Two blobs with
/// equal digests are the same content, whatever their source URLs or
/// filenames.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

/// A file accepted into the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub digest: ContentDigest,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
enum IndexEntry {
    /// A writer has claimed the digest and is still writing the file.
    InFlight,
    Stored(StoredFile),
}

/// Linearizable digest -> file map shared by all target workers.
///
/// Insertion is claim-based: a writer claims a digest before touching
/// the disk, and racing writers that find any entry (claimed or stored)
/// reject their blob as a duplicate. The map grows monotonically over a
/// run; claims are only removed when their write fails.
#[derive(Clone, Default)]
pub struct DedupIndex {
    entries: Arc<Mutex<HashMap<ContentDigest, IndexEntry>>>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, digest: ContentDigest) -> bool {
        self.lock().contains_key(&digest)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Claim `digest` for writing. `false` when any entry already exists;
    /// the caller must then reject the blob as a duplicate.
    fn claim(&self, digest: ContentDigest) -> bool {
        match self.lock().entry(digest) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(IndexEntry::InFlight);
                true
            }
        }
    }

    /// Drop a claim whose write failed, so the digest can be retried.
    fn release(&self, digest: ContentDigest) {
        let mut entries = self.lock();
        if matches!(entries.get(&digest), Some(IndexEntry::InFlight)) {
            entries.remove(&digest);
        }
    }

    /// Register a file for its digest, replacing any claim.
    fn record(&self, file: StoredFile) {
        self.lock().insert(file.digest, IndexEntry::Stored(file));
    }

    /// Register a file only when its digest is unknown; used while
    /// seeding so the first-discovered path wins.
    fn record_if_absent(&self, file: StoredFile) -> bool {
        match self.lock().entry(file.digest) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(IndexEntry::Stored(file));
                true
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContentDigest, IndexEntry>> {
        // A panic mid-insert cannot leave the map half-updated, so a
        // poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| StoreError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(StoreError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| StoreError::OutputDir(e.to_string()))?;
    }
    // Writability probe: creating a temp file must succeed.
    NamedTempFile::new_in(dir).map_err(|e| StoreError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Outcome of offering a blob to the store.
#[derive(Debug, PartialEq, Eq)]
pub enum Acceptance {
    Stored(StoredFile),
    /// The content is already present (on disk or claimed by a racing
    /// writer); nothing was written.
    Duplicate,
}

/// Filesystem-backed, content-addressed store under one output root.
///
/// Layout is `{output_dir}/{username}/{filename}`; the digest state is
/// always recomputed from file bytes, never persisted separately.
pub struct ContentStore {
    output_dir: PathBuf,
    index: DedupIndex,
}

impl ContentStore {
    /// Root the store at `output_dir`, creating and probing it. Failure
    /// here is fatal to the run and must precede any target work.
    pub fn open(output_dir: impl Into<PathBuf>, index: DedupIndex) -> Result<Self, StoreError> {
        let output_dir = output_dir.into();
        ensure_output_dir(&output_dir)?;
        Ok(Self { output_dir, index })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn index(&self) -> &DedupIndex {
        &self.index
    }

    /// Offer a blob for storage under `{output_dir}/{username}`.
    ///
    /// At most one writer wins per digest: the digest is claimed in the
    /// index before any disk work, and a lost race is a duplicate
    /// rejection, not an error. Path collisions with different content
    /// step through `_{n}` suffixes; collisions with equal content adopt
    /// the existing file instead of writing a second copy.
    pub fn accept(
        &self,
        digest: ContentDigest,
        blob: &[u8],
        candidate: &str,
        username: &str,
    ) -> Result<Acceptance, StoreError> {
        if !self.index.claim(digest) {
            return Ok(Acceptance::Duplicate);
        }
        match self.write_claimed(digest, blob, candidate, username) {
            Ok(acceptance) => Ok(acceptance),
            Err(error) => {
                self.index.release(digest);
                Err(error)
            }
        }
    }

    fn write_claimed(
        &self,
        digest: ContentDigest,
        blob: &[u8],
        candidate: &str,
        username: &str,
    ) -> Result<Acceptance, StoreError> {
        let target_dir = self.output_dir.join(username);
        fs::create_dir_all(&target_dir)?;

        let mut tmp = NamedTempFile::new_in(&target_dir)?;
        tmp.write_all(blob)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        let mut counter = 0u32;
        loop {
            let filename = if counter == 0 {
                candidate.to_string()
            } else {
                suffixed_filename(candidate, counter)
            };
            let path = target_dir.join(&filename);

            if path.exists() {
                if ContentDigest::of(&fs::read(&path)?) == digest {
                    // Bit-identical bytes already on disk under another
                    // name or from a prior run; adopt that file.
                    self.index.record(StoredFile { digest, path });
                    return Ok(Acceptance::Duplicate);
                }
                counter += 1;
                continue;
            }

            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    let file = StoredFile { digest, path };
                    self.index.record(file.clone());
                    return Ok(Acceptance::Stored(file));
                }
                Err(persist_error) => {
                    if persist_error.error.kind() == io::ErrorKind::AlreadyExists {
                        // A racing writer took the path between the
                        // existence check and the rename; re-examine the
                        // same candidate without advancing the counter.
                        tmp = persist_error.file;
                        continue;
                    }
                    return Err(StoreError::Io(persist_error.error));
                }
            }
        }
    }

    /// Walk the existing output tree and register the digest of every
    /// recognized image file, making dedup effective across restarts.
    /// Unreadable files are logged and skipped. Returns the number of
    /// distinct digests seeded.
    pub fn seed_from_disk(&self) -> usize {
        let mut seeded = 0;
        for entry in WalkDir::new(&self.output_dir)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if !is_recognized_image(&entry.file_name().to_string_lossy()) {
                continue;
            }
            match fs::read(entry.path()) {
                Ok(bytes) => {
                    let file = StoredFile {
                        digest: ContentDigest::of(&bytes),
                        path: entry.path().to_path_buf(),
                    };
                    if self.index.record_if_absent(file) {
                        seeded += 1;
                    }
                }
                Err(error) => {
                    gleaner_warn!("could not digest {}: {error}", entry.path().display());
                }
            }
        }
        seeded
    }

    /// Post-run sweep: rescan the whole tree and delete every file whose
    /// digest was already seen at an earlier path, keeping the
    /// first-discovered copy. Walk order is sorted by file name so the
    /// kept path is deterministic. Returns the number of files removed.
    pub fn sweep_duplicates(&self) -> usize {
        let mut first_seen: HashMap<ContentDigest, PathBuf> = HashMap::new();
        let mut removed = 0;
        for entry in WalkDir::new(&self.output_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if !is_recognized_image(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let digest = match fs::read(entry.path()) {
                Ok(bytes) => ContentDigest::of(&bytes),
                Err(error) => {
                    gleaner_warn!("could not digest {}: {error}", entry.path().display());
                    continue;
                }
            };
            match first_seen.entry(digest) {
                Entry::Vacant(slot) => {
                    slot.insert(entry.path().to_path_buf());
                }
                Entry::Occupied(keeper) => match fs::remove_file(entry.path()) {
                    Ok(()) => {
                        gleaner_info!(
                            "removed duplicate {} (kept {})",
                            entry.path().display(),
                            keeper.get().display()
                        );
                        removed += 1;
                    }
                    Err(error) => {
                        gleaner_warn!(
                            "could not remove duplicate {}: {error}",
                            entry.path().display()
                        );
                    }
                },
            }
        }
        removed
    }
}
