//! Fixed-capacity key/value map living in a named, memory-mapped segment.
//!
//! Every process that maps the same segment file sees the same aggregate
//! mapping. The segment layout is:
//!
//! ```text
//! 0        8            16               24                 24 + capacity
//! ┌────────┬────────────┬────────────────┬──────────────────┐
//! │ magic  │ capacity   │ payload length │ JSON payload 0.. │
//! │        │ (u64 LE)   │ (u64 LE)       │ (zero padded)    │
//! └────────┴────────────┴────────────────┴──────────────────┘
//! ```
//!
//! # Locking
//!
//! - Mutations take the in-process write lock and an exclusive `flock` on the
//!   segment file, decode the whole aggregate, apply one logical change,
//!   re-encode and rewrite the payload. An encoding larger than the capacity
//!   fails with [`CacheError::CapacityExceeded`] and leaves the segment as it
//!   was.
//! - Reads take the in-process read lock and a shared `flock`. The shared
//!   `flock` is taken by the first concurrent reader of this handle and
//!   released by the last one, so a writer in another process never rewrites
//!   the payload under a reader.
//!
//! # Lifetime
//!
//! Every handle holds a shared `flock` on a companion `.attach` file for as
//! long as it lives. When [`SharedCache::create`] finds no other live handle,
//! the payload left behind by earlier processes is discarded, so contents
//! never outlive the last attached process.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::File;
use std::fs::OpenOptions;
use std::marker::PhantomData;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use memmap2::MmapMut;
use nix::errno::Errno;
use nix::fcntl::Flock;
use nix::fcntl::FlockArg;
use parking_lot::Mutex;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use super::KvMap;
use crate::file_io::create_parent_dir_if_not_exist;
use crate::metrics::SHARED_CACHE_OVERFLOW_METRIC;
use crate::CacheError;
use crate::Result;
use crate::StorageError;

const SEGMENT_MAGIC: &[u8; 8] = b"CSYNCSHM";
const ATTACHMENT_SUFFIX: &str = ".attach";
const CAPACITY_OFFSET: usize = 8;
const LENGTH_OFFSET: usize = 16;
/// Bytes in front of the payload
pub const SEGMENT_HEADER_LEN: usize = 24;

/// Multi-process [`KvMap`] backing.
///
/// Cloning is cheap and shares the mapping. Opening the same path again (in
/// this or another process) attaches to the same contents while at least
/// one handle is alive.
pub struct SharedCache<V> {
    segment: Arc<Segment>,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for SharedCache<V> {
    fn clone(&self) -> Self {
        Self {
            segment: self.segment.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> Debug for SharedCache<V> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("path", &self.segment.path)
            .field("capacity", &self.segment.capacity)
            .finish()
    }
}

struct Segment {
    path: PathBuf,
    file: File,
    capacity: usize,
    region: RwLock<MmapMut>,
    readers: Mutex<ReaderLock>,
    /// Released when the last clone of this handle is dropped
    _attachment: Flock<File>,
}

/// Shared `flock` held on behalf of all in-flight readers of one handle
#[derive(Default)]
struct ReaderLock {
    active: usize,
    lock: Option<Flock<File>>,
}

struct SharedReadGuard<'a> {
    segment: &'a Segment,
}

impl Drop for SharedReadGuard<'_> {
    fn drop(&mut self) {
        let mut readers = self.segment.readers.lock();
        readers.active -= 1;
        if readers.active == 0 {
            // dropping the Flock releases it
            readers.lock = None;
        }
    }
}

impl<V> SharedCache<V> {
    /// Creates the segment at `path` with room for `capacity` payload bytes,
    /// or attaches to it if a segment with the same capacity already exists.
    /// An existing segment with no other live handle starts out empty.
    ///
    /// # Errors
    /// - [`CacheError::InvalidSegment`] if the file exists but is not a
    ///   segment, or was created with a different capacity
    /// - [`StorageError::PathError`] if the file cannot be created or mapped
    pub fn create(
        path: impl AsRef<Path>,
        capacity: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if capacity == 0 {
            return Err(CacheError::InvalidSegment {
                path,
                reason: "capacity must be > 0".to_string(),
            }
            .into());
        }
        create_parent_dir_if_not_exist(&path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| path_error(&path, e))?;

        // Serialize initialization against other processes creating the same segment
        let _init = lock(&file, FlockArg::LockExclusive)?;

        let existing_len = file.metadata().map_err(|e| path_error(&path, e))?.len();
        if existing_len == 0 {
            file.set_len((SEGMENT_HEADER_LEN + capacity) as u64)
                .map_err(|e| path_error(&path, e))?;
            let mut region = map_file(&file, &path)?;
            region[..CAPACITY_OFFSET].copy_from_slice(SEGMENT_MAGIC);
            write_u64(&mut region, CAPACITY_OFFSET, capacity as u64);
            write_u64(&mut region, LENGTH_OFFSET, 0);
            let (attachment, _) = attach(&path)?;
            debug!("created shared cache segment {:?} ({} bytes)", path, capacity);
            return Ok(Self::from_parts(path, file, capacity, region, attachment));
        }

        let mut region = map_file(&file, &path)?;
        let stored = validate_header(&region, &path)?;
        if stored != capacity {
            return Err(CacheError::InvalidSegment {
                path,
                reason: format!("segment was created with capacity {stored}, requested {capacity}"),
            }
            .into());
        }

        let (attachment, sole) = attach(&path)?;
        if sole {
            write_payload(&mut region, &[]);
            debug!("discarded stale contents of shared cache segment {:?}", path);
        } else {
            debug!("attached to shared cache segment {:?}", path);
        }
        Ok(Self::from_parts(path, file, capacity, region, attachment))
    }

    /// Attaches to an existing segment, reading its capacity from the header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| path_error(&path, e))?;

        let _init = lock(&file, FlockArg::LockShared)?;
        let region = map_file(&file, &path)?;
        let capacity = validate_header(&region, &path)?;
        let (attachment, _) = attach(&path)?;
        Ok(Self::from_parts(path, file, capacity, region, attachment))
    }

    fn from_parts(
        path: PathBuf,
        file: File,
        capacity: usize,
        region: MmapMut,
        attachment: Flock<File>,
    ) -> Self {
        Self {
            segment: Arc::new(Segment {
                path,
                file,
                capacity,
                region: RwLock::new(region),
                readers: Mutex::new(ReaderLock::default()),
                _attachment: attachment,
            }),
            _value: PhantomData,
        }
    }

    /// Payload capacity in bytes
    pub fn capacity(&self) -> usize {
        self.segment.capacity
    }

    pub fn path(&self) -> &Path {
        &self.segment.path
    }

    /// Length of the current serialized aggregate
    pub fn used_bytes(&self) -> Result<usize> {
        let region = self.segment.region.read();
        let _shared = self.segment.lock_shared()?;
        Ok(read_u64(&region, LENGTH_OFFSET) as usize)
    }
}

impl<V> SharedCache<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Decoded copy of the whole aggregate
    pub fn copy(&self) -> Result<BTreeMap<String, V>> {
        let region = self.segment.region.read();
        let _shared = self.segment.lock_shared()?;
        decode(&region, self.segment.capacity)
    }

    /// Atomic read-modify-write of the whole aggregate.
    fn mutate<R>(
        &self,
        op: impl FnOnce(&mut BTreeMap<String, V>) -> R,
    ) -> Result<R> {
        let mut region = self.segment.region.write();
        let _exclusive = lock(&self.segment.file, FlockArg::LockExclusive)?;

        let mut current = decode::<V>(&region, self.segment.capacity)?;
        let out = op(&mut current);

        let encoded = serde_json::to_vec(&current)?;
        if encoded.len() > self.segment.capacity {
            SHARED_CACHE_OVERFLOW_METRIC.inc();
            return Err(CacheError::CapacityExceeded {
                required: encoded.len(),
                capacity: self.segment.capacity,
            }
            .into());
        }

        write_payload(&mut region, &encoded);
        trace!(
            "rewrote shared cache {:?}: {} bytes",
            self.segment.path,
            encoded.len()
        );
        Ok(out)
    }
}

impl Segment {
    fn lock_shared(&self) -> Result<SharedReadGuard<'_>> {
        let mut readers = self.readers.lock();
        if readers.active == 0 {
            readers.lock = Some(lock(&self.file, FlockArg::LockShared)?);
        }
        readers.active += 1;
        Ok(SharedReadGuard { segment: self })
    }
}

impl<V> KvMap<V> for SharedCache<V>
where
    V: Serialize + DeserializeOwned,
{
    fn get(
        &self,
        key: &str,
    ) -> Result<Option<V>> {
        Ok(self.copy()?.remove(key))
    }

    fn set(
        &self,
        key: &str,
        value: V,
    ) -> Result<()> {
        self.mutate(|current| {
            current.insert(key.to_string(), value);
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Result<Option<V>> {
        self.mutate(|current| current.remove(key))
    }

    fn contains(
        &self,
        key: &str,
    ) -> Result<bool> {
        Ok(self.copy()?.contains_key(key))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.copy()?.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.copy()?.into_keys().collect())
    }

    fn entries(&self) -> Result<BTreeMap<String, V>> {
        self.copy()
    }

    fn extend(
        &self,
        entries: BTreeMap<String, V>,
    ) -> Result<()> {
        self.mutate(|current| current.extend(entries))
    }

    /// Resets the payload without decoding it, so this also recovers a corrupt segment.
    fn clear(&self) -> Result<()> {
        let mut region = self.segment.region.write();
        let _exclusive = lock(&self.segment.file, FlockArg::LockExclusive)?;
        write_payload(&mut region, &[]);
        Ok(())
    }
}

fn lock(
    file: &File,
    arg: FlockArg,
) -> Result<Flock<File>> {
    let handle = file.try_clone().map_err(StorageError::IoError)?;
    Flock::lock(handle, arg).map_err(|(_, errno)| CacheError::Lock(errno.to_string()).into())
}

/// Takes a shared lock on the companion attachment file of `path`.
///
/// The flag is true when no other handle held the lock.
fn attach(path: &Path) -> Result<(Flock<File>, bool)> {
    let attachment_path = attachment_path(path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&attachment_path)
        .map_err(|e| path_error(&attachment_path, e))?;

    let handle = file.try_clone().map_err(StorageError::IoError)?;
    let sole = match Flock::lock(handle, FlockArg::LockExclusiveNonblock) {
        Ok(exclusive) => {
            drop(exclusive);
            true
        }
        Err((_, Errno::EAGAIN)) => false,
        Err((_, errno)) => return Err(CacheError::Lock(errno.to_string()).into()),
    };

    Ok((lock(&file, FlockArg::LockShared)?, sole))
}

fn attachment_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(ATTACHMENT_SUFFIX);
    PathBuf::from(name)
}

fn map_file(
    file: &File,
    path: &Path,
) -> Result<MmapMut> {
    // SAFETY: the mapping is only written through `write_payload` under the
    // exclusive lock, and segment files are never truncated once initialized.
    unsafe { MmapMut::map_mut(file) }.map_err(|e| path_error(path, e))
}

fn validate_header(
    region: &[u8],
    path: &Path,
) -> Result<usize> {
    let invalid = |reason: String| -> crate::Error {
        CacheError::InvalidSegment {
            path: path.to_path_buf(),
            reason,
        }
        .into()
    };

    if region.len() < SEGMENT_HEADER_LEN || &region[..CAPACITY_OFFSET] != SEGMENT_MAGIC {
        return Err(invalid("missing segment header".to_string()));
    }
    let capacity = read_u64(region, CAPACITY_OFFSET) as usize;
    if region.len() < SEGMENT_HEADER_LEN + capacity {
        return Err(invalid(format!(
            "file holds {} bytes, header announces {}",
            region.len(),
            SEGMENT_HEADER_LEN + capacity
        )));
    }
    Ok(capacity)
}

fn decode<V: DeserializeOwned>(
    region: &[u8],
    capacity: usize,
) -> Result<BTreeMap<String, V>> {
    let len = read_u64(region, LENGTH_OFFSET) as usize;
    if len > capacity {
        return Err(CacheError::CorruptSegment(format!(
            "payload length {len} exceeds capacity {capacity}"
        ))
        .into());
    }
    if len == 0 {
        return Ok(BTreeMap::new());
    }

    let payload = &region[SEGMENT_HEADER_LEN..SEGMENT_HEADER_LEN + len];
    serde_json::from_slice(payload).map_err(|e| CacheError::CorruptSegment(e.to_string()).into())
}

/// Zeroes the payload area, then writes `payload` and its length.
fn write_payload(
    region: &mut [u8],
    payload: &[u8],
) {
    let body = &mut region[SEGMENT_HEADER_LEN..];
    body.fill(0);
    body[..payload.len()].copy_from_slice(payload);
    write_u64(region, LENGTH_OFFSET, payload.len() as u64);
}

fn read_u64(
    region: &[u8],
    offset: usize,
) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&region[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn write_u64(
    region: &mut [u8],
    offset: usize,
    value: u64,
) {
    region[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn path_error(
    path: &Path,
    source: std::io::Error,
) -> crate::Error {
    StorageError::PathError {
        path: path.to_path_buf(),
        source,
    }
    .into()
}
