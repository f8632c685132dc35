//! File-backed shared store for an application group container.
//!
//! Layout:
//!
//! ```text
//! <root>/<namespace>/v1/<hex(key)>.rec     one record per key
//! <root>/<namespace>/v1/.write.lock        writer lock (fs2)
//! ```
//!
//! Every record file is `[1 byte format version][payload]`. Writers build the
//! full record in a temp file inside the same directory and `rename` it over
//! the target, so a reader in another process either sees the previous
//! record or the new one, never a partial write. Writers serialize on an
//! exclusive lock file; readers take no lock.
//!
//! The extension process opens the store with [`FileStore::open_read_only`].

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;

use super::traits::{SharedStore, StorageError, StorageResult};

/// Physical record format version.
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Directory name for the current schema. Bumped together with
/// [`RECORD_FORMAT_VERSION`] when the layout changes incompatibly.
const SCHEMA_DIR: &str = "v1";

const RECORD_EXT: &str = "rec";
const LOCK_FILE: &str = ".write.lock";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-backed implementation of [`SharedStore`].
pub struct FileStore {
    namespace: String,
    dir: PathBuf,
    read_only: bool,
}

impl FileStore {
    /// Open (and create if needed) the writable store for `namespace` under
    /// `root`. Only the main process should hold a writable handle.
    pub fn open(root: impl AsRef<Path>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        let dir = Self::namespace_dir(root.as_ref(), &namespace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            namespace,
            dir,
            read_only: false,
        })
    }

    /// Open a read-only handle. The directory is not created; a missing
    /// directory simply reads as empty.
    pub fn open_read_only(root: impl AsRef<Path>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let dir = Self::namespace_dir(root.as_ref(), &namespace);
        Self {
            namespace,
            dir,
            read_only: true,
        }
    }

    /// Directory holding the records of this namespace.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn namespace_dir(root: &Path, namespace: &str) -> PathBuf {
        root.join(namespace).join(SCHEMA_DIR)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hex::encode(key.as_bytes()), RECORD_EXT))
    }

    fn lock(&self) -> StorageResult<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn ensure_writable(&self) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::read_only(&self.namespace));
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".tmp-{}-{}", std::process::id(), n))
    }
}

impl SharedStore for FileStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let bytes = match fs::read(self.record_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match bytes.split_first() {
            Some((&RECORD_FORMAT_VERSION, payload)) => Ok(Some(payload.to_vec())),
            Some((&version, _)) => Err(StorageError::unsupported_version(key, version)),
            None => Err(StorageError::corrupted(key, "Empty record file")),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.ensure_writable()?;
        let lock = self.lock()?;

        let tmp = self.tmp_path();
        let result = (|| -> StorageResult<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&[RECORD_FORMAT_VERSION])?;
            file.write_all(value)?;
            file.sync_all()?;
            fs::rename(&tmp, self.record_path(key))?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        lock.unlock()?;
        result
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.ensure_writable()?;
        let lock = self.lock()?;
        let result = match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        };
        lock.unlock()?;
        result
    }

    fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(raw) = hex::decode(stem) else {
                continue;
            };
            let Ok(key) = String::from_utf8(raw) else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageErrorCode;
    use tempfile::tempdir;

    #[test]
    fn test_write_read_roundtrip() {
        let root = tempdir().unwrap();
        let store = FileStore::open(root.path(), "group.test").unwrap();

        store.write("kms.agreement.abc", b"secret").unwrap();
        assert_eq!(
            store.read("kms.agreement.abc").unwrap(),
            Some(b"secret".to_vec())
        );
        assert_eq!(store.read("missing").unwrap(), None);
    }

    #[test]
    fn test_reader_in_same_namespace_sees_records() {
        let root = tempdir().unwrap();
        let writer = FileStore::open(root.path(), "group.test").unwrap();
        let reader = FileStore::open_read_only(root.path(), "group.test");

        writer.write("clientId", b"abc").unwrap();
        assert_eq!(reader.read("clientId").unwrap(), Some(b"abc".to_vec()));

        let err = reader.write("clientId", b"zzz").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::AccessDenied);
        assert_eq!(reader.read("clientId").unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let root = tempdir().unwrap();
        let a = FileStore::open(root.path(), "group.a").unwrap();
        let b = FileStore::open(root.path(), "group.b").unwrap();

        a.write("k", b"1").unwrap();
        assert_eq!(b.read("k").unwrap(), None);
    }

    #[test]
    fn test_reader_on_missing_namespace_is_empty() {
        let root = tempdir().unwrap();
        let reader = FileStore::open_read_only(root.path(), "group.never-written");
        assert_eq!(reader.read("anything").unwrap(), None);
        assert!(reader.keys("").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_record_version_rejected() {
        let root = tempdir().unwrap();
        let store = FileStore::open(root.path(), "group.test").unwrap();
        store.write("k", b"v").unwrap();

        fs::write(store.record_path("k"), [9u8, 1, 2, 3]).unwrap();
        let err = store.read("k").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::UnsupportedVersion);
    }

    #[test]
    fn test_keys_skip_temp_and_lock_files() {
        let root = tempdir().unwrap();
        let store = FileStore::open(root.path(), "group.test").unwrap();
        store.write("sub.one", b"1").unwrap();
        store.write("sub.two", b"2").unwrap();
        store.write("kms.x", b"3").unwrap();
        fs::write(store.dir().join(".tmp-1-1"), b"junk").unwrap();

        let mut keys = store.keys("sub.").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["sub.one", "sub.two"]);
    }

    #[test]
    fn test_delete() {
        let root = tempdir().unwrap();
        let store = FileStore::open(root.path(), "group.test").unwrap();
        store.write("k", b"v").unwrap();
        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.read("k").unwrap(), None);
    }

    #[test]
    fn test_concurrent_writers_leave_whole_records() {
        use std::sync::Arc;
        use std::thread;

        let root = tempdir().unwrap();
        let store = Arc::new(FileStore::open(root.path(), "group.test").unwrap());
        let reader = FileStore::open_read_only(root.path(), "group.test");

        let mut handles = vec![];
        for i in 0..8u8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.write("shared", &[i; 64]).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let value = reader.read("shared").unwrap().unwrap();
        assert_eq!(value.len(), 64);
        assert!(value.iter().all(|b| *b == value[0]));
    }
}
