use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ThreadStoreError;
use crate::paths::{default_thread_root, ensure_within, thread_file_name, THREAD_FILE_SUFFIX};
use crate::schema::Thread;

/// Persistence contract used by the completion flow and the thread views.
pub trait ThreadStore {
    /// Loads the single thread whose id starts with `id_prefix`.
    fn load(&self, id_prefix: &str) -> Result<Thread, ThreadStoreError>;
    /// Writes the whole thread, replacing any earlier file for its id.
    fn save(&self, thread: &Thread) -> Result<PathBuf, ThreadStoreError>;
    /// Every decodable thread; undecodable files are skipped.
    fn list(&self) -> Result<Vec<Thread>, ThreadStoreError>;
}

/// One pretty-printed JSON file per thread, flat under a base directory.
#[derive(Debug, Clone)]
pub struct FsThreadStore {
    base: PathBuf,
}

impl FsThreadStore {
    /// Opens (creating if needed) a store rooted at `base`.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, ThreadStoreError> {
        let base = base.into();
        create_private_dir(&base)?;
        Ok(Self { base })
    }

    /// Opens the store under the user's home directory.
    pub fn open_default() -> Result<Self, ThreadStoreError> {
        Self::open(default_thread_root()?)
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Snapshot of stored thread ids, sorted.
    pub fn thread_ids(&self) -> Result<Vec<String>, ThreadStoreError> {
        let entries = fs::read_dir(&self.base)
            .map_err(|source| ThreadStoreError::io("reading thread directory", &self.base, source))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                ThreadStoreError::io("reading thread directory entry", &self.base, source)
            })?;
            if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(true) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(id) = name.strip_suffix(THREAD_FILE_SUFFIX) {
                if !id.is_empty() && !id.starts_with('.') {
                    ids.push(id.to_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        self.base.join(thread_file_name(thread_id))
    }

    fn read_thread(&self, thread_id: &str) -> Result<Thread, ThreadStoreError> {
        let path = ensure_within(&self.base, &self.thread_path(thread_id))?;
        let data = fs::read(&path)
            .map_err(|source| ThreadStoreError::io("reading thread file", &path, source))?;
        serde_json::from_slice(&data).map_err(|source| ThreadStoreError::decode(&path, source))
    }
}

impl ThreadStore for FsThreadStore {
    fn load(&self, id_prefix: &str) -> Result<Thread, ThreadStoreError> {
        let ids = self.thread_ids()?;
        let thread_id = select_prefix_match(&ids, id_prefix)?;
        self.read_thread(thread_id)
    }

    fn save(&self, thread: &Thread) -> Result<PathBuf, ThreadStoreError> {
        if thread.is_empty() {
            return Err(ThreadStoreError::EmptyThread {
                id: thread.id.clone(),
            });
        }

        let path = ensure_within(&self.base, &self.thread_path(&thread.id))?;
        let data = serde_json::to_vec_pretty(thread)
            .map_err(|source| ThreadStoreError::encode(&path, source))?;
        write_replace(&path, &data)?;
        tracing::debug!(path = %path.display(), messages = thread.messages.len(), "saved thread");
        Ok(path)
    }

    fn list(&self) -> Result<Vec<Thread>, ThreadStoreError> {
        let mut threads = Vec::new();
        for thread_id in self.thread_ids()? {
            match self.read_thread(&thread_id) {
                Ok(thread) => threads.push(thread),
                Err(error) => {
                    tracing::debug!(%thread_id, %error, "skipping unreadable thread");
                }
            }
        }
        Ok(threads)
    }
}

/// Picks the one id starting with `prefix` from a listing snapshot.
///
/// More than one candidate is an error rather than an arbitrary pick.
pub fn select_prefix_match<'a>(
    ids: &'a [String],
    prefix: &str,
) -> Result<&'a str, ThreadStoreError> {
    let mut matches = ids.iter().filter(|id| id.starts_with(prefix));
    match (matches.next(), matches.next()) {
        (None, _) => Err(ThreadStoreError::NotFound {
            prefix: prefix.to_owned(),
        }),
        (Some(only), None) => Ok(only.as_str()),
        (Some(first), Some(second)) => {
            let mut all = vec![first.clone(), second.clone()];
            all.extend(matches.cloned());
            Err(ThreadStoreError::AmbiguousPrefix {
                prefix: prefix.to_owned(),
                matches: all,
            })
        }
    }
}

/// Writes to a hidden sibling and renames it over `path`.
fn write_replace(path: &Path, data: &[u8]) -> Result<(), ThreadStoreError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let result = (|| {
        let mut file = private_file(&temp_path)
            .map_err(|source| ThreadStoreError::io("creating thread file", &temp_path, source))?;
        file.write_all(data)
            .and_then(|()| file.sync_all())
            .map_err(|source| ThreadStoreError::io("writing thread file", &temp_path, source))?;
        fs::rename(&temp_path, path)
            .map_err(|source| ThreadStoreError::io("replacing thread file", path, source))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

#[cfg(unix)]
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<(), ThreadStoreError> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
        .map_err(|source| ThreadStoreError::io("creating thread directory", path, source))
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<(), ThreadStoreError> {
    fs::create_dir_all(path)
        .map_err(|source| ThreadStoreError::io("creating thread directory", path, source))
}
