use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

/// Host key-value persistence. Values are opaque text blobs.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;

    /// Read-modify-write of one key, serialized against every other write to the
    /// same backend. `change` sees the current value and returns the replacement,
    /// or `None` to leave the key untouched. It is called exactly once.
    fn update(
        &self,
        key: &str,
        change: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> io::Result<()>;
}

pub fn namespaced_key(account: &str, name: &str) -> String {
    format!("chopmeter:{}:{}", account, name)
}

#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> io::Error {
    io::Error::new(io::ErrorKind::Other, "memory backend lock poisoned")
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        change: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> io::Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        if let Some(next) = change(entries.get(key).cloned()) {
            entries.insert(key.to_string(), next);
        }
        Ok(())
    }
}

/// One write lock per data directory, shared by every `FileBackend` opened on it
/// within this process.
fn directory_lock(root: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    Arc::clone(locks.entry(root.to_path_buf()).or_default())
}

/// Stores each key as a JSON file inside a directory.
pub struct FileBackend {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileBackend {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create data directory: {}", root.display()))?;
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve data directory: {}", root.display()))?;
        let write_lock = directory_lock(&root);
        Ok(Self { root, write_lock })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", file_name))
    }

    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key);
        // Write next to the target and rename so readers never see a torn file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        self.read(key)
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write(key, value)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn update(
        &self,
        key: &str,
        change: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match change(self.read(key)?) {
            Some(next) => self.write(key, &next),
            None => Ok(()),
        }
    }
}
