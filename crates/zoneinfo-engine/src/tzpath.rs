//! Zone lookup -- turning a key such as `"America/New_York"` into TZif bytes.
//!
//! [`ZoneSource`] is the narrow contract the cache depends on. Three sources
//! are provided:
//!
//! - [`TzPath`]: searches a list of zoneinfo directories (`/usr/share/zoneinfo`, ...)
//! - [`MemorySource`]: packaged zone data registered in memory
//! - [`ChainSource`]: tries several sources in order (e.g. system data first,
//!   packaged data as a fallback)

use crate::decoder::is_tzif;
use crate::error::{Result, ZoneInfoError};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

/// Directories searched when no configuration says otherwise.
pub const DEFAULT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/zoneinfo",
    "/usr/lib/zoneinfo",
    "/usr/share/lib/zoneinfo",
    "/etc/zoneinfo",
];

/// Something that can produce TZif bytes for a zone key.
pub trait ZoneSource: Send + Sync {
    /// Load the raw TZif data for `key`.
    ///
    /// # Errors
    /// Returns `ZoneInfoError::NotFound` when this source has no such zone and
    /// `ZoneInfoError::InvalidKey` when `key` is not a safe relative path.
    fn load(&self, key: &str) -> Result<Vec<u8>>;

    /// Every key this source can load.
    fn available_keys(&self) -> BTreeSet<String>;
}

/// Reject keys that could escape a search directory.
///
/// A valid key is a non-empty relative path of normal components: no leading
/// `/`, no `.` or `..`, no empty components (`a//b`, trailing `/`) and no NUL bytes.
pub fn validate_key(key: &str) -> Result<()> {
    let invalid = |reason: &str| ZoneInfoError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.contains('\0') {
        return Err(invalid("key contains a NUL byte"));
    }
    if key.starts_with('/') || Path::new(key).is_absolute() {
        return Err(invalid("keys may not be absolute paths"));
    }
    if key.split('/').any(|part| part.is_empty() || part == ".") {
        return Err(invalid("keys must be normalized relative paths"));
    }
    if Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(invalid("keys must refer to files below the search path"));
    }

    Ok(())
}

/// An ordered list of zoneinfo directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TzPath {
    search_paths: Vec<PathBuf>,
}

impl Default for TzPath {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_PATHS.iter().map(PathBuf::from))
    }
}

impl TzPath {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// First regular file named `key` under any search directory.
    pub fn find_file(&self, key: &str) -> Result<Option<PathBuf>> {
        validate_key(key)?;
        Ok(self
            .search_paths
            .iter()
            .map(|root| root.join(key))
            .find(|candidate| candidate.is_file()))
    }
}

impl ZoneSource for TzPath {
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self
            .find_file(key)?
            .ok_or_else(|| ZoneInfoError::NotFound(key.to_string()))?;
        tracing::debug!(key, path = %path.display(), "loading zone file");
        fs::read(&path).map_err(ZoneInfoError::Io)
    }

    /// Every TZif file below the search directories, as keys.
    ///
    /// The `right/` and `posix/` trees at the top of a root are alternative
    /// copies of the whole database and `posixrules` is a compatibility link,
    /// so none of them is listed.
    fn available_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        for root in &self.search_paths {
            if root.is_dir() {
                collect_keys(root, root, &mut keys);
            }
        }
        keys.remove("posixrules");
        keys
    }
}

fn collect_keys(root: &Path, dir: &Path, keys: &mut BTreeSet<String>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let top_level_alias = dir == root
                && matches!(entry.file_name().to_str(), Some("right") | Some("posix"));
            if !top_level_alias {
                collect_keys(root, &path, keys);
            }
            continue;
        }

        let Some(key) = path
            .strip_prefix(root)
            .ok()
            .and_then(|rel| rel.to_str())
            .map(|rel| rel.replace(std::path::MAIN_SEPARATOR, "/"))
        else {
            continue;
        };
        if key.is_empty() || keys.contains(&key) {
            continue;
        }
        if File::open(&path).map(is_tzif).unwrap_or(false) {
            keys.insert(key);
        }
    }
}

/// Zone data held in memory, e.g. compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    zones: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the TZif data for `key`.
    pub fn insert(&mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.zones.insert(key.into(), data.into());
        self
    }

    pub fn with_zone(mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(key, data);
        self
    }
}

impl ZoneSource for MemorySource {
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        self.zones
            .get(key)
            .cloned()
            .ok_or_else(|| ZoneInfoError::NotFound(key.to_string()))
    }

    fn available_keys(&self) -> BTreeSet<String> {
        self.zones
            .iter()
            .filter(|(_, data)| is_tzif(data.as_slice()))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// Tries each source in turn; the first one that knows the key wins.
#[derive(Default)]
pub struct ChainSource {
    sources: Vec<Box<dyn ZoneSource>>,
}

impl ChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl ZoneSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl ZoneSource for ChainSource {
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        for source in &self.sources {
            match source.load(key) {
                Err(ZoneInfoError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(ZoneInfoError::NotFound(key.to_string()))
    }

    fn available_keys(&self) -> BTreeSet<String> {
        self.sources
            .iter()
            .flat_map(|source| source.available_keys())
            .collect()
    }
}

impl std::fmt::Debug for ChainSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainSource")
            .field("sources", &self.sources.len())
            .finish()
    }
}
