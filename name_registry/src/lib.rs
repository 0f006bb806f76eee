//! # Path Namespace
//!
//! This crate implements the namespace that maps paths to the channels
//! serving them.
//!
//! ## Philosophy
//!
//! Servers are found by path, not by channel id. A symbolic name `svc` is
//! just the path `/dev/name/local/svc`; a resource manager registers any
//! path it likes, such as `/dev/gps`. Opening a path connects to whichever
//! channel holds the longest registered prefix of it.

use core_types::{ChannelId, NameScope, ProcessId};
use kernel_api::PathId;
use std::collections::HashMap;
use thiserror::Error;

/// Error types for namespace operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Path already registered
    #[error("Path already registered: {0}")]
    PathInUse(String),
    /// Path not registered
    #[error("Path not found: {0}")]
    PathNotFound(String),
    /// Registration id not known
    #[error("Registration not found: {0}")]
    NotFound(PathId),
    /// Path is empty or not absolute
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),
}

/// One registered path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub id: PathId,
    pub path: String,
    pub pid: ProcessId,
    pub chid: ChannelId,
}

/// Path registry
///
/// Maintains the mapping from registered paths to the channels that serve
/// them. Lookups are exact for names and longest-prefix for resolution.
#[derive(Debug)]
pub struct PathNamespace {
    /// Registered entries by id
    entries: HashMap<PathId, PathEntry>,
    /// Path lookup table
    paths: HashMap<String, PathId>,
    next_id: u32,
}

impl PathNamespace {
    /// Creates an empty namespace
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            paths: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers `path` as served by `chid` in process `pid`
    pub fn register(
        &mut self,
        path: &str,
        pid: ProcessId,
        chid: ChannelId,
    ) -> Result<PathId, RegistryError> {
        let path = normalize(path)?;
        if self.paths.contains_key(&path) {
            return Err(RegistryError::PathInUse(path));
        }
        let id = PathId::from_raw(self.next_id);
        self.next_id += 1;
        log::debug!("namespace: registered {} for {} as {}", path, chid, id);
        self.paths.insert(path.clone(), id);
        self.entries.insert(
            id,
            PathEntry {
                id,
                path,
                pid,
                chid,
            },
        );
        Ok(id)
    }

    /// Registers a symbolic name in the given scope
    pub fn register_name(
        &mut self,
        name: &str,
        scope: NameScope,
        pid: ProcessId,
        chid: ChannelId,
    ) -> Result<PathId, RegistryError> {
        self.register(&scope.path_of(name), pid, chid)
    }

    /// Looks up an exact path
    pub fn lookup(&self, path: &str) -> Result<&PathEntry, RegistryError> {
        let path = normalize(path)?;
        self.paths
            .get(&path)
            .and_then(|id| self.entries.get(id))
            .ok_or(RegistryError::PathNotFound(path))
    }

    /// Looks up a symbolic name in the given scope
    pub fn lookup_name(&self, name: &str, scope: NameScope) -> Result<&PathEntry, RegistryError> {
        self.lookup(&scope.path_of(name))
    }

    /// Resolves `path` to the entry with the longest matching prefix
    ///
    /// Returns the entry and the remainder of the path below it, without a
    /// leading slash. A prefix only matches at a path component boundary.
    pub fn resolve(&self, path: &str) -> Result<(&PathEntry, String), RegistryError> {
        let path = normalize(path)?;
        let mut best: Option<&PathEntry> = None;
        for entry in self.entries.values() {
            let matches = path == entry.path
                || (path.starts_with(&entry.path)
                    && (entry.path == "/"
                        || path.as_bytes().get(entry.path.len()) == Some(&b'/')));
            if matches && best.map_or(true, |b| entry.path.len() > b.path.len()) {
                best = Some(entry);
            }
        }
        let entry = best.ok_or_else(|| RegistryError::PathNotFound(path.clone()))?;
        let remainder = path[entry.path.len()..].trim_start_matches('/').to_string();
        Ok((entry, remainder))
    }

    /// True when `path` is registered exactly
    pub fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_ok()
    }

    /// Removes a registration
    pub fn unregister(&mut self, id: PathId) -> Result<PathEntry, RegistryError> {
        let entry = self.entries.remove(&id).ok_or(RegistryError::NotFound(id))?;
        self.paths.remove(&entry.path);
        log::debug!("namespace: removed {}", entry.path);
        Ok(entry)
    }

    /// Removes every registration served by `chid`
    pub fn unregister_channel(&mut self, chid: ChannelId) -> Vec<PathEntry> {
        let ids: Vec<PathId> = self
            .entries
            .values()
            .filter(|entry| entry.chid == chid)
            .map(|entry| entry.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.unregister(id).ok())
            .collect()
    }

    /// Returns the number of registered paths
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for PathNamespace {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> Result<String, RegistryError> {
    if !path.starts_with('/') {
        return Err(RegistryError::InvalidPath(path.to_string()));
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }
    Ok(trimmed.to_string())
}
