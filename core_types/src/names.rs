//! Symbolic name scopes
//!
//! Servers publish a channel under a name. The name lives either in the
//! node-local namespace or in the global one, and each scope maps to a
//! fixed directory in the path namespace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory holding node-local names
pub const LOCAL_NAME_PREFIX: &str = "/dev/name/local/";

/// Directory holding global names
pub const GLOBAL_NAME_PREFIX: &str = "/dev/name/global/";

/// Scope of a published name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NameScope {
    /// Visible on this node only
    #[default]
    Local,
    /// Visible across the network
    Global,
}

impl NameScope {
    /// Builds a scope from the legacy `global` flag
    pub fn from_global(global: bool) -> Self {
        if global {
            NameScope::Global
        } else {
            NameScope::Local
        }
    }

    /// Returns the directory names of this scope live under
    pub fn prefix(&self) -> &'static str {
        match self {
            NameScope::Local => LOCAL_NAME_PREFIX,
            NameScope::Global => GLOBAL_NAME_PREFIX,
        }
    }

    /// Returns the discovery path of `name` in this scope
    pub fn path_of(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }
}

impl fmt::Display for NameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameScope::Local => write!(f, "local"),
            NameScope::Global => write!(f, "global"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_paths() {
        assert_eq!(NameScope::Local.path_of("svc"), "/dev/name/local/svc");
        assert_eq!(NameScope::Global.path_of("svc"), "/dev/name/global/svc");
    }

    #[test]
    fn test_scope_from_flag() {
        assert_eq!(NameScope::from_global(false), NameScope::Local);
        assert_eq!(NameScope::from_global(true), NameScope::Global);
        assert_eq!(NameScope::default(), NameScope::Local);
    }
}
