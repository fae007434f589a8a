//! What `opsgraph version` reports

use std::fmt;

/// Crate version, git revision and build date of this binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: &'static str,
    pub git_rev: &'static str,
    pub build_date: &'static str,
}

impl VersionInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_rev: env!("OPSGRAPH_GIT_REV"),
            build_date: env!("OPSGRAPH_BUILD_DATE"),
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opsgraph {} ({}, built {})", self.version, self.git_rev, self.build_date)
    }
}
