//! Identity-provider API paths the proxy is willing to forward.
//!
//! Without this the proxy would let a crafted `path` reach any endpoint on the
//! identity provider (or anything else reachable from the gateway) with the
//! service-account credential attached.

/// Resource prefixes, relative to the upstream base URL, without a leading slash.
pub const ALLOWED_PATH_PREFIXES: &[&str] = &["v1/oauth2", "v1/group", "v1/person", "v1/account"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    Traversal,
    DoubledSeparator,
    IllegalCharacter,
    UnlistedPrefix,
}

#[derive(Debug, Clone, Copy)]
pub struct PathAllowlist {
    prefixes: &'static [&'static str],
}

impl Default for PathAllowlist {
    fn default() -> Self {
        Self {
            prefixes: ALLOWED_PATH_PREFIXES,
        }
    }
}

impl PathAllowlist {
    pub fn check(&self, path: &str) -> Result<(), PathRejection> {
        if path.is_empty() {
            return Err(PathRejection::Empty);
        }
        // `%2e` is normalised to `.` by URL parsers, so it counts as traversal.
        if path.contains("..") || path.to_ascii_lowercase().contains("%2e") {
            return Err(PathRejection::Traversal);
        }
        if path.contains("//") {
            return Err(PathRejection::DoubledSeparator);
        }
        if path
            .chars()
            .any(|c| c == '\\' || c.is_control() || c.is_whitespace())
        {
            return Err(PathRejection::IllegalCharacter);
        }

        let listed = self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']))
        });
        if listed {
            Ok(())
        } else {
            Err(PathRejection::UnlistedPrefix)
        }
    }
}
