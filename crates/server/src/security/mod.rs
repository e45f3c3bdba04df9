//! Trust-boundary checks applied before any privileged outbound request.
//!
//! - `host_guard` - classifies outbound URLs (scheme + cloud metadata denylist)
//! - `path_allowlist` - restricts which identity-provider API paths may be proxied
//! - `json` - size/depth bounded JSON parsing for untrusted payloads

pub mod host_guard;
pub mod json;
pub mod path_allowlist;

pub use host_guard::{BlockedHostSet, CLOUD_METADATA_HOSTS, HostGuard, HostVerdict};
pub use json::{JsonLimitError, JsonLimits, parse_bounded};
pub use path_allowlist::{ALLOWED_PATH_PREFIXES, PathAllowlist, PathRejection};
