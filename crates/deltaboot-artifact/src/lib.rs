//! deltaboot artifact layer
//!
//! Content hashing and the on-disk cache for the two artifacts a bootstrap
//! run deals with.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: 32-byte SHA-256 digest used for every integrity check
//! - [`ArtifactCache`]: deterministic `(role, version)` to path mapping with
//!   content-derived validity
//! - [`ArtifactRole`]: `base` (upstream) or `derived` (patched)
//!
//! # Example
//!
//! ```rust,no_run
//! use deltaboot_artifact::{ArtifactCache, ArtifactRole, ContentHash};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ArtifactCache::new("cache");
//! let bytes = b"payload";
//! cache.store(ArtifactRole::Base, "1.0", bytes)?;
//! assert!(cache.is_valid(ArtifactRole::Base, "1.0", &ContentHash::compute(bytes))?);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod hash;

pub use cache::{ArtifactCache, ArtifactRole, CacheError, CachedArtifact};
pub use hash::{ContentHash, HashError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
