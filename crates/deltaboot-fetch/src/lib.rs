//! deltaboot fetcher
//!
//! Retrieves base artifacts (and remote patches) as whole byte buffers.
//! Blocking, single attempt, no retries: a failed transfer ends the run.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod fetcher;

pub use error::TransportError;
pub use fetcher::{Fetch, HttpFetcher};
pub use reqwest::Url;
