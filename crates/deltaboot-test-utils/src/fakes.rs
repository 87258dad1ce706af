//! Recording stand-ins for the fetcher and launcher

use deltaboot_artifact::ContentHash;
use deltaboot_fetch::{Fetch, TransportError, Url};
use deltaboot_launch::{Launch, LaunchError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum Response {
    Bytes(Vec<u8>),
    Status(u16),
}

/// Serves canned responses and records every URL it was asked for
///
/// Responses are served in order; the last one repeats.
#[derive(Debug)]
pub struct RecordingFetcher {
    responses: RefCell<VecDeque<Response>>,
    requests: RefCell<Vec<Url>>,
}

impl RecordingFetcher {
    /// Always answer with `bytes`
    pub fn serving(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_responses(vec![Response::Bytes(bytes.into())])
    }

    /// Answer with each of `bodies` in turn
    pub fn sequence(bodies: Vec<Vec<u8>>) -> Self {
        Self::from_responses(bodies.into_iter().map(Response::Bytes).collect())
    }

    /// Always fail with an HTTP status
    pub fn failing(status: u16) -> Self {
        Self::from_responses(vec![Response::Status(status)])
    }

    fn from_responses(responses: Vec<Response>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Number of fetches performed
    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    /// URLs requested, in order
    pub fn requests(&self) -> Vec<Url> {
        self.requests.borrow().clone()
    }
}

impl Fetch for RecordingFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        self.requests.borrow_mut().push(url.clone());
        let mut responses = self.responses.borrow_mut();
        let response = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        match response {
            Some(Response::Bytes(bytes)) => Ok(bytes),
            Some(Response::Status(status)) => Err(TransportError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// What a launch saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub artifact: PathBuf,
    pub args: Vec<OsString>,
    /// Digest of the artifact file at the moment of launch
    pub artifact_hash: ContentHash,
}

/// Records launches instead of starting a runtime
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    exit_code: i32,
    launches: RefCell<Vec<LaunchRecord>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this exit code for every launch
    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            launches: RefCell::default(),
        }
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.borrow().clone()
    }
}

impl Launch for RecordingLauncher {
    fn launch(&self, artifact: &Path, args: &[OsString]) -> Result<i32, LaunchError> {
        let bytes = fs::read(artifact).map_err(|source| LaunchError::Read {
            path: artifact.to_path_buf(),
            source,
        })?;
        self.launches.borrow_mut().push(LaunchRecord {
            artifact: artifact.to_path_buf(),
            args: args.to_vec(),
            artifact_hash: ContentHash::compute(&bytes),
        });
        Ok(self.exit_code)
    }
}
