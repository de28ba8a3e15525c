//! Computation bridge: delegate algorithmic work to an external service.
//!
//! ## Contract
//!
//! 1. A service name is resolved to an executable endpoint; an unknown name
//!    fails with [`BridgeError::NotFound`] before any process starts
//! 2. The program runs with the endpoint's leading arguments followed by the
//!    request arguments verbatim; stdout and stderr are captured separately
//! 3. A nonzero exit fails with [`BridgeError::Execution`] carrying the raw
//!    diagnostics; it is never retried
//! 4. Success returns trimmed stdout, unparsed. Callers pick a grammar from
//!    [`response`]
//!
//! Every call is bounded by a configurable timeout, and dropping the call
//! future kills the child process.

pub mod registry;
pub mod process;
pub mod response;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Well-known computation services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceName {
    /// Students sorted by id, ascending (CSV).
    SortId,
    /// Students sorted by score, descending (CSV).
    SortScore,
    /// Meaning of one word (free text).
    Search,
    /// Words matching a prefix (one per line).
    Fuzzy,
    /// Dictionary tree structure (JSON).
    PrintTree,
    /// Location listing (CSV).
    Locations,
    /// Edge listing (CSV).
    Edges,
    /// Shortest path between two ids (composite `path | distance`).
    Path,
}

impl ServiceName {
    /// All well-known services.
    pub const ALL: [ServiceName; 8] = [
        Self::SortId,
        Self::SortScore,
        Self::Search,
        Self::Fuzzy,
        Self::PrintTree,
        Self::Locations,
        Self::Edges,
        Self::Path,
    ];

    /// Wire name of the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SortId => "sort_id",
            Self::SortScore => "sort_score",
            Self::Search => "search",
            Self::Fuzzy => "fuzzy",
            Self::PrintTree => "print_tree",
            Self::Locations => "locations",
            Self::Edges => "edges",
            Self::Path => "path",
        }
    }

    /// Parse a wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == s)
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of a computation service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeRequest {
    /// Service name to resolve.
    pub service: String,
    /// Positional arguments, passed verbatim.
    pub args: Vec<String>,
    /// Optional payload written to the program's stdin.
    pub stdin: Option<String>,
}

impl BridgeRequest {
    /// Create a request with no arguments.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Supply a stdin payload.
    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }
}

impl From<ServiceName> for BridgeRequest {
    fn from(name: ServiceName) -> Self {
        Self::new(name.as_str())
    }
}

/// Error type for bridge invocations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Service name unknown or its program is absent.
    #[error("Computation service not found: {0}")]
    NotFound(String),
    /// Program exited unsuccessfully.
    #[error("Service {service} exited unsuccessfully (code {exit_code:?}): {stderr}")]
    Execution {
        /// Service name.
        service: String,
        /// Exit code; `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
        /// Captured standard output.
        stdout: String,
    },
    /// Program did not finish in time and was killed.
    #[error("Service {service} timed out after {timeout:?}")]
    Timeout {
        /// Service name.
        service: String,
        /// Configured limit.
        timeout: Duration,
    },
    /// Program could not be started or its pipes failed.
    #[error("Failed to run service {service}: {source}")]
    Io {
        /// Service name.
        service: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Standard output was not valid UTF-8.
    #[error("Service {0} wrote non-UTF-8 output")]
    Encoding(String),
}

/// Trait for computation service backends.
///
/// Implementations are expected to be side-effect free apart from reading
/// caller-supplied file paths.
#[async_trait]
pub trait ComputationBridge: Send + Sync {
    /// Run a request and return trimmed stdout.
    async fn execute(&self, request: BridgeRequest) -> Result<String, BridgeError>;

    /// Run a service by name with positional arguments.
    async fn invoke(&self, service: &str, args: &[String]) -> Result<String, BridgeError> {
        self.execute(BridgeRequest::new(service).args(args.iter().cloned()))
            .await
    }
}

pub use registry::{ServiceEndpoint, ServiceRegistry};
pub use process::{BridgeConfig, ProcessBridge};
pub use response::{
    BridgeResponse, CsvRecord, CsvTable, OutlineNode, OutlineTree, PathOutcome, PathResponse,
    ResponseError, SearchResult, ServiceOutput,
};
