//! Service name → executable resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{BridgeError, ServiceName};

/// Executable behind a service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Program path, or a bare name looked up on `PATH`.
    pub program: PathBuf,
    /// Arguments placed before the request arguments.
    pub leading_args: Vec<String>,
}

impl ServiceEndpoint {
    /// Create an endpoint with no leading arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Add a leading argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Whether the program is given as a path rather than a bare name.
    fn is_path(&self) -> bool {
        self.program.components().count() > 1 || self.program.is_absolute()
    }
}

/// Registry of computation services.
///
/// Uses a BTreeMap for deterministic listing order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    endpoints: BTreeMap<String, ServiceEndpoint>,
}

/// Executable names of the three topic programs.
pub const STUDENT_PROGRAM: &str = "Topic1_Student";
/// Dictionary program.
pub const DICTIONARY_PROGRAM: &str = "Topic2_Dictionary";
/// Campus map program.
pub const CAMPUS_PROGRAM: &str = "Topic3_Campus";

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every well-known service onto the topic programs in `bin_dir`.
    ///
    /// Each program receives the service name as its first argument.
    pub fn with_topic_programs(bin_dir: &Path) -> Self {
        let mut registry = Self::new();
        for service in ServiceName::ALL {
            let program = match service {
                ServiceName::SortId | ServiceName::SortScore => STUDENT_PROGRAM,
                ServiceName::Search | ServiceName::Fuzzy | ServiceName::PrintTree => {
                    DICTIONARY_PROGRAM
                }
                ServiceName::Locations | ServiceName::Edges | ServiceName::Path => CAMPUS_PROGRAM,
            };
            let exe = bin_dir.join(format!("{program}{}", std::env::consts::EXE_SUFFIX));
            registry.register(
                service.as_str(),
                ServiceEndpoint::new(exe).with_arg(service.as_str()),
            );
        }
        registry
    }

    /// Register or replace a service.
    pub fn register(&mut self, name: impl Into<String>, endpoint: ServiceEndpoint) -> &mut Self {
        self.endpoints.insert(name.into(), endpoint);
        self
    }

    /// Resolve a service name.
    ///
    /// Fails with [`BridgeError::NotFound`] if the name is unknown or its
    /// program is given as a path that does not exist.
    pub fn resolve(&self, name: &str) -> Result<&ServiceEndpoint, BridgeError> {
        let endpoint = self
            .endpoints
            .get(name)
            .ok_or_else(|| BridgeError::NotFound(name.to_string()))?;

        if endpoint.is_path() && !endpoint.program.exists() {
            tracing::warn!(
                service = name,
                program = %endpoint.program.display(),
                "Service program missing"
            );
            return Err(BridgeError::NotFound(name.to_string()));
        }
        Ok(endpoint)
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
