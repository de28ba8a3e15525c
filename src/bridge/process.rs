//! Child-process bridge.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `WORKBENCH_BIN_DIR`: Directory holding the topic programs (default: `build`)
//! - `WORKBENCH_BRIDGE_TIMEOUT_SECS`: Per-call limit, `0` disables (default: 30)

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::registry::ServiceRegistry;
use super::{BridgeError, BridgeRequest, ComputationBridge};

/// Configuration for the process bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Directory holding the topic programs.
    pub bin_dir: PathBuf,
    /// Per-call time limit; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl BridgeConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let timeout_secs: u64 = std::env::var("WORKBENCH_BRIDGE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        Self {
            bin_dir: std::env::var("WORKBENCH_BIN_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("build")),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Runs computation services as child processes.
///
/// Calls are synchronous from the caller's point of view: the future resolves
/// only after the child exits. The child is killed if the call times out or
/// the future is dropped.
#[derive(Debug, Clone)]
pub struct ProcessBridge {
    registry: ServiceRegistry,
    timeout: Option<Duration>,
}

impl ProcessBridge {
    /// Create a bridge over an explicit registry.
    pub fn new(registry: ServiceRegistry, timeout: Option<Duration>) -> Self {
        Self { registry, timeout }
    }

    /// Create a bridge for the topic programs described by `config`.
    pub fn from_config(config: &BridgeConfig) -> Self {
        info!(
            bin_dir = %config.bin_dir.display(),
            timeout_secs = config.timeout.map(|t| t.as_secs()),
            "Initializing process bridge"
        );
        Self::new(
            ServiceRegistry::with_topic_programs(&config.bin_dir),
            config.timeout,
        )
    }

    /// Get the service registry.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Get the per-call timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl ComputationBridge for ProcessBridge {
    async fn execute(&self, request: BridgeRequest) -> Result<String, BridgeError> {
        let BridgeRequest {
            service,
            args,
            stdin,
        } = request;
        let endpoint = self.registry.resolve(&service)?;

        let mut command = Command::new(&endpoint.program);
        command
            .args(&endpoint.leading_args)
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(service = %service, program = %endpoint.program.display(), ?args, "Spawning service");
        let start = Instant::now();

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                BridgeError::NotFound(service.clone())
            } else {
                BridgeError::Io {
                    service: service.clone(),
                    source,
                }
            }
        })?;

        let pipe = child.stdin.take();
        let feed = async move {
            if let (Some(mut pipe), Some(payload)) = (pipe, stdin) {
                pipe.write_all(payload.as_bytes()).await?;
                pipe.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let run = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            if let Err(e) = fed {
                // The program may exit without reading its input.
                if e.kind() == ErrorKind::BrokenPipe {
                    debug!(service = %service, "Service closed stdin early");
                } else {
                    return Err(e);
                }
            }
            output
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                warn!(service = %service, timeout_ms = limit.as_millis() as u64, "Service timed out, killed");
                BridgeError::Timeout {
                    service: service.clone(),
                    timeout: limit,
                }
            })?,
            None => run.await,
        }
        .map_err(|source| BridgeError::Io {
            service: service.clone(),
            source,
        })?;

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(
            service = %service,
            exit_code = output.status.code(),
            latency_ms,
            "Service finished"
        );

        if !output.status.success() {
            return Err(BridgeError::Execution {
                service,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| BridgeError::Encoding(service))?;
        Ok(stdout.trim().to_string())
    }
}
