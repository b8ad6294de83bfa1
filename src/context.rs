use std::fmt;
use std::path::Path;

/// Where the process is running, as seen by host resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Inside a container; groups are reached through their `docker_host`.
    Container,
    /// Directly on the host; groups are reached through their `local_host`.
    Local,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionContext::Container => "container",
            ExecutionContext::Local => "local",
        })
    }
}

/// Source of the execution context. Re-evaluated on every host resolution,
/// once per group per cycle.
pub trait ContextProbe: Send + Sync {
    fn context(&self) -> ExecutionContext;
}

/// Detects containerized execution from the Docker marker file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerEnv;

impl ContextProbe for DockerEnv {
    fn context(&self) -> ExecutionContext {
        if Path::new("/.dockerenv").exists() {
            ExecutionContext::Container
        } else {
            ExecutionContext::Local
        }
    }
}

/// A pinned context, for tests and deployments that want to override
/// detection.
#[derive(Debug, Clone, Copy)]
pub struct Fixed(pub ExecutionContext);

impl ContextProbe for Fixed {
    fn context(&self) -> ExecutionContext {
        self.0
    }
}
