use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::ExecutionContext;

/// One probe target inside a category list.
#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    pub service: String,
    pub port: u16,
}

/// Top-level YAML configuration. Settings keys are typed here; every other
/// top-level entry stays raw until [`MonitorConfig::service_groups`] decides
/// whether it is a service-group or plain metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    /// Seconds between scheduled cycles.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Concurrent probes per category batch.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// When set, `GET /health-check` runs a fresh cycle before answering.
    #[serde(default)]
    pub refresh_on_query: bool,
    #[serde(flatten)]
    entries: BTreeMap<String, serde_yaml::Value>,
}

fn default_log_directory() -> PathBuf { PathBuf::from("logs") }
fn default_check_interval() -> u64 { 300 }
fn default_probe_timeout_ms() -> u64 { 500 }
fn default_max_workers() -> usize { 10 }
fn default_api_port() -> u16 { 8000 }

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Walk the non-settings entries in name order. Yields `Ok` for every
    /// entry that parses as a service-group and `Err` for malformed ones;
    /// scalar metadata and category-less mappings are skipped silently.
    pub fn service_groups(&self) -> impl Iterator<Item = (&str, Result<ServiceGroup>)> {
        self.entries
            .iter()
            .filter_map(|(name, value)| match ServiceGroup::from_value(value) {
                Ok(None) => None,
                Ok(Some(group)) => Some((name.as_str(), Ok(group))),
                Err(err) => Some((name.as_str(), Err(err))),
            })
    }
}

/// One service-group: per-context host addresses plus named target lists.
#[derive(Debug, Clone)]
pub struct ServiceGroup {
    pub local_host: Option<String>,
    pub docker_host: Option<String>,
    pub categories: BTreeMap<String, Vec<Target>>,
}

impl ServiceGroup {
    /// Classify a top-level entry by shape: host fields are strings,
    /// list-valued fields are categories, any other field is metadata and
    /// ignored. `None` when nothing probeable remains (a scalar value, or a
    /// mapping without any category list).
    fn from_value(value: &serde_yaml::Value) -> Result<Option<Self>> {
        let mapping = match value.as_mapping() {
            Some(mapping) => mapping,
            None => return Ok(None),
        };

        let mut group = ServiceGroup {
            local_host: None,
            docker_host: None,
            categories: BTreeMap::new(),
        };
        for (key, entry) in mapping {
            let key = match key.as_str() {
                Some(key) => key,
                None => continue,
            };
            match key {
                "local_host" => group.local_host = entry.as_str().map(str::to_string),
                "docker_host" => group.docker_host = entry.as_str().map(str::to_string),
                _ if entry.is_sequence() => {
                    let targets: Vec<Target> = serde_yaml::from_value(entry.clone())
                        .map_err(|err| anyhow!("malformed category '{key}': {err}"))?;
                    for target in &targets {
                        if target.port == 0 {
                            bail!("category '{key}': port 0 is not probeable");
                        }
                    }
                    group.categories.insert(key.to_string(), targets);
                }
                _ => {}
            }
        }
        if group.categories.is_empty() {
            return Ok(None);
        }
        Ok(Some(group))
    }

    /// Pick the configured address for the detected execution context.
    pub fn host_for(&self, context: ExecutionContext) -> Result<&str> {
        let (host, field) = match context {
            ExecutionContext::Container => (self.docker_host.as_deref(), "docker_host"),
            ExecutionContext::Local => (self.local_host.as_deref(), "local_host"),
        };
        host.ok_or_else(|| anyhow!("missing {field} for {context} execution"))
    }
}
