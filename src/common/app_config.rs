// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<AggCoreConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static AggCoreConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = AggCoreConfig::load_from_file(path.as_ref())?;
    let _ = CONFIG.set(cfg);
    CONFIG.get().ok_or_else(|| anyhow!("aggcore config not initialized"))
}

pub fn init_from_env_or_default() -> Result<&'static AggCoreConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = config_path_from_env_or_default()?;
    init_from_path(path)
}

pub fn config() -> Result<&'static AggCoreConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("AGGCORE_CONFIG")
        && !p.trim().is_empty()
    {
        return Ok(PathBuf::from(p.trim()));
    }

    let candidate = PathBuf::from("aggcore.toml");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow!(
        "missing config file: set $AGGCORE_CONFIG or create ./aggcore.toml"
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct AggCoreConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "aggcore=debug,warn"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl AggCoreConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let cfg: AggCoreConfig =
            toml::from_str(&s).with_context(|| format!("parse toml: {}", path.display()))?;
        Ok(cfg)
    }

    /// Filter handed to the log subscriber. Verbose levels only apply to this
    /// crate; dependencies stay at info.
    pub fn filter_directive(&self) -> String {
        if let Some(filter) = &self.log_filter {
            return filter.clone();
        }
        match self.log_level.as_str() {
            "debug" => "info,aggcore=debug".to_string(),
            "trace" => "info,aggcore=trace".to_string(),
            other => other.to_string(),
        }
    }
}

impl Default for AggCoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Worker threads used by one aggregation. 0 means one per available core.
    #[serde(default)]
    pub aggregation_worker_threads: usize,
    #[serde(default = "default_group_by_initial_capacity")]
    pub group_by_initial_capacity: usize,
    /// Merge per-worker partial results pairwise on scoped threads instead of
    /// folding them one by one.
    #[serde(default = "default_tree_merge")]
    pub tree_merge: bool,
}

fn default_group_by_initial_capacity() -> usize {
    1024
}

fn default_tree_merge() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            aggregation_worker_threads: 0,
            group_by_initial_capacity: default_group_by_initial_capacity(),
            tree_merge: default_tree_merge(),
        }
    }
}

impl RuntimeConfig {
    pub fn actual_aggregation_worker_threads(&self) -> usize {
        if self.aggregation_worker_threads > 0 {
            self.aggregation_worker_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AggCoreConfig;
    use std::io::Write;

    #[test]
    fn test_runtime_defaults() {
        let cfg: AggCoreConfig = toml::from_str(
            r#"
[runtime]
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.runtime.aggregation_worker_threads, 0);
        assert!(cfg.runtime.actual_aggregation_worker_threads() >= 1);
        assert_eq!(cfg.runtime.group_by_initial_capacity, 1024);
        assert!(cfg.runtime.tree_merge);
    }

    #[test]
    fn test_runtime_can_be_overridden() {
        let cfg: AggCoreConfig = toml::from_str(
            r#"
log_level = "debug"

[runtime]
aggregation_worker_threads = 3
group_by_initial_capacity = 16
tree_merge = false
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.runtime.actual_aggregation_worker_threads(), 3);
        assert_eq!(cfg.runtime.group_by_initial_capacity, 16);
        assert!(!cfg.runtime.tree_merge);
        assert_eq!(cfg.filter_directive(), "info,aggcore=debug");
    }

    #[test]
    fn test_log_filter_takes_precedence() {
        let cfg: AggCoreConfig = toml::from_str(
            r#"
log_level = "trace"
log_filter = "aggcore=debug,warn"
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.filter_directive(), "aggcore=debug,warn");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[runtime]\naggregation_worker_threads = 2").expect("write config");
        let cfg = AggCoreConfig::load_from_file(file.path()).expect("load config");
        assert_eq!(cfg.runtime.aggregation_worker_threads, 2);
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[runtime\n").expect("write config");
        let err = AggCoreConfig::load_from_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parse toml"));
    }
}
