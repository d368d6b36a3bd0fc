//! Configuration loading and parsing.
//!
//! Parses `beltforge.toml`, extracting solver defaults (`[solver]`) and the
//! layout knobs (`[layout]`). Unknown fields are ignored so the file can grow
//! without breaking older binaries; a file that fails to parse falls back to
//! defaults rather than aborting a solve.

use std::time::Duration;
use std::{fs, path::PathBuf};

use anyhow::Result;
use core_problem::{DEFAULT_MAX_GAP, Problem};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SolverSection {
    /// Wall-clock budget in seconds; absent means unlimited (outside
    /// accept-first-feasible mode, which has its own default).
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    #[serde(default)]
    pub deterministic: bool,
    #[serde(default)]
    pub max_parallel: bool,
    #[serde(default)]
    pub show_progress: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayoutSection {
    #[serde(default = "LayoutSection::default_gap")]
    pub max_underground_gap: i32,
}

impl LayoutSection {
    const fn default_gap() -> i32 {
        DEFAULT_MAX_GAP
    }
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            max_underground_gap: Self::default_gap(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub solver: SolverSection,
    #[serde(default)]
    pub layout: LayoutSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
}

/// Best-effort config path: a `beltforge.toml` in the working directory wins,
/// then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("beltforge.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("beltforge").join("beltforge.toml");
    }
    PathBuf::from("beltforge.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config { file })
            }
            Err(err) => {
                warn!(target: "config", path = %path.display(), error = %err, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Fold configured defaults into a problem. Values the instance already
    /// sets win: the time limit is only filled when absent and the boolean
    /// switches only ever turn on.
    pub fn apply_defaults(&self, problem: &mut Problem) {
        let solver = &self.file.solver;
        if problem.options.time_limit.is_none() {
            problem.options.time_limit = solver.time_limit_secs.map(Duration::from_secs);
        }
        problem.options.deterministic |= solver.deterministic;
        problem.options.max_parallel |= solver.max_parallel;
        problem.options.show_progress |= solver.show_progress;
        if problem.max_gap == DEFAULT_MAX_GAP {
            problem.max_gap = self.file.layout.max_underground_gap;
        }
    }
}
