use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::{Error, RiverResult};

/// Knobs of a single evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Deepest allowed nesting of expressions and blocks.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Rewrite value errors into positioned diagnostics. When off the
    /// association map is not kept and errors carry only their message.
    #[serde(default = "default_true")]
    pub decorate_errors: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            decorate_errors: default_true(),
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> RiverResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> RiverResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_max_depth() -> usize {
    1024
}

fn default_true() -> bool {
    true
}
