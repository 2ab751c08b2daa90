use std::path::PathBuf;

use anyhow::{Context, Result};
use shepherd_config::{discover, load_from_path, Config};

pub mod check;
pub mod run;

/// Load the given configuration file, or the first default one in the
/// current directory.
fn load(file: Option<PathBuf>) -> Result<(PathBuf, Config)> {
    let path = match file {
        Some(path) => path,
        None => discover(&std::env::current_dir()?)?,
    };
    let config =
        load_from_path(&path).with_context(|| format!("Cannot load {}", path.display()))?;
    Ok((path, config))
}
