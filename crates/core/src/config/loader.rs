//! Configuration file loader for the `.macro-kit/` directory.
//!
//! Loads:
//! - `config.toml`: Global settings
//! - `scenarios/*.json`: Scenario definitions

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use mk_protocol::config_models::GlobalConfig;
use mk_protocol::scenario_models::Scenario;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Name of the configuration directory under a project root.
pub const CONFIG_DIR: &str = ".macro-kit";

/// Loads all configuration from the `.macro-kit/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.macro-kit/` folder
///
/// # Returns
///
/// An `AppConfig` with everything that was found. Missing directories or
/// files yield defaults rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if a file exists but cannot be read or parsed.
///
/// # Example
///
/// ```rust,no_run
/// use mk_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} scenarios", config.scenarios.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let mk_dir = root.join(CONFIG_DIR);

    if !mk_dir.exists() {
        debug!(path = %mk_dir.display(), "No config directory, using defaults");
        return Ok(AppConfig::default());
    }

    let global = load_global_config(&mk_dir)?;
    let scenarios = load_scenarios(&mk_dir)?;

    Ok(AppConfig { global, scenarios })
}

fn load_global_config(mk_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = mk_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: config_path,
        source,
    })
}

fn load_scenarios(mk_dir: &Path) -> ConfigResult<Vec<Scenario>> {
    let scenarios_dir = mk_dir.join("scenarios");

    if !scenarios_dir.exists() {
        return Ok(Vec::new());
    }

    let mut scenarios = Vec::new();

    for entry in WalkDir::new(&scenarios_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: scenarios_dir.clone(),
            source,
        })?;

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let scenario: Scenario =
            serde_json::from_str(&content).map_err(|source| ConfigError::JsonParse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(name = %scenario.name, steps = scenario.steps.len(), "Loaded scenario");
        scenarios.push(scenario);
    }

    Ok(scenarios)
}
