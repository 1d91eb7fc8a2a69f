//! Aggregated configuration loaded from `.macro-kit/`.

use mk_protocol::config_models::GlobalConfig;
use mk_protocol::scenario_models::Scenario;

/// Unified application configuration.
///
/// - `config.toml`: Global settings
/// - `scenarios/*.json`: Scenarios to import into a store
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub global: GlobalConfig,

    /// Scenarios in file-name order.
    pub scenarios: Vec<Scenario>,
}
