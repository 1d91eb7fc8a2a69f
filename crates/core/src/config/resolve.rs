//! Resolution of the helper program launched by the orchestrator.

use anyhow::{Context, Result};
use mk_protocol::config_models::GlobalConfig;
use std::path::PathBuf;

/// Environment variable naming an alternative helper program.
pub const HELPER_ENV: &str = "MACRO_KIT_HELPER";

/// Program and arguments used to start the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Resolve the helper command.
///
/// Checks in the following order:
/// 1. `helper_command` from `config.toml` (split on whitespace)
/// 2. `MACRO_KIT_HELPER` environment variable, if it names a program in PATH
/// 3. The current executable with the `helper` subcommand
pub fn resolve_helper_command(config: &GlobalConfig) -> Result<HelperCommand> {
    if let Some(command) = resolve_configured(config, std::env::var(HELPER_ENV).ok()) {
        return Ok(command);
    }

    let exe = std::env::current_exe().context("Failed to locate the current executable")?;
    Ok(HelperCommand {
        program: exe,
        args: vec!["helper".to_string()],
    })
}

fn resolve_configured(config: &GlobalConfig, env_value: Option<String>) -> Option<HelperCommand> {
    if let Some(command) = config.helper_command.as_deref().and_then(split_command) {
        return Some(command);
    }

    let cmd = env_value?;
    let program = which::which(cmd.trim()).ok()?;
    Some(HelperCommand {
        program,
        args: Vec::new(),
    })
}

fn split_command(command: &str) -> Option<HelperCommand> {
    let mut parts = command.split_whitespace();
    let program = PathBuf::from(parts.next()?);
    Some(HelperCommand {
        program,
        args: parts.map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_command_wins() {
        let config = GlobalConfig {
            helper_command: Some("/opt/mk/helper --verbose".to_string()),
            ..GlobalConfig::default()
        };

        let command = resolve_configured(&config, Some("sh".to_string())).unwrap();
        assert_eq!(command.program, PathBuf::from("/opt/mk/helper"));
        assert_eq!(command.args, vec!["--verbose".to_string()]);
    }

    #[test]
    fn test_blank_configured_command_is_ignored() {
        let config = GlobalConfig {
            helper_command: Some("   ".to_string()),
            ..GlobalConfig::default()
        };
        assert_eq!(resolve_configured(&config, None), None);
    }

    #[test]
    fn test_env_command_must_exist() {
        let config = GlobalConfig::default();
        assert_eq!(
            resolve_configured(&config, Some("definitely-not-a-real-helper-binary".to_string())),
            None
        );
    }

    #[test]
    fn test_falls_back_to_current_executable() {
        let config = GlobalConfig::default();
        if std::env::var(HELPER_ENV).is_ok() {
            return;
        }
        let command = resolve_helper_command(&config).unwrap();
        assert_eq!(command.args, vec!["helper".to_string()]);
    }
}
