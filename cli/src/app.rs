//! Config assembly for the binary: file, environment, then flags.
use bioscfg_core::config::{self, AppConfig};
use bioscfg_core::error::CliError;

use crate::commands::cli::{Args, Commands};

/// Facility code used by `simulate` when none is configured.
pub const SIMULATOR_FACILITY: &str = "simulator";

pub fn apply_cli_overrides(cfg: &mut AppConfig, args: &Args) {
    if let Some(level) = args.log_level.as_deref().filter(|s| !s.trim().is_empty()) {
        cfg.logging.level = level.to_string();
    }
    if let Some(code) = args.facility_code.as_deref().filter(|s| !s.trim().is_empty()) {
        cfg.facility_code = code.to_string();
    }
    if args.dry_run {
        cfg.dry_run = true;
    }

    if matches!(args.command, Commands::Simulate(_)) {
        cfg.dry_run = true;
        if cfg.facility_code.trim().is_empty() {
            cfg.facility_code = SIMULATOR_FACILITY.to_string();
        }
    }
}

pub fn load_config(args: &Args) -> Result<AppConfig, CliError> {
    let mut cfg =
        config::load(args.config.as_deref()).map_err(|e| CliError::Config(format!("{e:#}")))?;
    apply_cli_overrides(&mut cfg, args);
    cfg.normalize()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(cfg)
}
