use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "bioscfg", version, about = "Remotely manage BIOS settings through server BMCs")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file. Defaults to ~/.bioscfg/config.toml, then ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[arg(long, global = true)]
    pub facility_code: Option<String>,

    /// Use the in-memory BMC simulator instead of real controllers.
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Task envelopes as JSON lines. `-` reads stdin.
    #[arg(long, default_value = "-")]
    pub tasks: String,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulateAction {
    ResetConfig,
    SetConfig,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SimulateArgs {
    /// Asset id to simulate. A random id is used when omitted.
    #[arg(long)]
    pub asset: Option<Uuid>,

    #[arg(long, value_enum)]
    pub action: SimulateAction,

    /// BIOS config URL, required for `set-config`.
    #[arg(long, required_if_eq("action", "set-config"))]
    pub url: Option<String>,

    /// Start the simulated server powered off.
    #[arg(long, default_value_t = false)]
    pub power_off: bool,

    /// Advance the simulator clock by this many seconds before printing.
    #[arg(long, default_value_t = 0)]
    pub elapsed_secs: i64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute task envelopes until the input is drained.
    Run(RunArgs),
    /// Run one task against the simulator and print the resulting server state.
    Simulate(SimulateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let args = Args::try_parse_from([
            "bioscfg",
            "run",
            "--tasks",
            "tasks.jsonl",
            "--dry-run",
            "--facility-code",
            "sandbox",
        ])
        .unwrap();
        assert!(args.dry_run);
        assert_eq!(args.facility_code.as_deref(), Some("sandbox"));
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.tasks, "tasks.jsonl");
    }

    #[test]
    fn set_config_requires_url() {
        let err = Args::try_parse_from(["bioscfg", "simulate", "--action", "set-config"]);
        assert!(err.is_err());

        let ok = Args::try_parse_from([
            "bioscfg",
            "simulate",
            "--action",
            "set-config",
            "--url",
            "https://configs.example/bios.json",
        ]);
        assert!(ok.is_ok());
    }
}
