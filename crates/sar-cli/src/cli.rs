use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sar",
    about = "SAR case workflow engine: investigation, narrative and filing",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the SAR-2023-001 investigation end to end
    Demo(DemoArgs),
    /// Start the HTTP API
    Serve(ServeArgs),
    /// Print the engine configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct DemoArgs {
    /// Escalate the case while the drafting stage is outstanding
    #[arg(long)]
    pub escalate_mid_draft: bool,

    /// Simulated narrative generation latency
    #[arg(long, default_value_t = 400)]
    pub draft_delay_ms: u64,

    /// Analyst recorded on human actions
    #[arg(long, default_value = "Sarah Jenkins")]
    pub analyst: String,

    /// Engine configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Engine configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed the sample case on startup
    #[arg(long)]
    pub seed: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Load and validate this file instead of printing the defaults
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_demo() {
        let cli = Cli::try_parse_from(["sar", "demo"]).unwrap();
        if let Command::Demo(args) = cli.command {
            assert!(!args.escalate_mid_draft);
            assert_eq!(args.draft_delay_ms, 400);
            assert_eq!(args.analyst, "Sarah Jenkins");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_demo_escalate() {
        let cli = Cli::try_parse_from(["sar", "demo", "--escalate-mid-draft", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        if let Command::Demo(args) = cli.command {
            assert!(args.escalate_mid_draft);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["sar", "serve", "--bind", "0.0.0.0:9000", "--config", "engine.toml"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind.port(), 9000);
            assert_eq!(args.config, Some(PathBuf::from("engine.toml")));
            assert!(!args.seed);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_config() {
        let cli = Cli::try_parse_from(["sar", "config"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigArgs { path: None })));
    }

    #[test]
    fn bad_bind_address_rejected() {
        assert!(Cli::try_parse_from(["sar", "serve", "--bind", "nowhere"]).is_err());
    }
}
