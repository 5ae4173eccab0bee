use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use sar_engine::sample::sample_case;
use sar_engine::EngineConfig;
use sar_server::{SarServer, ServerConfig};

use crate::cli::*;
use crate::demo;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Demo(args) => demo::run(args, cli.format).await,
        Command::Serve(args) => cmd_serve(args).await,
        Command::Config(args) => cmd_config(args, cli.format),
    }
}

/// Engine configuration from `path`, or the defaults.
pub fn load_engine_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading engine configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    // Fail on a bad file before binding.
    load_engine_config(args.config.as_deref())?;
    let server = SarServer::new(ServerConfig {
        bind_addr: args.bind,
        engine_config: args.config,
    })?;

    if args.seed {
        let case = server.engine().create_case(sample_case()).await?;
        println!("{} Seeded case {}", "✓".green(), case.id.to_string().yellow());
    }
    println!(
        "{} SAR case server on {}",
        "✓".green().bold(),
        args.bind.to_string().bold()
    );
    server.serve().await?;
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_engine_config(args.path.as_deref())?;
    match format {
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}
