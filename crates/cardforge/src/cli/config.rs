//! The `cardforge config` command for configuration management.

use cardforge_core::{resolve_providers, Config, LlmOverrides};
use clap::{Args, Subcommand};

use super::AppContext;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the provider chain resolved from config and environment
    Providers,
}

/// Execute the config command.
pub async fn execute(ctx: &AppContext, args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", ctx.config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", ctx.config_path.display());
        }

        ConfigCommand::Init { force } => {
            let path = &ctx.config_path;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, Config::default().to_toml()?)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }

        ConfigCommand::Providers => {
            let resolved =
                resolve_providers(&LlmOverrides::default(), &ctx.env, &ctx.config.llm)?;
            for (i, provider) in resolved.providers.iter().enumerate() {
                let role = if i == 0 { "primary" } else { "fallback" };
                println!(
                    "{role:<9} {:<18} {:<45} {}",
                    provider.kind.as_str(),
                    provider.model,
                    provider.base_url.as_deref().unwrap_or("-")
                );
            }
            println!(
                "\nmax_retries={} timeout={}ms retry_delay={}ms",
                resolved.retry.max_retries,
                resolved.timeout.as_millis(),
                resolved.retry.base_delay.as_millis()
            );
        }
    }

    Ok(())
}
