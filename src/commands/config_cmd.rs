use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        let mut value = serde_json::to_value(config)?;
                        if let Some(fields) = value.as_object_mut() {
                            fields.insert("api_secret".to_string(), secret_summary(config).into());
                        }
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!(
                            "database_path: {}",
                            config.database_path.value.display()
                        );
                        println!("  source: {}", config.database_path.source);
                        println!();

                        println!("host: {}", config.host.value);
                        println!("  source: {}", config.host.source);
                        println!();

                        println!("port: {}", config.port.value);
                        println!("  source: {}", config.port.source);
                        println!();

                        println!("api_secret: {}", secret_summary(config));
                        println!("  source: {}", config.api_secret.source);
                        println!();

                        println!("router_capacity: {}", config.router_capacity.value);
                        println!("  source: {}", config.router_capacity.source);
                    }
                }
                Ok(())
            }
        }
    }
}

/// The secret itself is never printed.
fn secret_summary(config: &Config) -> &'static str {
    match config.api_secret.value {
        Some(_) => "********",
        None => "(not set)",
    }
}
