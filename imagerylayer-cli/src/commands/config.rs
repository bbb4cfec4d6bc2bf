//! Configuration management CLI commands.
//!
//! Provides `config path`, `config list` and `config init`.

use std::path::Path;

use clap::Subcommand;
use imagerylayer::config::{config_file_path, ConfigFile};

use super::common::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// List all configuration settings
    List,

    /// Write a config file with default values if none exists
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(config_path),
        ConfigCommands::List => run_list(config_path),
        ConfigCommands::Init => run_init(config_path),
    }
}

/// Show the configuration file path.
fn run_path(config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path.map_or_else(config_file_path, Path::to_path_buf);
    println!("{}", path.display());
    Ok(())
}

/// List all configuration settings.
fn run_list(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = String::new();
    for (name, value) in config.entries() {
        let (section, key) = name.split_once('.').unwrap_or(("", name.as_str()));

        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section.to_string();
        }

        if value.is_empty() {
            println!("  {} = (not set)", key);
        } else {
            println!("  {} = {}", key, value);
        }
    }

    Ok(())
}

/// Create the config file with defaults.
fn run_init(config_path: Option<&Path>) -> Result<(), CliError> {
    let path = match config_path {
        Some(path) => {
            if !path.exists() {
                ConfigFile::default().save_to(path)?;
            }
            path.to_path_buf()
        }
        None => ConfigFile::ensure_exists()?,
    };
    println!("Config file: {}", path.display());
    Ok(())
}
