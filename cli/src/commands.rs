//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for tactica
#[derive(Parser, Debug)]
#[command(name = "tactica")]
#[command(author, version, about = "Mod loader and battle script runner")]
#[command(long_about = r#"
Tactica loads Lua mod packages (characters, players, shared libraries and mobs)
into sandboxed script environments and runs their battle hooks.

Content is read from the mods root:
  <mods_root>/libs/<name>/entry.lua      shared libraries
  <mods_root>/enemies/<name>/entry.lua   characters
  <mods_root>/players/<name>/entry.lua   players
  <mods_root>/mobs/<name>/entry.lua      mobs

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./tactica.toml      Project-level config
3. ~/.config/tactica/config.toml   Global config

Example:
  tactica check --mods ./mods
  tactica spawn mods/mobs/arena --frames 30
  tactica api
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Override the mods root from the config file
    #[arg(long, global = true, value_name = "DIR")]
    pub mods: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load every package and report failures and dependencies
    Check,

    /// Load every package, spawn a mob onto an empty field and step it
    Spawn {
        /// Directory of the mob package
        mob: PathBuf,

        /// Frames to simulate after spawning
        #[arg(short, long, default_value_t = 60)]
        frames: u32,

        /// Field width in tiles
        #[arg(long, default_value_t = 6)]
        width: i64,

        /// Field height in tiles
        #[arg(long, default_value_t = 3)]
        height: i64,
    },

    /// List every type, function and enum exposed to scripts
    Api,

    /// Show configuration file locations and exit
    ShowConfig,
}
