//! CLI argument definitions using clap.
//!
//! ## Commands
//!
//! - `generate`: Generate wiring code for every package folder
//! - `check`: Parse and validate directives without writing anything
//! - `clean`: Remove generated files and cache manifests
//! - `init`: Initialize wiregen configuration file

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Arguments {
    /// Check if a command was provided, otherwise print help and return None.
    pub fn with_command_or_help(self) -> Option<Self> {
        if self.command.is_none() {
            Self::command().print_help().ok();
            None
        } else {
            Some(self)
        }
    }

    /// Get the verbose flag from the command's common args.
    pub fn verbose(&self) -> bool {
        match &self.command {
            Some(Command::Generate(cmd)) => cmd.common.verbose,
            Some(Command::Check(cmd)) => cmd.common.verbose,
            Some(Command::Clean(cmd)) => cmd.common.verbose,
            Some(Command::Init) | None => false,
        }
    }
}

/// Common arguments shared by all commands.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Project directory to process
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Generated file name (overrides config file)
    #[arg(long)]
    pub output_file: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct GenerateCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Ignore the cache and regenerate every folder
    #[arg(long)]
    pub force: bool,

    /// Report what would change without writing files
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct CheckCommand {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct CleanCommand {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate wiring code from @Service, @Router, @Inject, @Config and @Route directives
    Generate(GenerateCommand),
    /// Validate directives without writing anything
    Check(CheckCommand),
    /// Remove generated files and cache manifests
    Clean(CleanCommand),
    /// Initialize a new .wiregenrc.json configuration file
    Init,
}
