//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// driplnk - storage layer for a link-in-bio service
#[derive(Parser)]
#[command(name = "driplnk")]
#[command(version)]
#[command(about = "Link-in-bio storage service", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Open storage and wait for Ctrl+C (default)
    Serve,

    /// Manage relational schema migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },

    /// Archive the KV data directory and upload it (store must be closed)
    Backup,

    /// Download the snapshot into the KV data directory (store must be closed)
    Restore,

    /// Check KV index consistency
    Check {
        /// Delete orphaned index entries
        #[arg(long)]
        repair: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Apply all pending migrations
    Up,

    /// Roll back applied migrations
    Down {
        /// Number of migrations to roll back (default: 1)
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },

    /// Show applied / pending migrations
    Status,
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_migrate_down_steps() {
        let cli = Cli::parse_from(["driplnk", "-c", "custom.toml", "migrate", "down", "--steps", "2"]);
        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
        match cli.command {
            Some(Commands::Migrate {
                action: MigrateCommands::Down { steps },
            }) => assert_eq!(steps, 2),
            _ => panic!("expected migrate down"),
        }
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::parse_from(["driplnk"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_check_repair_flag() {
        let cli = Cli::parse_from(["driplnk", "check", "--repair"]);
        assert!(matches!(cli.command, Some(Commands::Check { repair: true })));
    }
}
