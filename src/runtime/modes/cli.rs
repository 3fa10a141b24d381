//! CLI mode
//!
//! One-shot maintenance commands. Each opens what it needs and closes it
//! before returning.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::{Commands, ConfigCommands, MigrateCommands};
use crate::config::StaticConfig;
use crate::snapshot::{RestoreOutcome, SnapshotOrchestrator};
use crate::storage::backend::{
    MigrationOutcome, apply_migrations, migration_status, rollback_migrations,
};
use crate::storage::{BackendKind, KvStorage, SeaOrmStorage};

pub async fn run_cli(command: Commands, config: &StaticConfig) -> Result<()> {
    match command {
        Commands::Serve => super::run_serve(config).await,
        Commands::Migrate { action } => run_migrate(action, config).await,
        Commands::Backup => run_backup(config).await,
        Commands::Restore => run_restore(config).await,
        Commands::Check { repair } => run_check(repair, config).await,
        Commands::Config { action } => run_config(action),
    }
}

async fn run_migrate(action: MigrateCommands, config: &StaticConfig) -> Result<()> {
    let BackendKind::Relational(backend) = BackendKind::resolve(&config.database)? else {
        bail!("migrate requires a relational backend (set database.url)");
    };

    let storage = SeaOrmStorage::connect(&config.database, &backend)
        .await
        .context("Failed to connect to database")?;
    let db = storage.get_db();

    match action {
        MigrateCommands::Up => {
            let outcome = apply_migrations(db).await?;
            println!("{}", outcome);
        }
        MigrateCommands::Down { steps } => {
            let outcome = rollback_migrations(db, Some(steps)).await?;
            match outcome {
                MigrationOutcome::Applied(versions) => {
                    println!("rolled back {} migration(s): {}", versions.len(), versions.join(", "))
                }
                MigrationOutcome::NoChange => println!("nothing to roll back"),
            }
        }
        MigrateCommands::Status => {
            for state in migration_status(db).await? {
                let mark = if state.applied { "applied" } else { "pending" };
                println!("{:<8} {}", mark, state.version);
            }
        }
    }

    storage.close().await?;
    Ok(())
}

async fn snapshot_for(config: &StaticConfig) -> Result<SnapshotOrchestrator> {
    if !matches!(BackendKind::resolve(&config.database)?, BackendKind::Kv) {
        bail!("snapshots only apply to the KV backend");
    }
    SnapshotOrchestrator::from_config(&config.snapshot)
        .await
        .context("Failed to create snapshot object store")
}

async fn run_backup(config: &StaticConfig) -> Result<()> {
    let orchestrator = snapshot_for(config).await?;
    let path = config.kv.store_path();
    orchestrator.backup(&path).await?;
    println!("backed up {} to {}", path.display(), orchestrator.key());
    Ok(())
}

async fn run_restore(config: &StaticConfig) -> Result<()> {
    let orchestrator = snapshot_for(config).await?;
    let path = config.kv.store_path();
    match orchestrator.restore(&path).await? {
        RestoreOutcome::Restored { files } => {
            println!("restored {} files into {}", files, path.display())
        }
        RestoreOutcome::FreshInstall => println!("no snapshot found, nothing restored"),
    }
    Ok(())
}

async fn run_check(repair: bool, config: &StaticConfig) -> Result<()> {
    if !matches!(BackendKind::resolve(&config.database)?, BackendKind::Kv) {
        bail!("check only applies to the KV backend");
    }

    let kv = KvStorage::from_config(&config.kv).context("Failed to open KV store")?;
    let report = kv.check_consistency(repair).await?;
    kv.flush().await?;

    println!("scanned {} index entries", report.scanned);
    if report.is_clean() {
        println!("no orphaned entries");
        return Ok(());
    }
    for key in &report.orphans {
        println!("orphan: {}", key);
    }
    if report.repaired {
        println!("removed {} orphaned entries", report.orphans.len());
    } else {
        println!("{} orphaned entries (run with --repair to remove)", report.orphans.len());
    }
    Ok(())
}

fn run_config(action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Generate { output_path, force } => {
            let path = output_path.unwrap_or_else(|| "config.example.toml".to_string());
            if Path::new(&path).exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path);
            }
            std::fs::write(&path, StaticConfig::generate_sample_config())
                .with_context(|| format!("Failed to write {}", path))?;
            println!("sample configuration written to {}", path);
            Ok(())
        }
    }
}
