use anyhow::{bail, Result};
use chrono::{Local, TimeZone};
use clap::{Args, Subcommand};
use warden::store::config::DbType;
use warden::store::factory::StoreFactory;
use warden::SqlStore;

use super::Env;

/// Manage the relational schema.
#[derive(Args)]
pub struct MigrateCommand {
    #[command(subcommand)]
    pub command: MigrateCommands,
}

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Apply every pending migration.
    Up,

    /// Roll back the latest applied migration.
    Down {
        /// Roll back every applied migration.
        #[arg(long)]
        all: bool,
    },

    /// Check that the applied migrations match the known list.
    Verify,

    /// Show every known migration and when it was applied.
    Status,
}

impl MigrateCommand {
    pub fn run(&self, env: &Env) -> Result<()> {
        let store = open(env)?;
        let log = env.log.with("ledger", &env.db.ledger_table);

        match self.command {
            MigrateCommands::Up => {
                let count = store.apply_migrations(&env.ctx, &log)?;
                println!("Applied {count} migrations");
            }
            MigrateCommands::Down { all } => {
                let count = store.rollback_migrations(&env.ctx, &log, all)?;
                println!("Rolled back {count} migrations");
            }
            MigrateCommands::Verify => {
                store.verify_migrations(&env.ctx, &log)?;
                println!("Migrations are up to date");
            }
            MigrateCommands::Status => {
                for status in store.migration_status()? {
                    let applied = match status.applied_at {
                        Some(ts) => format_time(ts),
                        None => String::from("pending"),
                    };
                    println!("{:>4}  {:<40}  {applied}", status.version, status.name);
                }
            }
        }
        Ok(())
    }
}

fn open(env: &Env) -> Result<SqlStore> {
    if let DbType::Memory = env.db.backend {
        bail!("the memory backend has no schema to migrate");
    }
    StoreFactory::new().build_unmigrated(&env.db)
}

fn format_time(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}
