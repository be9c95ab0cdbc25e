mod check;
mod migrate;
mod role;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use warden::config::{CommonConfig, Config, PathSet};
use warden::store::config::DbConfig;
use warden::{logs, Actor, Context, Group, Logger};

#[derive(Parser)]
#[command(author, version, about)]
pub struct App {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub commands: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Migrate(migrate::MigrateCommand),
    Role(role::RoleCommand),
    Check(check::CheckArgs),
    Patterns(check::PatternsArgs),
}

#[derive(Args, Clone)]
pub struct ConfigArgs {
    /// Path to the config file. Defaults to `$WARDEN_CONFIG`, then
    /// `~/.config/warden/warden.toml`.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Directory for the default database file. Defaults to `$WARDEN_DATA`,
    /// then `~/.local/share/warden`.
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Override the log level from the config file.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<Config> {
        let ps = PathSet::new(self.config.clone(), self.data.clone())?;
        let mut cfg: Config = ps.load_config(<Config as CommonConfig>::default)?;
        if let Some(level) = &self.log_level {
            cfg.logs.level = level.clone();
        }
        Ok(cfg)
    }
}

/// Identifies one actor on the command line.
#[derive(Args, Clone)]
pub struct ActorArgs {
    /// Actor id, unique within its namespace.
    #[arg(long)]
    pub actor: String,

    /// Actor namespace.
    #[arg(long, short)]
    pub namespace: String,
}

impl ActorArgs {
    fn actor(&self) -> Actor {
        Actor::new(&self.actor, &self.namespace)
    }
}

/// Identifies an actor and the groups it belongs to.
#[derive(Args, Clone)]
pub struct PrincipalArgs {
    #[command(flatten)]
    pub actor: ActorArgs,

    /// Group the actor belongs to, can be repeated.
    #[arg(long, short)]
    pub group: Vec<String>,
}

impl PrincipalArgs {
    fn groups(&self) -> Vec<Group> {
        self.group.iter().map(Group::new).collect()
    }
}

/// What every command gets to work with.
pub struct Env {
    pub ctx: Context,
    pub log: Logger,
    pub db: DbConfig,
}

impl App {
    pub async fn run(self) -> Result<()> {
        let cfg = self.config.load()?;
        logs::init(&cfg.logs.level)?;
        debug!("Use config: {:?}", cfg);

        let ctx = Context::background();
        let interrupt = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        });

        let env = Env {
            ctx,
            log: Logger::new(),
            db: cfg.db,
        };
        match self.commands {
            Commands::Migrate(cmd) => blocking(move || cmd.run(&env)).await,
            Commands::Role(cmd) => blocking(move || cmd.run(&env)).await,
            Commands::Check(args) => blocking(move || args.run(&env)).await,
            Commands::Patterns(args) => blocking(move || args.run(&env)).await,
        }
    }
}

/// Store calls block on the database, so commands run off the async runtime.
async fn blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("join command task")?
}
