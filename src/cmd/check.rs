use anyhow::Result;
use clap::Args;
use warden::store::factory::StoreFactory;
use warden::{Action, PermissionRepo};

use super::{Env, PrincipalArgs};

/// Check whether an actor may perform an action on a resource pattern.
#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub principal: PrincipalArgs,

    pub action: String,

    pub resource_pattern: String,
}

impl CheckArgs {
    pub fn run(&self, env: &Env) -> Result<()> {
        let store = StoreFactory::new().build_store(&env.ctx, &env.log, &env.db)?;
        let allowed = store.has_permission(
            &env.ctx,
            &env.log,
            &self.principal.actor.actor(),
            &self.principal.groups(),
            &Action::new(&self.action),
            &self.resource_pattern,
        )?;
        println!("{}", if allowed { "allowed" } else { "denied" });
        Ok(())
    }
}

/// List the resource patterns an actor may perform an action on.
#[derive(Args)]
pub struct PatternsArgs {
    #[command(flatten)]
    pub principal: PrincipalArgs,

    pub action: String,
}

impl PatternsArgs {
    pub fn run(&self, env: &Env) -> Result<()> {
        let store = StoreFactory::new().build_store(&env.ctx, &env.log, &env.db)?;
        let mut patterns = store.list_resource_patterns(
            &env.ctx,
            &env.log,
            &self.principal.actor.actor(),
            &self.principal.groups(),
            &Action::new(&self.action),
        )?;
        patterns.sort();
        for pattern in patterns {
            println!("{pattern}");
        }
        Ok(())
    }
}
