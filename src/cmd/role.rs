use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use warden::store::factory::StoreFactory;
use warden::{Group, Permission, RoleRepo};

use super::{ActorArgs, Env};

/// Manage roles and their assignments.
#[derive(Args)]
pub struct RoleCommand {
    #[command(subcommand)]
    pub command: RoleCommands,
}

#[derive(Subcommand)]
pub enum RoleCommands {
    /// Create a role with its permissions.
    Create {
        /// Role name, unique in the store.
        name: String,

        /// Permission granted by the role, formatted as "ACTION:PATTERN". Can
        /// be repeated.
        #[arg(short, long)]
        permission: Vec<Permission>,
    },

    /// Delete a role together with its permissions and assignments.
    Delete { name: String },

    /// List role names.
    List,

    /// List the permissions of a role.
    Permissions { name: String },

    /// Assign a role to an actor.
    Assign {
        name: String,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Remove a role from an actor.
    Unassign {
        name: String,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Assign a role to a group.
    AssignGroup {
        name: String,

        #[arg(long, short)]
        group: String,
    },

    /// Remove a role from a group.
    UnassignGroup {
        name: String,

        #[arg(long, short)]
        group: String,
    },

    /// Check whether an actor or a group holds a role.
    Has(HasArgs),
}

#[derive(Args)]
pub struct HasArgs {
    name: String,

    #[arg(long, requires = "namespace", conflicts_with = "group")]
    actor: Option<String>,

    #[arg(long, short, requires = "actor")]
    namespace: Option<String>,

    #[arg(long, short)]
    group: Option<String>,
}

impl RoleCommand {
    pub fn run(&self, env: &Env) -> Result<()> {
        let store = StoreFactory::new().build_store(&env.ctx, &env.log, &env.db)?;
        let ctx = &env.ctx;
        let log = &env.log;

        match &self.command {
            RoleCommands::Create { name, permission } => {
                let role = store.create_role(ctx, log, name, permission)?;
                println!(
                    "Role '{}' created with {} permissions",
                    role.name,
                    role.permissions.len()
                );
            }
            RoleCommands::Delete { name } => {
                store.delete_role(ctx, log, name)?;
                println!("Role '{name}' deleted");
            }
            RoleCommands::List => {
                for name in store.list_roles(ctx, log)? {
                    println!("{name}");
                }
            }
            RoleCommands::Permissions { name } => {
                for permission in store.list_role_permissions(ctx, log, name)? {
                    println!("{permission}");
                }
            }
            RoleCommands::Assign { name, actor } => {
                store.assign_role(ctx, log, name, &actor.actor())?;
                println!("Role '{name}' assigned to {}", actor.actor());
            }
            RoleCommands::Unassign { name, actor } => {
                store.unassign_role(ctx, log, name, &actor.actor())?;
                println!("Role '{name}' unassigned from {}", actor.actor());
            }
            RoleCommands::AssignGroup { name, group } => {
                store.assign_role_to_group(ctx, log, name, &Group::new(group))?;
                println!("Role '{name}' assigned to group {group}");
            }
            RoleCommands::UnassignGroup { name, group } => {
                store.unassign_role_from_group(ctx, log, name, &Group::new(group))?;
                println!("Role '{name}' unassigned from group {group}");
            }
            RoleCommands::Has(args) => {
                let has = match (&args.actor, &args.namespace, &args.group) {
                    (Some(id), Some(namespace), None) => {
                        let actor = ActorArgs {
                            actor: id.clone(),
                            namespace: namespace.clone(),
                        };
                        store.has_role(ctx, log, &args.name, &actor.actor())?
                    }
                    (None, None, Some(group)) => {
                        store.has_role_for_group(ctx, log, &args.name, &Group::new(group))?
                    }
                    _ => bail!("either --actor with --namespace, or --group is required"),
                };
                println!("{has}");
            }
        }
        Ok(())
    }
}
