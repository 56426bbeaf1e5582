//! Role listing and creation.

use std::path::PathBuf;

use canvass_gateway::auth::{NewRole, RoleStore};

use super::open_auth;
use crate::ui;

/// Arguments for role commands.
pub struct RolesArgs {
    /// The role action to perform.
    pub action: RolesAction,
    /// Directory holding the account database.
    pub data_dir: PathBuf,
}

/// Role actions.
pub enum RolesAction {
    List,
    Create {
        name: String,
        localized_name: Option<String>,
        permissions: Vec<String>,
    },
}

/// Run the roles command.
///
/// # Errors
///
/// Returns error if the database cannot be opened, the input is invalid, or
/// the name is taken.
pub fn run_roles(args: RolesArgs) -> anyhow::Result<()> {
    let auth = open_auth(&args.data_dir)?;
    let roles = auth.authenticator.roles();

    let result = match args.action {
        RolesAction::List => list_roles(roles),
        RolesAction::Create {
            name,
            localized_name,
            permissions,
        } => create_role(
            roles,
            NewRole {
                name,
                localized_name,
                permissions,
            },
        ),
    };

    auth.close()?;
    result
}

fn list_roles(roles: &RoleStore) -> anyhow::Result<()> {
    ui::header("Roles");
    for role in roles.list()? {
        let permissions = role
            .permissions
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        ui::kv(
            &format!("{} ({})", role.name, role.localized_name),
            &permissions,
        );
    }
    Ok(())
}

fn create_role(roles: &RoleStore, input: NewRole) -> anyhow::Result<()> {
    let role = input.into_role()?;
    roles.create(&role)?;
    ui::success(&format!("Created role '{}'", role.name));
    Ok(())
}
