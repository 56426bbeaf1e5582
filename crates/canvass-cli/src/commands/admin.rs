//! Account management against the local database.

use std::path::PathBuf;

use anyhow::{Context, bail};
use canvass_core::RoleId;
use canvass_core::validation::{normalize_email, validate_password};
use canvass_gateway::auth::setup::generate_password;
use canvass_gateway::auth::{ActivityAction, NewUser};
use canvass_gateway::{User, UserStore};

use super::open_auth;
use crate::ui;

const GENERATED_PASSWORD_LEN: usize = 16;

/// Arguments for admin commands.
pub struct AdminArgs {
    /// The admin action to perform.
    pub action: AdminAction,
    /// Directory holding the account database.
    pub data_dir: PathBuf,
}

/// Admin actions.
pub enum AdminAction {
    Create {
        email: String,
        password: Option<String>,
        role: String,
        display_name: Option<String>,
        generate_password: bool,
    },
    List,
    ResetPassword {
        email: String,
        prompt: bool,
    },
    Enable {
        email: String,
    },
    Disable {
        email: String,
    },
    Delete {
        email: String,
    },
}

/// Run the admin command.
///
/// # Errors
///
/// Returns error if the database cannot be opened or the operation fails.
pub async fn run_admin(args: AdminArgs) -> anyhow::Result<()> {
    let auth = open_auth(&args.data_dir)?;

    let result = match args.action {
        AdminAction::Create {
            email,
            password,
            role,
            display_name,
            generate_password,
        } => {
            let password = choose_password(password, generate_password)?;
            let role = auth
                .authenticator
                .roles()
                .get_by_name(&role)?
                .with_context(|| format!("Unknown role '{role}'. See 'canvass roles list'"))?;

            let identity = auth
                .authenticator
                .create_user(NewUser {
                    email,
                    password,
                    username: None,
                    display_name,
                    phone: None,
                    avatar: None,
                    role_id: Some(role.id),
                })
                .await?;

            auth.activity.note(
                None,
                ActivityAction::UserCreated,
                format!("{} created from the command line", identity.email),
            );
            ui::success(&format!(
                "Created '{}' with role '{}'",
                identity.email, identity.role.name
            ));
            Ok(())
        }
        AdminAction::List => list_users(&auth),
        AdminAction::ResetPassword { email, prompt } => {
            reset_password(auth.authenticator.users(), &email, prompt)
        }
        AdminAction::Enable { email } => set_active(auth.authenticator.users(), &email, true),
        AdminAction::Disable { email } => set_active(auth.authenticator.users(), &email, false),
        AdminAction::Delete { email } => delete_user(auth.authenticator.users(), &email),
    };

    auth.close()?;
    result
}

fn choose_password(given: Option<String>, generate: bool) -> anyhow::Result<String> {
    if generate {
        let password = generate_password(GENERATED_PASSWORD_LEN);
        ui::success(&format!("Generated password: {password}"));
        return Ok(password);
    }

    let password = match given {
        Some(password) => password,
        None => ui::new_password("Password")?,
    };
    validate_password(&password)?;
    Ok(password)
}

fn find(users: &UserStore, email: &str) -> anyhow::Result<User> {
    users
        .get_by_email(&normalize_email(email))?
        .with_context(|| format!("No user with email '{email}'"))
}

fn list_users(auth: &canvass_gateway::AuthState) -> anyhow::Result<()> {
    let users = auth.authenticator.users().list()?;

    if users.is_empty() {
        ui::info("No users yet.");
        ui::info("Create one with: canvass admin create --email you@example.org --generate-password");
        return Ok(());
    }

    let roles = auth.authenticator.roles().list()?;
    let role_name = |id: &RoleId| {
        roles
            .iter()
            .find(|r| &r.id == id)
            .map_or("?", |r| r.name.as_str())
    };

    ui::info(&format!("Users ({}):", users.len()));
    println!();
    ui::table_row(&[
        ("EMAIL", 32),
        ("NAME", 20),
        ("ROLE", 12),
        ("ACTIVE", 8),
        ("LAST LOGIN", 20),
    ]);
    println!("{}", "-".repeat(92));

    for user in &users {
        let last_login = user.last_login.map_or_else(
            || "never".to_string(),
            |t| t.format("%Y-%m-%d %H:%M").to_string(),
        );
        ui::table_row(&[
            (user.email.as_str(), 32),
            (user.display_name.as_str(), 20),
            (role_name(&user.role_id), 12),
            (if user.active { "yes" } else { "no" }, 8),
            (last_login.as_str(), 20),
        ]);
    }

    Ok(())
}

fn reset_password(users: &UserStore, email: &str, prompt: bool) -> anyhow::Result<()> {
    let mut user = find(users, email)?;
    let password = choose_password(None, !prompt)?;

    user.set_password(&password)?;
    users.update(&user)?;

    ui::success(&format!("Password reset for '{}'", user.email));
    Ok(())
}

fn set_active(users: &UserStore, email: &str, active: bool) -> anyhow::Result<()> {
    let mut user = find(users, email)?;

    if !active && is_last_admin(users, &user)? {
        bail!("Refusing to disable the last active admin");
    }

    user.active = active;
    users.update(&user)?;

    let status = if active { "enabled" } else { "disabled" };
    ui::success(&format!("User '{}' {status}", user.email));
    Ok(())
}

fn delete_user(users: &UserStore, email: &str) -> anyhow::Result<()> {
    let user = find(users, email)?;

    if is_last_admin(users, &user)? {
        bail!("Refusing to delete the last active admin");
    }
    if !ui::confirm(&format!("Delete '{}'?", user.email))? {
        ui::info("Cancelled");
        return Ok(());
    }

    users.delete(&user.id)?;
    ui::success(&format!("Deleted user '{}'", user.email));
    Ok(())
}

fn is_last_admin(users: &UserStore, user: &User) -> anyhow::Result<bool> {
    let admin = RoleId::admin();
    if user.role_id != admin || !user.active {
        return Ok(false);
    }

    let active_admins = users
        .list()?
        .iter()
        .filter(|u| u.role_id == admin && u.active)
        .count();
    Ok(active_admins <= 1)
}
