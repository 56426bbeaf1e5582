//! Canvass CLI - run the gateway and manage accounts.

mod commands;
mod ui;

use std::path::PathBuf;

use canvass_core::{Config, LogFormat};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "canvass")]
#[command(about = "Canvass - campaign workspace server")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $CANVASS_STATE_DIR/canvass.json)
    #[arg(long, global = true, env = "CANVASS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Start even if the port looks busy
        #[arg(long)]
        force: bool,
    },

    /// Check whether the gateway is up
    Status,

    /// User account management
    Admin {
        #[command(subcommand)]
        action: AdminCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },

    /// Role management
    Roles {
        #[command(subcommand)]
        action: RoleCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a new user
    Create {
        /// Login email
        #[arg(long)]
        email: String,

        /// Password (prompted for when omitted)
        #[arg(long, env = "CANVASS_NEW_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Role name
        #[arg(long, default_value = "admin")]
        role: String,

        /// Display name
        #[arg(long)]
        display_name: Option<String>,

        /// Generate a random password
        #[arg(long, conflicts_with = "password")]
        generate_password: bool,
    },

    /// List all users
    List,

    /// Reset a user's password
    ResetPassword {
        /// Email of the user
        #[arg(long)]
        email: String,

        /// Prompt for the new password instead of generating one
        #[arg(long)]
        prompt: bool,
    },

    /// Enable a user account
    Enable {
        /// Email of the user
        #[arg(long)]
        email: String,
    },

    /// Disable a user account
    Disable {
        /// Email of the user
        #[arg(long)]
        email: String,
    },

    /// Delete a user
    Delete {
        /// Email of the user to delete
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum RoleCommands {
    /// List roles and their permissions
    List,

    /// Create a role
    Create {
        /// Machine name
        #[arg(long)]
        name: String,

        /// Display name
        #[arg(long)]
        localized_name: Option<String>,

        /// Granted permissions, comma separated
        #[arg(long, value_delimiter = ',')]
        permissions: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate configuration
    Validate,
}

fn init_logging(verbose: bool, config: &Config) {
    let level = if verbose || config.settings.debug {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json = config.settings.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_target(false)))
        .with((!json).then(|| fmt::layer().with_target(false)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A broken config file is reported by the command itself.
    let config = commands::load_config(cli.config.as_deref()).unwrap_or_default();
    init_logging(cli.verbose, &config);
    tracing::debug!(data_dir = %config.data_dir().display(), "Configuration loaded");

    let Some(command) = cli.command else {
        ui::banner();
        commands::run_status(cli.config.as_deref()).await?;
        ui::info("Run 'canvass --help' for all commands.");
        return Ok(());
    };

    match command {
        Commands::Serve { port, bind, force } => {
            let args = commands::serve::ServeArgs {
                config_path: cli.config,
                port,
                bind,
                force,
            };
            commands::run_serve(args).await?;
        }

        Commands::Status => {
            commands::run_status(cli.config.as_deref()).await?;
        }

        Commands::Admin { action, data_dir } => {
            let args = commands::admin::AdminArgs {
                action: match action {
                    AdminCommands::Create {
                        email,
                        password,
                        role,
                        display_name,
                        generate_password,
                    } => commands::admin::AdminAction::Create {
                        email,
                        password,
                        role,
                        display_name,
                        generate_password,
                    },
                    AdminCommands::List => commands::admin::AdminAction::List,
                    AdminCommands::ResetPassword { email, prompt } => {
                        commands::admin::AdminAction::ResetPassword { email, prompt }
                    }
                    AdminCommands::Enable { email } => {
                        commands::admin::AdminAction::Enable { email }
                    }
                    AdminCommands::Disable { email } => {
                        commands::admin::AdminAction::Disable { email }
                    }
                    AdminCommands::Delete { email } => {
                        commands::admin::AdminAction::Delete { email }
                    }
                },
                data_dir: data_dir.unwrap_or_else(|| config.data_dir()),
            };
            commands::run_admin(args).await?;
        }

        Commands::Roles { action, data_dir } => {
            let args = commands::roles::RolesArgs {
                action: match action {
                    RoleCommands::List => commands::roles::RolesAction::List,
                    RoleCommands::Create {
                        name,
                        localized_name,
                        permissions,
                    } => commands::roles::RolesAction::Create {
                        name,
                        localized_name,
                        permissions,
                    },
                },
                data_dir: data_dir.unwrap_or_else(|| config.data_dir()),
            };
            commands::run_roles(args)?;
        }

        Commands::Config { action } => {
            let args = commands::config::ConfigArgs {
                path: cli.config,
                validate: matches!(action, Some(ConfigCommands::Validate)),
            };
            commands::run_config(&args)?;
        }
    }

    Ok(())
}
