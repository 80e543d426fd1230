//! WoodMoon CLI - Storefront session and cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in against the backend (WOODMOON_API_BASE_URL)
//! woodmoon login -e buyer@example.com -p 'hunter22'
//!
//! # Manage the cart
//! woodmoon cart add --id 12 --name "Teak Stool" --price 4500 --color walnut -q 2
//! woodmoon cart list
//! woodmoon cart remove --id 12 --color walnut
//!
//! # Sign out (also empties the cart)
//! woodmoon logout
//! ```
//!
//! State is kept in `WOODMOON_STORAGE_DIR` (default `.woodmoon`) between runs.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use woodmoon_storefront::config::StorefrontConfig;
use woodmoon_storefront::error::AppError;
use woodmoon_storefront::state::AppState;

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "woodmoon")]
#[command(author, version, about = "WoodMoon storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Sign out and empty the cart
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: commands::cart::CartAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed before Sentry init
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing();

    if let Err(e) = run(cli, config).await {
        if e.is_internal() {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, sentry_event_id = %event_id, "Command failed");
        } else {
            tracing::error!("{e}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), AppError> {
    let state = AppState::open(config)?;
    telemetry::sync_sentry_user(state.auth().user().as_ref());

    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(&state, &email, password).await?;
        }
        Commands::Logout => commands::auth::logout(&state),
        Commands::Whoami => commands::auth::whoami(&state),
        Commands::Cart { action } => commands::cart::run(&state, action)?,
    }
    Ok(())
}
