//! # hims CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hims_cli::account::{run_create_admin, run_reset_password, CreateAdminArgs, ResetPasswordArgs};
use hims_cli::seed::{run_seed, SeedArgs};
use hims_cli::stats::run_stats;
use hims_cli::{run_migrate, EXIT_ERROR};

/// Health Insurance Management Stack operator CLI
///
/// Prepares the PostgreSQL schema, installs reference data and manages
/// administrator accounts without going through the HTTP API.
#[derive(Parser, Debug)]
#[command(name = "hims", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the SQL migrations.
    Migrate,

    /// Install reference data (admin account, provinces, locations, plans).
    Seed(SeedArgs),

    /// Create an administrator account.
    CreateAdmin(CreateAdminArgs),

    /// Set a new password for an account.
    ResetPassword(ResetPasswordArgs),

    /// Print the admin dashboard statistics as JSON.
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!("hims CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let url = cli.database_url.as_deref();
    let result = match &cli.command {
        Commands::Migrate => run_migrate(url).await,
        Commands::Seed(args) => run_seed(args, url).await,
        Commands::CreateAdmin(args) => run_create_admin(args, url).await,
        Commands::ResetPassword(args) => run_reset_password(args, url).await,
        Commands::Stats => run_stats(url).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_seed_with_sample() {
        let cli = Cli::try_parse_from(["hims", "-vv", "seed", "--sample"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Seed(SeedArgs { sample: true })));
    }

    #[test]
    fn create_admin_requires_a_password() {
        let err = Cli::try_parse_from([
            "hims",
            "create-admin",
            "--national-id",
            "0012345678",
            "--first-name",
            "مدیر",
            "--last-name",
            "سامانه",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
