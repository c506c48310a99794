//! # Seed Subcommand
//!
//! Installs the administrator account, the provinces, the sample location
//! hierarchy and the plan catalogue. Rows that already exist are kept, so
//! running it twice is harmless.

use anyhow::Result;
use clap::Args;
use hims_core::seed::{self, SeedOptions, SeedReport};
use hims_core::Database;

use crate::{Session, EXIT_OK};

/// Arguments for the `hims seed` subcommand.
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Also create demo users with dependents and registrations.
    #[arg(long)]
    pub sample: bool,
}

/// Execute the seed subcommand.
pub async fn run_seed(args: &SeedArgs, database_url: Option<&str>) -> Result<u8> {
    let session = Session::open(database_url).await?;
    let report = seed_database(&session.db, args)?;
    if report.total() > 0 {
        session.commit().await?;
    }
    print!("{}", render_report(&report));
    Ok(EXIT_OK)
}

pub fn seed_database(db: &Database, args: &SeedArgs) -> Result<SeedReport> {
    Ok(seed::seed(db, SeedOptions { sample: args.sample })?)
}

/// One `table: count` line per table that gained rows.
pub fn render_report(report: &SeedReport) -> String {
    if report.total() == 0 {
        return "nothing to seed\n".to_string();
    }
    let mut out = String::new();
    for (table, count) in &report.created {
        out.push_str(&format!("{table}: {count}\n"));
    }
    out.push_str(&format!("total: {}\n", report.total()));
    out
}
