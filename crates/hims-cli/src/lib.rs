//! # hims-cli: Operator CLI for the Health Insurance Management Stack
//!
//! Provides the `hims` command-line interface for tasks that sit outside
//! the HTTP API: preparing the database, installing reference data and
//! managing administrator accounts.
//!
//! ## Subcommands
//!
//! - `hims migrate`: Apply the embedded SQL migrations.
//! - `hims seed [--sample]`: Reference data, optionally with demo accounts.
//! - `hims create-admin`: Create an administrator account.
//! - `hims reset-password`: Set a new password for an account.
//! - `hims stats`: Print the admin dashboard statistics as JSON.
//!
//! Every subcommand except `migrate` opens a [`Session`]: the tables are
//! loaded from PostgreSQL into a [`Database`], the change goes through the
//! same store the API uses, and only the rows the command created or
//! modified are written back. A running API picks account changes up on the
//! next login or request, and reloads everything else on SIGHUP.
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | Success |
//! | 1    | The request was refused (unknown account, duplicate, weak password) |
//! | 2    | Operational error (database unreachable, migration failure) |

pub mod account;
pub mod seed;
pub mod stats;

use anyhow::{Context, Result};
use hims_core::{Database, HimsError, Tables};
use sqlx::PgPool;

pub const EXIT_OK: u8 = 0;
pub const EXIT_REFUSED: u8 = 1;
pub const EXIT_ERROR: u8 = 2;

/// Connect to `database_url` and bring the schema up to date.
pub async fn connect(database_url: Option<&str>) -> Result<PgPool> {
    let url = database_url.context("DATABASE_URL is not set (pass --database-url)")?;
    let pool = hims_api::db::connect(url)
        .await
        .context("failed to connect to PostgreSQL")?;
    hims_api::db::migrate(&pool)
        .await
        .context("failed to apply migrations")?;
    Ok(pool)
}

/// A loaded copy of the tables plus the baseline it was loaded as.
pub struct Session {
    pool: PgPool,
    baseline: Tables,
    pub db: Database,
}

impl Session {
    /// Connect, migrate and load every table.
    pub async fn open(database_url: Option<&str>) -> Result<Self> {
        let pool = connect(database_url).await?;
        let baseline = hims_api::db::load_tables(&pool)
            .await
            .context("failed to load tables")?;
        Ok(Self {
            pool,
            db: Database::from_tables(baseline.clone()),
            baseline,
        })
    }

    /// Write the rows created or modified since [`Session::open`].
    pub async fn commit(&self) -> Result<usize> {
        let written = hims_api::db::save_changes(&self.pool, &self.baseline, &self.db.snapshot())
            .await
            .context("failed to save changes")?;
        tracing::debug!(rows = written, "changes saved");
        Ok(written)
    }
}

/// Execute the migrate subcommand.
pub async fn run_migrate(database_url: Option<&str>) -> Result<u8> {
    connect(database_url).await?;
    println!("migrations applied");
    Ok(EXIT_OK)
}

/// Whether `err` is a refusal the operator can fix by changing the input,
/// as opposed to a failure of the machinery.
pub fn is_refusal(err: &HimsError) -> bool {
    !matches!(err, HimsError::PasswordHash(_))
}
