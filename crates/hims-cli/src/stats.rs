//! # Stats Subcommand
//!
//! Prints the same figures as `GET /api/v1/statistics/admin/dashboard`.

use anyhow::Result;
use chrono::Utc;
use hims_core::stats;
use hims_core::Database;

use crate::{Session, EXIT_OK};

/// Execute the stats subcommand.
pub async fn run_stats(database_url: Option<&str>) -> Result<u8> {
    let session = Session::open(database_url).await?;
    println!("{}", dashboard_json(&session.db)?);
    Ok(EXIT_OK)
}

/// The admin dashboard as pretty-printed JSON.
pub fn dashboard_json(db: &Database) -> Result<String> {
    let now = Utc::now();
    let dashboard = db.read(|t| stats::dashboard(t, now));
    Ok(serde_json::to_string_pretty(&dashboard)?)
}
