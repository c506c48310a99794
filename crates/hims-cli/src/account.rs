//! # Account Subcommands
//!
//! `create-admin` and `reset-password`. Both operate on the in-memory
//! store; the `run_*` wrappers load it from PostgreSQL and write back the
//! one account they touched.

use anyhow::Result;
use clap::Args;
use hims_core::password::hash_password;
use hims_core::user::NewUser;
use hims_core::{Database, HimsError, NationalId, User};

use crate::{is_refusal, Session, EXIT_OK, EXIT_REFUSED};

/// Arguments for the `hims create-admin` subcommand.
#[derive(Args, Debug)]
pub struct CreateAdminArgs {
    /// Ten-digit national id, used as the login name.
    #[arg(long)]
    pub national_id: String,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    /// At least eight characters.
    #[arg(long)]
    pub password: String,
}

/// Arguments for the `hims reset-password` subcommand.
#[derive(Args, Debug)]
pub struct ResetPasswordArgs {
    #[arg(long)]
    pub national_id: String,

    /// The new password (at least eight characters).
    #[arg(long)]
    pub password: String,
}

/// Create an active staff administrator.
pub fn create_admin(db: &Database, args: &CreateAdminArgs) -> Result<User, HimsError> {
    let national_id = NationalId::new(args.national_id.as_str())?;
    db.insert_user(NewUser {
        national_id,
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
        email: args.email.clone(),
        phone: None,
        password_hash: hash_password(&args.password)?,
        is_staff: true,
        is_admin: true,
    })
}

/// Replace the password of the account with the given national id.
pub fn reset_password(db: &Database, args: &ResetPasswordArgs) -> Result<User, HimsError> {
    let national_id = NationalId::new(args.national_id.as_str())?;
    let user = db
        .find_user_by_national_id(&national_id)
        .ok_or_else(|| HimsError::not_found("user", &national_id))?;
    let hash = hash_password(&args.password)?;
    db.update_user(&user.id, |u| u.password_hash = hash)
}

/// Execute the create-admin subcommand.
pub async fn run_create_admin(args: &CreateAdminArgs, database_url: Option<&str>) -> Result<u8> {
    let session = Session::open(database_url).await?;
    match create_admin(&session.db, args) {
        Ok(user) => {
            session.commit().await?;
            tracing::info!(user_id = %user.id, "administrator created");
            println!("created administrator {} ({})", user.national_id, user.id);
            Ok(EXIT_OK)
        }
        Err(e) if is_refusal(&e) => {
            eprintln!("cannot create administrator: {e}");
            Ok(EXIT_REFUSED)
        }
        Err(e) => Err(e.into()),
    }
}

/// Execute the reset-password subcommand.
pub async fn run_reset_password(args: &ResetPasswordArgs, database_url: Option<&str>) -> Result<u8> {
    let session = Session::open(database_url).await?;
    match reset_password(&session.db, args) {
        Ok(user) => {
            session.commit().await?;
            tracing::info!(user_id = %user.id, "password reset");
            println!("password updated for {}", user.national_id);
            Ok(EXIT_OK)
        }
        Err(e) if is_refusal(&e) => {
            eprintln!("cannot reset password: {e}");
            Ok(EXIT_REFUSED)
        }
        Err(e) => Err(e.into()),
    }
}
