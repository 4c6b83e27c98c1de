use anyhow::{bail, Result};
use std::io::Write;

use super::Session;
use crate::storage::DatabaseError;

/// Create a user and make it the current one.
pub async fn register(session: &mut Session, name: &str, out: &mut impl Write) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("User name must not be empty");
    }

    let user = match session.db.create_user(name).await {
        Ok(user) => user,
        Err(DatabaseError::Duplicate(_)) => bail!("User {name:?} already exists"),
        Err(e) => return Err(e.into()),
    };
    session.set_current_user(&user.name)?;

    tracing::info!(user_id = user.id, name = %user.name, "Registered user");
    writeln!(out, "User {} created and logged in", user.name)?;
    Ok(())
}

/// Switch the current user to an existing one.
pub async fn login(session: &mut Session, name: &str, out: &mut impl Write) -> Result<()> {
    let name = name.trim();
    let Some(user) = session.db.get_user_by_name(name).await? else {
        bail!("User {name:?} does not exist. Run `gator register {name}` first.");
    };
    session.set_current_user(&user.name)?;

    writeln!(out, "Logged in as {}", user.name)?;
    Ok(())
}

/// Delete every user, and with them all feeds, follows and posts.
pub async fn reset(session: &mut Session, out: &mut impl Write) -> Result<()> {
    let deleted = session.db.reset_users().await?;
    tracing::info!(deleted, "Reset users");
    writeln!(out, "Deleted {} user(s)", deleted)?;
    Ok(())
}

/// List users, marking the current one.
pub async fn users(session: &Session, out: &mut impl Write) -> Result<()> {
    let current = session.config.current_user_name.as_deref();
    for user in session.db.get_users().await? {
        if Some(user.name.as_str()) == current {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}
