use std::env;

use crate::error::AppError;

/// Database profile enum for different environments
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DbProfile {
    /// Production database profile
    Prod,
    /// Test database profile - enforces safety rules
    Test,
}

/// Database owner enum for different access levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DbOwner {
    /// Application-level access (limited permissions)
    App,
    /// Owner-level access (full permissions for migrations)
    Owner,
}

/// Builds a database URL from environment variables based on profile and owner
pub fn db_url(profile: DbProfile, owner: DbOwner) -> Result<String, AppError> {
    db_url_with(profile, owner, |name| env::var(name).ok())
}

/// Same as [`db_url`], reading variables through `lookup`.
pub fn db_url_with<F>(profile: DbProfile, owner: DbOwner, lookup: F) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = lookup("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string());
    let db_name = db_name(profile, &lookup)?;
    let (username, password) = credentials(owner, &lookup)?;

    Ok(format!(
        "postgresql://{username}:{password}@{host}:{port}/{db_name}"
    ))
}

fn db_name<F>(profile: DbProfile, lookup: &F) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match profile {
        DbProfile::Prod => must_var(lookup, "PROD_DB"),
        DbProfile::Test => {
            let db_name = must_var(lookup, "TEST_DB")?;
            // Enforce safety: test DB must end with "_test"
            if !db_name.ends_with("_test") {
                return Err(AppError::config(format!(
                    "Test profile requires database name to end with '_test', but got: '{db_name}'"
                )));
            }
            Ok(db_name)
        }
    }
}

fn credentials<F>(owner: DbOwner, lookup: &F) -> Result<(String, String), AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match owner {
        DbOwner::App => Ok((
            must_var(lookup, "APP_DB_USER")?,
            must_var(lookup, "APP_DB_PASSWORD")?,
        )),
        DbOwner::Owner => Ok((
            must_var(lookup, "PURSUIT_OWNER_USER")?,
            must_var(lookup, "PURSUIT_OWNER_PASSWORD")?,
        )),
    }
}

/// Get required variable or return error
pub(crate) fn must_var<F>(lookup: &F, name: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .ok_or_else(|| AppError::config(format!("Required environment variable '{name}' is not set")))
}
