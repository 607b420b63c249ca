use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::SqliteStore;
use crate::error::CoreError;
use crate::model::{Role, YearOfStudy};

const HASH_SCHEME: &str = "sha256";

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn digest(salt: &str, password: &str) -> String {
    let mut h = Sha256::new();
    h.update(salt.as_bytes());
    h.update(b":");
    h.update(password.as_bytes());
    to_hex(&h.finalize())
}

/// Encodes as `sha256$<salt>$<hex digest>` with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}${}", HASH_SCHEME, salt, digest(&salt, password))
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    constant_time_eq(digest(salt, password).as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The signed-in identity. Created by a successful login and cleared on
/// logout or when the workspace changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub role: Role,
    pub id: String,
}

impl Session {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}

#[derive(Debug, Clone)]
pub struct SignupForm {
    pub role: Role,
    pub id: String,
    pub name: String,
    pub department: String,
    pub year_of_study: Option<String>,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error("{0} must not be empty")]
    Missing(&'static str),
    #[error("yearOfStudy must be one of: First, Second, Third, Fourth")]
    BadYear,
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub fn signup(store: &SqliteStore, form: &SignupForm) -> Result<(), SignupError> {
    let id = form.id.trim();
    if id.is_empty() {
        return Err(SignupError::Missing("id"));
    }
    if form.name.trim().is_empty() {
        return Err(SignupError::Missing("name"));
    }
    if form.department.trim().is_empty() {
        return Err(SignupError::Missing("department"));
    }
    if form.password.is_empty() {
        return Err(SignupError::Missing("password"));
    }
    let hash = hash_password(&form.password);
    match form.role {
        Role::Student => {
            let year = form
                .year_of_study
                .as_deref()
                .and_then(YearOfStudy::parse)
                .ok_or(SignupError::BadYear)?;
            store.insert_student(
                id,
                form.name.trim(),
                form.department.trim(),
                year.as_str(),
                &hash,
            )?;
        }
        Role::Teacher => {
            store.insert_teacher(id, form.name.trim(), form.department.trim(), &hash)?;
        }
    }
    tracing::info!(role = form.role.as_str(), id, "account created");
    Ok(())
}

/// Unknown accounts and wrong passwords fail identically.
pub fn login(store: &SqliteStore, role: Role, id: &str, password: &str) -> Result<Session, CoreError> {
    let stored = store.password_hash(role, id)?;
    match stored {
        Some(h) if verify_password(&h, password) => {
            tracing::info!(role = role.as_str(), id, "signed in");
            Ok(Session {
                role,
                id: id.to_string(),
            })
        }
        _ => {
            tracing::warn!(role = role.as_str(), id, "sign-in rejected");
            Err(CoreError::InvalidCredentials)
        }
    }
}
