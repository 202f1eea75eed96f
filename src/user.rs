use crate::error::AppError;
use crate::orm::users;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    entity::*, Condition, ConnectionTrait, DbErr, FromQueryResult, PaginatorTrait, QueryFilter,
    QuerySelect,
};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_CHARS: usize = 8;

static USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,32}$").unwrap());
static USERNAME_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// A mini struct for holding only what information we need about a client.
#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct ClientUser {
    pub id: i32,
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
}

impl From<users::Model> for ClientUser {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            avatar_url: user.avatar_url,
            is_admin: user.is_admin,
        }
    }
}

/// Public face of a user on profile pages.
#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
    pub avatar_url: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    /// Username or email address.
    pub login: String,
    pub password: String,
}

pub async fn get_client_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<Option<ClientUser>, DbErr> {
    users::Entity::find_by_id(id)
        .select_only()
        .column(users::Column::Id)
        .column(users::Column::Name)
        .column(users::Column::AvatarUrl)
        .column(users::Column::IsAdmin)
        .into_model::<ClientUser>()
        .one(db)
        .await
}

pub async fn get_profile_by_name<C: ConnectionTrait>(db: &C, name: &str) -> Result<Option<UserProfile>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Name.eq(name))
        .select_only()
        .column(users::Column::Id)
        .column(users::Column::Name)
        .column(users::Column::AvatarUrl)
        .column(users::Column::CreatedAt)
        .into_model::<UserProfile>()
        .one(db)
        .await
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("stored password hash is unreadable: {}", e);
            false
        }
    }
}

fn validate_registration(form: &RegisterForm) -> Result<(), AppError> {
    if !USERNAME.is_match(form.name.trim()) {
        return Err(AppError::Validation(
            "Usernames are 3 to 32 letters, digits, dashes or underscores.".to_owned(),
        ));
    }
    if let Some(email) = form.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        if !email.contains('@') || email.len() > 255 {
            return Err(AppError::Validation("The email must be a valid email address.".to_owned()));
        }
    }
    if form.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "The password must be at least {} characters.",
            MIN_PASSWORD_CHARS
        )));
    }
    Ok(())
}

pub async fn register_user<C: ConnectionTrait>(db: &C, form: &RegisterForm) -> Result<users::Model, AppError> {
    validate_registration(form)?;
    let name = form.name.trim();
    let email = form
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase);

    let taken = users::Entity::find()
        .filter(users::Column::Name.eq(name))
        .count(db)
        .await?;
    if taken > 0 {
        return Err(AppError::Validation("That username is already taken.".to_owned()));
    }
    if let Some(email) = &email {
        let taken = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .count(db)
            .await?;
        if taken > 0 {
            return Err(AppError::Validation("That email is already registered.".to_owned()));
        }
    }

    let user = users::ActiveModel {
        name: Set(name.to_owned()),
        email: Set(email),
        password: Set(Some(hash_password(&form.password)?)),
        avatar_url: Set(None),
        is_admin: Set(false),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("registered user {} ({})", user.name, user.id);
    Ok(user)
}

/// Checks credentials. Accounts without a password (OAuth only) never match.
pub async fn login_user<C: ConnectionTrait>(db: &C, form: &LoginForm) -> Result<users::Model, AppError> {
    let login = form.login.trim();
    let user = users::Entity::find()
        .filter(
            Condition::any()
                .add(users::Column::Name.eq(login))
                .add(users::Column::Email.eq(login.to_lowercase())),
        )
        .one(db)
        .await?;

    match user {
        Some(user)
            if user
                .password
                .as_deref()
                .map(|hash| verify_password(hash, &form.password))
                .unwrap_or(false) =>
        {
            Ok(user)
        }
        _ => Err(AppError::Validation(
            "These credentials do not match our records.".to_owned(),
        )),
    }
}

/// Turns a provider nickname into an available username, appending `-2`,
/// `-3` and so on until it is free.
pub async fn unique_username<C: ConnectionTrait>(db: &C, nickname: &str) -> Result<String, DbErr> {
    let mut base: String = USERNAME_JUNK
        .replace_all(nickname.trim(), "-")
        .trim_matches('-')
        .chars()
        .take(28)
        .collect();
    if base.chars().count() < 3 {
        base = format!("user-{}", base).trim_end_matches('-').to_owned();
    }

    let mut candidate = base.to_owned();
    let mut n = 1;
    loop {
        let taken = users::Entity::find()
            .filter(users::Column::Name.eq(candidate.as_str()))
            .count(db)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        n += 1;
        candidate = format!("{}-{}", base, n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: Option<&str>, password: &str) -> RegisterForm {
        RegisterForm {
            name: name.to_owned(),
            email: email.map(str::to_owned),
            password: password.to_owned(),
        }
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "wrong horse"));
        assert!(!verify_password("not a hash", "correct horse"));
    }

    #[test]
    fn test_registration_rules() {
        assert!(validate_registration(&form("alice", None, "longenough")).is_ok());
        assert!(validate_registration(&form("alice", Some("a@b.c"), "longenough")).is_ok());
        assert!(validate_registration(&form("al", None, "longenough")).is_err());
        assert!(validate_registration(&form("al ice", None, "longenough")).is_err());
        assert!(validate_registration(&form("alice", Some("nope"), "longenough")).is_err());
        assert!(validate_registration(&form("alice", None, "short")).is_err());
    }
}
