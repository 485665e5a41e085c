use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Duration;
use diesel::Connection;
use regex::Regex;
use serde::Serialize;

use crate::api::common::ErrorCode;
use crate::database::account::{self, NewUser};
use crate::database::common::Now;
use crate::database::session;
use crate::database::tokens::{self, TokenKind};
use crate::database::DbConnection;
use crate::error::BlogError;
use crate::models::{Role, Status, User};
use crate::notifier::{self, Notifier};

pub const MIN_PASSWORD_CHARS: usize = 6;
const MAX_USER_NAME_BYTES: usize = 64;
const MAX_EMAIL_BYTES: usize = 128;

pub fn hash_password(password: &str) -> Result<String, BlogError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BlogError::PasswordHash(e.to_string()))
}

/// A stored hash that cannot be parsed never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("unreadable password hash: {}", e);
            false
        }
    }
}

/// Names containing '@' could never sign in by username.
fn validate_display_name(user_name: &str) -> Option<ErrorCode> {
    if user_name.len() > MAX_USER_NAME_BYTES {
        return Some(ErrorCode::NameTooLong);
    }
    if user_name.contains('@') {
        return Some(ErrorCode::InvalidName);
    }
    None
}

fn validate_email(email: &str) -> Option<ErrorCode> {
    if email.len() > MAX_EMAIL_BYTES {
        return Some(ErrorCode::EmailTooLong);
    }
    lazy_static! {
        static ref EMAIL_REGEX: Regex = Regex::new("^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\\.[a-zA-Z0-9-.]+$").unwrap();
    }
    if !EMAIL_REGEX.is_match(email) {
        return Some(ErrorCode::EmailInvalid);
    }
    None
}

pub fn verification_link(base_url: &str, token: &str) -> String {
    format!("{}/verify/{}", base_url, token)
}

pub fn reset_link(base_url: &str, token: &str) -> String {
    format!("{}/reset/{}", base_url, token)
}

pub struct Registration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrationOutcome {
    pub user_id: i32,
    pub verification_sent: bool,
}

/// Creates an active, unverified writer and mails a verification link.
/// Delivery failure leaves the account in place.
pub fn register(
    connection: &mut DbConnection,
    notifier: &dyn Notifier,
    base_url: &str,
    form: Registration,
    now: &Now,
) -> Result<RegistrationOutcome, BlogError> {
    let name = form.name.trim();
    let email = form.email.trim().to_lowercase();
    let phone = form.phone.trim();
    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return Err(BlogError::validation(ErrorCode::MissingField, "name, email and password are required"));
    }
    if let Some(code) = validate_display_name(name) {
        return Err(BlogError::validation(code, format!("{:?} is not a usable name", name)));
    }
    if let Some(code) = validate_email(&email) {
        return Err(BlogError::validation(code, format!("{:?} is not a usable email address", email)));
    }
    if form.password != form.confirm {
        return Err(BlogError::validation(ErrorCode::PasswordMismatch, "passwords do not match"));
    }
    if account::find_by_email(connection, &email)?.is_some() {
        return Err(BlogError::DuplicateEmail);
    }
    let password_hash = hash_password(&form.password)?;
    let (user, token) = connection.transaction::<_, BlogError, _>(|connection| {
        let user = account::insert(
            connection,
            NewUser {
                username: name,
                email: &email,
                password_hash: &password_hash,
                phone: if phone.is_empty() { None } else { Some(phone) },
                created_at: &now.local,
            },
        )?;
        let token = tokens::issue(connection, TokenKind::EmailVerification, user.id, now.utc)?;
        Ok((user, token))
    })?;
    tracing::info!("registered user {} <{}>", user.id, user.email);

    let link = verification_link(base_url, &token);
    let message = notifier::verification_email(&user.username, &link);
    let verification_sent = match notifier.send(&user.email, &message.subject, &message.html) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("could not send verification email to {}: {}", user.email, e);
            tracing::debug!("verification link for user {}: {}", user.id, link);
            false
        }
    };
    Ok(RegistrationOutcome {
        user_id: user.id,
        verification_sent,
    })
}

pub fn verify_email(connection: &mut DbConnection, token: &str, now: &Now) -> Result<i32, BlogError> {
    let user_id = tokens::redeem(connection, TokenKind::EmailVerification, token, now.utc, account::mark_email_verified)?;
    tracing::info!("user {} verified their email", user_id);
    Ok(user_id)
}

#[derive(Debug, Serialize)]
pub struct LoginSuccess {
    pub token: String,
    pub username: String,
    pub role: Role,
}

/// `login` is an email when it contains `@`, otherwise a username. Sessions
/// that have already run out are cleared before the new one is stored.
pub fn login(
    connection: &mut DbConnection,
    login: &str,
    password: &str,
    now: &Now,
    session_lifetime: Duration,
) -> Result<LoginSuccess, BlogError> {
    let login = login.trim();
    if login.is_empty() || password.is_empty() {
        return Err(BlogError::validation(ErrorCode::MissingField, "login and password are required"));
    }
    let user = if login.contains('@') {
        account::find_by_email(connection, &login.to_lowercase())?
    } else {
        account::find_by_username(connection, login)?
    };
    let user = match user {
        Some(user) if verify_password(password, &user.password_hash) => user,
        _ => {
            tracing::info!("failed login for {:?}", login);
            return Err(BlogError::InvalidCredentials);
        }
    };
    if user.status() == Status::Banned {
        return Err(BlogError::AccountBanned);
    }
    if !user.email_verified {
        return Err(BlogError::EmailNotVerified);
    }
    let expired = session::delete_expired(connection, now.utc)?;
    if expired > 0 {
        tracing::debug!("cleared {} expired session(s)", expired);
    }
    let token = session::create(connection, user.id, now, session_lifetime)?;
    Ok(LoginSuccess {
        token,
        role: user.role(),
        username: user.username,
    })
}

pub fn logout(connection: &mut DbConnection, token: &str) -> Result<bool, BlogError> {
    session::delete(connection, token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetRequestOutcome {
    Sent,
    DeliveryFailed,
    UnknownEmail,
}

/// Issues a one-hour reset token. Unknown addresses are reported to the caller
/// as an outcome so the response can stay generic; unverified addresses fail.
pub fn request_password_reset(
    connection: &mut DbConnection,
    notifier: &dyn Notifier,
    base_url: &str,
    email: &str,
    now: &Now,
) -> Result<ResetRequestOutcome, BlogError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(BlogError::validation(ErrorCode::MissingField, "email is required"));
    }
    let user = match account::find_by_email(connection, &email)? {
        Some(user) => user,
        None => return Ok(ResetRequestOutcome::UnknownEmail),
    };
    if !user.email_verified {
        return Err(BlogError::EmailNotVerified);
    }
    let token = tokens::issue(connection, TokenKind::PasswordReset, user.id, now.utc)?;
    let link = reset_link(base_url, &token);
    let message = notifier::password_reset_email(&user.username, &link);
    match notifier.send(&user.email, &message.subject, &message.html) {
        Ok(()) => Ok(ResetRequestOutcome::Sent),
        Err(e) => {
            tracing::warn!("could not send reset email to {}: {}", user.email, e);
            tracing::debug!("reset link for user {}: {}", user.id, link);
            Ok(ResetRequestOutcome::DeliveryFailed)
        }
    }
}

pub fn check_reset_token(connection: &mut DbConnection, token: &str, now: &Now) -> Result<i32, BlogError> {
    tokens::peek(connection, TokenKind::PasswordReset, token, now.utc)
}

/// The token is checked before the new password, so a dead token reports
/// itself whatever was typed. A short password leaves a live token usable.
/// Every session of the user ends with the reset.
pub fn reset_password(connection: &mut DbConnection, token: &str, password: &str, now: &Now) -> Result<i32, BlogError> {
    tokens::peek(connection, TokenKind::PasswordReset, token, now.utc)?;
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(BlogError::validation(
            ErrorCode::PasswordTooShort,
            format!("passwords need at least {} characters", MIN_PASSWORD_CHARS),
        ));
    }
    let password_hash = hash_password(password)?;
    let user_id = tokens::redeem(connection, TokenKind::PasswordReset, token, now.utc, |connection, user_id| {
        account::set_password_hash(connection, user_id, &password_hash)?;
        session::delete_for_user(connection, user_id)?;
        Ok(())
    })?;
    tracing::info!("user {} reset their password", user_id);
    Ok(user_id)
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: Status,
    pub email_verified: bool,
    pub created_at: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        UserSummary {
            id: user.id,
            role: user.role(),
            status: user.status(),
            username: user.username,
            email: user.email,
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

pub fn list_users(connection: &mut DbConnection) -> Result<Vec<UserSummary>, BlogError> {
    Ok(account::list_all(connection)?.into_iter().map(UserSummary::from).collect())
}

pub fn list_pending(connection: &mut DbConnection) -> Result<Vec<UserSummary>, BlogError> {
    Ok(account::list_pending(connection)?.into_iter().map(UserSummary::from).collect())
}

pub fn pending_count(connection: &mut DbConnection) -> Result<i64, BlogError> {
    account::pending_count(connection)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Approve,
    Reject,
}

impl Review {
    pub fn parse(action: &str) -> Option<Review> {
        match action {
            "approve" => Some(Review::Approve),
            "reject" => Some(Review::Reject),
            _ => None,
        }
    }

    fn status(self) -> Status {
        match self {
            Review::Approve => Status::Active,
            Review::Reject => Status::Banned,
        }
    }
}

pub fn set_role(connection: &mut DbConnection, actor_id: i32, user_id: i32, role: Role) -> Result<(), BlogError> {
    let user = account::find_by_id(connection, user_id)?.ok_or(BlogError::NotFound)?;
    if user.id == actor_id && role != Role::Admin {
        return Err(BlogError::ForbiddenSelfAction);
    }
    account::set_role(connection, &user, role)?;
    tracing::info!("user {} set role of user {} to {}", actor_id, user.id, role);
    Ok(())
}

pub fn set_status(connection: &mut DbConnection, actor_id: i32, user_id: i32, status: Status) -> Result<(), BlogError> {
    let user = account::find_by_id(connection, user_id)?.ok_or(BlogError::NotFound)?;
    if user.id == actor_id && status == Status::Banned {
        return Err(BlogError::ForbiddenSelfAction);
    }
    account::set_status(connection, &user, status)?;
    tracing::info!("user {} set status of user {} to {}", actor_id, user.id, status.as_str());
    Ok(())
}

pub fn review_pending(connection: &mut DbConnection, actor_id: i32, user_id: i32, review: Review) -> Result<(), BlogError> {
    set_status(connection, actor_id, user_id, review.status())
}
