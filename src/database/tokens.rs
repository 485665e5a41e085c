use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Integer, Text};
use indoc::formatdoc;

use crate::error::BlogError;

use super::common::{format_timestamp, parse_timestamp, random_hex};
use super::connection::DbConnection;

pub const TOKEN_BYTES: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
}

impl TokenKind {
    fn table(self) -> &'static str {
        match self {
            TokenKind::EmailVerification => "email_verifications",
            TokenKind::PasswordReset => "password_resets",
        }
    }

    pub fn validity(self) -> Duration {
        match self {
            TokenKind::EmailVerification => Duration::hours(24),
            TokenKind::PasswordReset => Duration::hours(1),
        }
    }
}

#[derive(QueryableByName, Debug)]
struct TokenRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Integer)]
    user_id: i32,
    #[diesel(sql_type = Text)]
    expires_at: String,
}

enum Check {
    Live(TokenRow),
    Expired,
}

/// Stores a fresh token for the user. Earlier tokens of the same kind stay valid.
pub fn issue(connection: &mut DbConnection, kind: TokenKind, user_id: i32, now: NaiveDateTime) -> Result<String, BlogError> {
    let token = random_hex(TOKEN_BYTES);
    let sql = formatdoc! {"
        INSERT INTO {table} (user_id, token, expires_at, created_at)
            VALUES (?, ?, ?, ?)
    ", table = kind.table()};
    sql_query(sql)
        .bind::<Integer, _>(user_id)
        .bind::<Text, _>(token.as_str())
        .bind::<Text, _>(format_timestamp(now + kind.validity()))
        .bind::<Text, _>(format_timestamp(now))
        .execute(connection)?;
    Ok(token)
}

fn find(connection: &mut DbConnection, kind: TokenKind, token: &str) -> Result<Option<TokenRow>, BlogError> {
    let sql = formatdoc! {"
        SELECT id, user_id, expires_at FROM {table}
            WHERE token = ?
            ORDER BY id
            LIMIT 1
    ", table = kind.table()};
    Ok(sql_query(sql)
        .bind::<Text, _>(token)
        .get_result::<TokenRow>(connection)
        .optional()?)
}

fn delete_row(connection: &mut DbConnection, kind: TokenKind, id: i32) -> Result<usize, BlogError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    Ok(sql_query(sql).bind::<Integer, _>(id).execute(connection)?)
}

/// Expired tokens are deleted on sight. A token is still live at exactly its expiry instant.
fn check(connection: &mut DbConnection, kind: TokenKind, token: &str, now: NaiveDateTime) -> Result<Check, BlogError> {
    let row = find(connection, kind, token)?.ok_or(BlogError::InvalidToken)?;
    let expires_at = match parse_timestamp(&row.expires_at) {
        Some(expires_at) => expires_at,
        None => {
            tracing::warn!("{} row {} has a malformed expiry {:?}", kind.table(), row.id, row.expires_at);
            return Err(BlogError::InvalidToken);
        }
    };
    if now > expires_at {
        delete_row(connection, kind, row.id)?;
        tracing::debug!("removed expired {} row {}", kind.table(), row.id);
        return Ok(Check::Expired);
    }
    Ok(Check::Live(row))
}

/// Validates a token without using it up. Returns the owning user id.
pub fn peek(connection: &mut DbConnection, kind: TokenKind, token: &str, now: NaiveDateTime) -> Result<i32, BlogError> {
    match check(connection, kind, token, now)? {
        Check::Live(row) => Ok(row.user_id),
        Check::Expired => Err(BlogError::TokenExpired),
    }
}

/// Consumes a token and applies its effect in the same transaction.
/// If `apply` fails the token stays usable.
pub fn redeem<F>(
    connection: &mut DbConnection,
    kind: TokenKind,
    token: &str,
    now: NaiveDateTime,
    apply: F,
) -> Result<i32, BlogError>
where
    F: FnOnce(&mut DbConnection, i32) -> Result<(), BlogError>,
{
    let redeemed = connection.transaction::<Option<i32>, BlogError, _>(|connection| {
        match check(connection, kind, token, now)? {
            Check::Expired => Ok(None),
            Check::Live(row) => {
                if delete_row(connection, kind, row.id)? == 0 {
                    return Err(BlogError::InvalidToken);
                }
                apply(connection, row.user_id)?;
                Ok(Some(row.user_id))
            }
        }
    })?;
    redeemed.ok_or(BlogError::TokenExpired)
}
