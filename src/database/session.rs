use chrono::{Duration, NaiveDateTime};
use diesel::insert_into;
use diesel::prelude::*;

use crate::error::BlogError;
use crate::models::User;
use crate::schema::{sessions, users};

use super::common::{format_timestamp, parse_timestamp, random_alphanumeric, Now};
use super::connection::DbConnection;

pub const SESSION_TOKEN_LENGTH: usize = 32;

pub fn is_session_token(token: &str) -> bool {
    token.len() == SESSION_TOKEN_LENGTH && token.chars().all(|ch| ch.is_ascii_alphanumeric())
}

/// Starts a session that stays valid for `lifetime`.
pub fn create(connection: &mut DbConnection, user_id: i32, now: &Now, lifetime: Duration) -> Result<String, BlogError> {
    let token = random_alphanumeric(SESSION_TOKEN_LENGTH);
    insert_into(sessions::table)
        .values((
            sessions::token.eq(&token),
            sessions::user_id.eq(user_id),
            sessions::created_at.eq(&now.local),
            sessions::expires_at.eq(format_timestamp(now.utc + lifetime)),
        ))
        .execute(connection)?;
    Ok(token)
}

/// Owner of a live session. An expired session is deleted and yields `None`;
/// like tokens, a session is still live at exactly its expiry instant.
pub fn find_user(connection: &mut DbConnection, token: &str, now: NaiveDateTime) -> Result<Option<User>, BlogError> {
    if !is_session_token(token) {
        return Ok(None);
    }
    let found: Option<(User, i32, String)> = sessions::table
        .inner_join(users::table)
        .filter(sessions::token.eq(token))
        .select((users::all_columns, sessions::id, sessions::expires_at))
        .first(connection)
        .optional()?;
    let (user, session_id, expires_at) = match found {
        Some(found) => found,
        None => return Ok(None),
    };
    match parse_timestamp(&expires_at) {
        Some(expires_at) if now <= expires_at => Ok(Some(user)),
        _ => {
            diesel::delete(sessions::table.find(session_id)).execute(connection)?;
            tracing::debug!("removed expired session {} of user {}", session_id, user.id);
            Ok(None)
        }
    }
}

pub fn delete(connection: &mut DbConnection, token: &str) -> Result<bool, BlogError> {
    let affected = diesel::delete(sessions::table.filter(sessions::token.eq(token))).execute(connection)?;
    Ok(affected > 0)
}

/// Signs the user out everywhere.
pub fn delete_for_user(connection: &mut DbConnection, user_id: i32) -> Result<usize, BlogError> {
    Ok(diesel::delete(sessions::table.filter(sessions::user_id.eq(user_id))).execute(connection)?)
}

/// Drops every session that expired before `now`. Timestamps share one
/// fixed-width format, so text order is time order.
pub fn delete_expired(connection: &mut DbConnection, now: NaiveDateTime) -> Result<usize, BlogError> {
    Ok(diesel::delete(sessions::table.filter(sessions::expires_at.lt(format_timestamp(now)))).execute(connection)?)
}

#[cfg(test)]
mod tests {
    use crate::database::account::{self, NewUser};
    use crate::test_support::{at, Fixture};

    use super::*;

    fn new_user(connection: &mut DbConnection, username: &str) -> i32 {
        let email = format!("{}@blog.test", username);
        account::insert(
            connection,
            NewUser {
                username,
                email: &email,
                password_hash: "unused",
                phone: None,
                created_at: "2024-01-01 00:00:00",
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn sessions_end_at_their_lifetime() {
        let fixture = Fixture::new();
        let mut connection = fixture.stores.accounts.get().unwrap();
        let user_id = new_user(&mut connection, "omar");
        let token = create(&mut connection, user_id, &Now::at(at("2024-01-01 12:00:00")), Duration::hours(2)).unwrap();
        assert!(is_session_token(&token));

        let found = find_user(&mut connection, &token, at("2024-01-01 14:00:00")).unwrap();
        assert_eq!(found.unwrap().id, user_id);
        assert!(find_user(&mut connection, &token, at("2024-01-01 14:00:01")).unwrap().is_none());
        assert!(find_user(&mut connection, &token, at("2024-01-01 13:00:00")).unwrap().is_none());
        assert!(!delete(&mut connection, &token).unwrap());
    }

    #[test]
    fn expired_sessions_are_swept() {
        let fixture = Fixture::new();
        let mut connection = fixture.stores.accounts.get().unwrap();
        let user_id = new_user(&mut connection, "omar");
        let start = Now::at(at("2024-01-01 12:00:00"));
        let short = create(&mut connection, user_id, &start, Duration::hours(1)).unwrap();
        let long = create(&mut connection, user_id, &start, Duration::days(1)).unwrap();

        assert_eq!(delete_expired(&mut connection, at("2024-01-01 13:00:00")).unwrap(), 0);
        assert_eq!(delete_expired(&mut connection, at("2024-01-01 13:00:01")).unwrap(), 1);
        assert!(!delete(&mut connection, &short).unwrap());
        assert!(find_user(&mut connection, &long, at("2024-01-01 13:00:01")).unwrap().is_some());
    }

    #[test]
    fn users_can_be_signed_out_everywhere() {
        let fixture = Fixture::new();
        let mut connection = fixture.stores.accounts.get().unwrap();
        let omar = new_user(&mut connection, "omar");
        let sara = new_user(&mut connection, "sara");
        let start = Now::at(at("2024-01-01 12:00:00"));
        let first = create(&mut connection, omar, &start, Duration::hours(1)).unwrap();
        let second = create(&mut connection, omar, &start, Duration::hours(1)).unwrap();
        let other = create(&mut connection, sara, &start, Duration::hours(1)).unwrap();

        assert_eq!(delete_for_user(&mut connection, omar).unwrap(), 2);
        for token in [&first, &second] {
            assert!(find_user(&mut connection, token, start.utc).unwrap().is_none());
        }
        assert_eq!(find_user(&mut connection, &other, start.utc).unwrap().unwrap().id, sara);
    }

    #[test]
    fn malformed_tokens_are_never_looked_up() {
        let fixture = Fixture::new();
        let mut connection = fixture.stores.accounts.get().unwrap();
        assert!(!is_session_token("short"));
        assert!(!is_session_token(&"x".repeat(31).chars().chain(['!']).collect::<String>()));
        assert!(find_user(&mut connection, "../etc", at("2024-01-01 12:00:00")).unwrap().is_none());
    }
}
