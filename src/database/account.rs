use diesel::insert_into;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error};

use crate::error::BlogError;
use crate::models::{Role, Status, User};
use crate::schema::users;

use super::connection::DbConnection;

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
    pub created_at: &'a str,
}

pub fn find_by_id(connection: &mut DbConnection, id: i32) -> Result<Option<User>, BlogError> {
    Ok(users::table.find(id).first(connection).optional()?)
}

/// `email` must already be lowercased.
pub fn find_by_email(connection: &mut DbConnection, email: &str) -> Result<Option<User>, BlogError> {
    Ok(users::table
        .filter(users::email.eq(email))
        .first(connection)
        .optional()?)
}

/// Usernames are not unique; the oldest account wins.
pub fn find_by_username(connection: &mut DbConnection, username: &str) -> Result<Option<User>, BlogError> {
    Ok(users::table
        .filter(users::username.eq(username))
        .order(users::id.asc())
        .first(connection)
        .optional()?)
}

/// New accounts are active writers with an unverified email.
pub fn insert(connection: &mut DbConnection, user: NewUser) -> Result<User, BlogError> {
    let inserted = insert_into(users::table)
        .values((
            users::username.eq(user.username),
            users::email.eq(user.email),
            users::password_hash.eq(user.password_hash),
            users::role.eq(Role::Writer.as_str()),
            users::status.eq(Status::Active.as_str()),
            users::phone.eq(user.phone),
            users::created_at.eq(user.created_at),
            users::email_verified.eq(false),
        ))
        .execute(connection);
    match inserted {
        Ok(_) => {}
        Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(BlogError::DuplicateEmail)
        }
        Err(e) => return Err(e.into()),
    }
    find_by_email(connection, user.email)?.ok_or(BlogError::NotFound)
}

pub fn set_status(connection: &mut DbConnection, user: &User, status: Status) -> Result<(), BlogError> {
    diesel::update(user)
        .set(users::status.eq(status.as_str()))
        .execute(connection)?;
    Ok(())
}

pub fn set_role(connection: &mut DbConnection, user: &User, role: Role) -> Result<(), BlogError> {
    diesel::update(user)
        .set(users::role.eq(role.as_str()))
        .execute(connection)?;
    Ok(())
}

pub fn set_password_hash(connection: &mut DbConnection, user_id: i32, password_hash: &str) -> Result<(), BlogError> {
    diesel::update(users::table.find(user_id))
        .set(users::password_hash.eq(password_hash))
        .execute(connection)?;
    Ok(())
}

pub fn mark_email_verified(connection: &mut DbConnection, user_id: i32) -> Result<(), BlogError> {
    diesel::update(users::table.find(user_id))
        .set(users::email_verified.eq(true))
        .execute(connection)?;
    Ok(())
}

pub fn list_all(connection: &mut DbConnection) -> Result<Vec<User>, BlogError> {
    Ok(users::table
        .order((users::created_at.desc(), users::id.desc()))
        .load(connection)?)
}

pub fn list_pending(connection: &mut DbConnection) -> Result<Vec<User>, BlogError> {
    Ok(users::table
        .filter(users::status.eq(Status::Pending.as_str()))
        .order(users::id.asc())
        .load(connection)?)
}

pub fn pending_count(connection: &mut DbConnection) -> Result<i64, BlogError> {
    Ok(users::table
        .filter(users::status.eq(Status::Pending.as_str()))
        .count()
        .get_result(connection)?)
}
