use diesel::insert_into;
use diesel::prelude::*;

use crate::error::BlogError;
use crate::models::Comment;
use crate::schema::comments;

use super::connection::DbConnection;

pub fn list(connection: &mut DbConnection, category: &str, filename: &str) -> Result<Vec<Comment>, BlogError> {
    Ok(comments::table
        .filter(comments::category.eq(category))
        .filter(comments::post_filename.eq(filename))
        .order((comments::created_at.desc(), comments::id.desc()))
        .load(connection)?)
}

/// Appends a comment. Callers reject empty bodies before getting here.
pub fn add(
    connection: &mut DbConnection,
    category: &str,
    filename: &str,
    author_name: &str,
    body: &str,
    timestamp: &str,
) -> Result<(), BlogError> {
    insert_into(comments::table)
        .values((
            comments::category.eq(category),
            comments::post_filename.eq(filename),
            comments::author_name.eq(author_name),
            comments::body.eq(body),
            comments::created_at.eq(timestamp),
        ))
        .execute(connection)?;
    Ok(())
}

pub fn delete_for_post(connection: &mut DbConnection, category: &str, filename: &str) -> Result<usize, BlogError> {
    Ok(diesel::delete(
        comments::table
            .filter(comments::category.eq(category))
            .filter(comments::post_filename.eq(filename)),
    )
    .execute(connection)?)
}
