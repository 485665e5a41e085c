use diesel::insert_into;
use diesel::prelude::*;

use crate::error::BlogError;
use crate::schema::stats;

use super::connection::DbConnection;

/// Counts one view, creating the row on the first one.
pub fn increment(connection: &mut DbConnection, category: &str, filename: &str) -> Result<(), BlogError> {
    insert_into(stats::table)
        .values((
            stats::category.eq(category),
            stats::filename.eq(filename),
            stats::views.eq(1i64),
        ))
        .on_conflict((stats::category, stats::filename))
        .do_update()
        .set(stats::views.eq(stats::views + 1i64))
        .execute(connection)?;
    Ok(())
}

pub fn get(connection: &mut DbConnection, category: &str, filename: &str) -> Result<i64, BlogError> {
    let views: Option<i64> = stats::table
        .filter(stats::category.eq(category))
        .filter(stats::filename.eq(filename))
        .select(stats::views)
        .first(connection)
        .optional()?;
    Ok(views.unwrap_or(0))
}

pub fn delete_for_post(connection: &mut DbConnection, category: &str, filename: &str) -> Result<usize, BlogError> {
    Ok(diesel::delete(
        stats::table
            .filter(stats::category.eq(category))
            .filter(stats::filename.eq(filename)),
    )
    .execute(connection)?)
}
