use diesel::insert_into;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error};

use crate::api::common::ErrorCode;
use crate::content::{check_path_component, ContentStore};
use crate::error::BlogError;
use crate::models::Category;
use crate::schema::categories;
use crate::slug::slugify;

use super::connection::DbConnection;

/// Seed categories that can never be deleted.
pub const PROTECTED_SLUGS: [&str; 3] = ["projects", "tutorials", "articles"];

const SEED_CATEGORIES: [(&str, &str, i32); 3] = [
    ("🛠️ برمجتي", "projects", 10),
    ("📚 شروحاتي", "tutorials", 20),
    ("🧠 مقالاتي", "articles", 30),
];

pub fn list_active(connection: &mut DbConnection) -> Result<Vec<Category>, BlogError> {
    Ok(categories::table
        .filter(categories::is_active.eq(true))
        .order((categories::sort_order.asc(), categories::id.asc()))
        .load(connection)?)
}

pub fn get_by_id(connection: &mut DbConnection, id: i32) -> Result<Option<Category>, BlogError> {
    Ok(categories::table
        .find(id)
        .first(connection)
        .optional()?)
}

pub fn get_by_folder(connection: &mut DbConnection, folder: &str) -> Result<Option<Category>, BlogError> {
    Ok(categories::table
        .filter(categories::folder.eq(folder))
        .first(connection)
        .optional()?)
}

pub fn get_active_by_slug(connection: &mut DbConnection, slug: &str) -> Result<Option<Category>, BlogError> {
    Ok(categories::table
        .filter(categories::slug.eq(slug))
        .filter(categories::is_active.eq(true))
        .first(connection)
        .optional()?)
}

/// Inserts the seed categories into an empty registry. Returns how many rows were added.
pub fn seed_defaults(connection: &mut DbConnection, timestamp: &str) -> Result<usize, BlogError> {
    connection.transaction::<usize, BlogError, _>(|connection| {
        let count: i64 = categories::table.count().get_result(connection)?;
        if count > 0 {
            return Ok(0);
        }
        let rows: Vec<_> = SEED_CATEGORIES
            .iter()
            .map(|(name, slug, sort_order)| {
                (
                    categories::name.eq(*name),
                    categories::slug.eq(*slug),
                    categories::folder.eq(*slug),
                    categories::is_active.eq(true),
                    categories::sort_order.eq(*sort_order),
                    categories::created_at.eq(timestamp),
                )
            })
            .collect();
        Ok(insert_into(categories::table).values(rows).execute(connection)?)
    })
}

/// Makes sure every active category has its folder in the content tree.
pub fn ensure_dirs(connection: &mut DbConnection, content: &ContentStore) -> Result<(), BlogError> {
    for category in list_active(connection)? {
        content.ensure_folder(&category.folder)?;
    }
    Ok(())
}

pub fn create(
    connection: &mut DbConnection,
    content: &ContentStore,
    name: &str,
    sort_order: i32,
    timestamp: &str,
) -> Result<Category, BlogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BlogError::validation(ErrorCode::MissingField, "category name is required"));
    }
    let slug = slugify(name);
    check_path_component(&slug)?;
    let taken: bool = diesel::select(diesel::dsl::exists(
        categories::table.filter(categories::slug.eq(&slug).or(categories::folder.eq(&slug))),
    ))
    .get_result(connection)?;
    if taken {
        return Err(BlogError::DuplicateSlug);
    }
    // The folder may survive from an earlier attempt; only the row decides whether the category exists.
    if let Err(e) = content.ensure_folder(&slug) {
        tracing::warn!("could not create folder for category {}: {}", slug, e);
    }
    let inserted = insert_into(categories::table)
        .values((
            categories::name.eq(name),
            categories::slug.eq(&slug),
            categories::folder.eq(&slug),
            categories::is_active.eq(true),
            categories::sort_order.eq(sort_order),
            categories::created_at.eq(timestamp),
        ))
        .execute(connection);
    match inserted {
        Ok(_) => {}
        Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(BlogError::DuplicateSlug)
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!("created category {} ({})", slug, name);
    get_by_folder(connection, &slug)?.ok_or(BlogError::NotFound)
}

/// Deletes an empty, unprotected category and then tries to remove its folder.
pub fn delete(connection: &mut DbConnection, content: &ContentStore, id: i32) -> Result<Category, BlogError> {
    let category = get_by_id(connection, id)?.ok_or(BlogError::NotFound)?;
    if PROTECTED_SLUGS.contains(&category.slug.as_str()) {
        return Err(BlogError::Protected);
    }
    if content.has_posts(&category.folder)? {
        return Err(BlogError::NotEmpty);
    }
    diesel::delete(&category).execute(connection)?;
    if let Err(e) = content.remove_folder(&category.folder) {
        tracing::warn!("left folder {} in place after deleting its category: {}", category.folder, e);
    }
    tracing::info!("deleted category {}", category.slug);
    Ok(category)
}
