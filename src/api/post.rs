use actix_web::dev::HttpServiceFactory;
use actix_web::{get, web, Responder};
use serde::{Deserialize, Serialize};

use crate::content::{check_path_component, SearchHit};
use crate::error::BlogError;
use crate::AppState;

use super::common;

#[get("/{category}/{filename}")]
async fn view_handler(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, BlogError> {
    let (category, filename) = path.into_inner();
    let posts = state.posts.clone();
    let view = web::block(move || posts.view(&category, &filename)).await??;
    Ok(common::success_with(view))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchHit>,
}

#[get("/search")]
async fn search_handler(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<impl Responder, BlogError> {
    let query = query.into_inner().q.trim().to_owned();
    let posts = state.posts.clone();
    let lookup = query.clone();
    let results = web::block(move || posts.search(&lookup)).await??;
    Ok(common::success_with(SearchResponse { query, results }))
}

#[derive(Deserialize)]
struct CheckFilenameQuery {
    #[serde(default)]
    category: String,
    #[serde(default)]
    filename: String,
}

#[derive(Serialize)]
struct CheckFilenameResponse {
    exists: bool,
}

/// Malformed names are reported as free; creating them fails later anyway.
#[get("/checkFilename")]
async fn check_filename_handler(
    state: web::Data<AppState>,
    query: web::Query<CheckFilenameQuery>,
) -> Result<impl Responder, BlogError> {
    let query = query.into_inner();
    let category = query.category.trim();
    let filename = query.filename.trim();
    let exists = check_path_component(category).is_ok()
        && check_path_component(filename).is_ok()
        && state.posts.exists(category, filename);
    Ok(common::success_with(CheckFilenameResponse { exists }))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/post")
        .service(search_handler)
        .service(check_filename_handler)
        .service(view_handler)
}
