use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::api::common::ErrorCode;
use crate::context::RequestContext;
use crate::error::BlogError;
use crate::upload::PUBLIC_PREFIX;
use crate::AppState;

use super::common;

#[derive(Deserialize)]
struct ImageQuery {
    #[serde(default)]
    filename: String,
}

#[derive(Serialize)]
struct ImageResponse {
    url: String,
}

/// Raw image bytes in the body, original file name in the query. The body is
/// read here rather than by an extractor so an oversized upload gets a coded
/// answer instead of a bare 413.
#[post("/image")]
async fn image_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    query: web::Query<ImageQuery>,
    payload: web::Payload,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let uploads = state.uploads.clone();
    let body = match payload.to_bytes_limited(uploads.max_bytes()).await {
        Ok(read) => read.map_err(|e| {
            BlogError::validation(ErrorCode::MissingField, format!("could not read upload: {}", e))
        })?,
        Err(_) => return Err(uploads.too_large()),
    };
    let url = web::block(move || uploads.save(&query.filename, &body)).await??;
    Ok(common::success_with(ImageResponse { url }))
}

#[get("/{name}")]
async fn serve_handler(
    state: web::Data<AppState>,
    name: web::Path<String>,
) -> Result<impl Responder, BlogError> {
    let uploads = state.uploads.clone();
    let (bytes, content_type) = web::block(move || uploads.open(&name)).await??;
    Ok(HttpResponse::Ok().content_type(content_type).body(bytes))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/upload").service(image_handler)
}

pub fn get_static_service() -> impl HttpServiceFactory {
    web::scope(PUBLIC_PREFIX).service(serve_handler)
}
