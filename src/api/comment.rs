use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, Responder};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::BlogError;
use crate::posts::CommentView;
use crate::AppState;

use super::common;

#[derive(Serialize)]
struct CommentsResponse {
    comments: Vec<CommentView>,
}

#[get("/{category}/{filename}")]
async fn list_handler(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, BlogError> {
    let (category, filename) = path.into_inner();
    let posts = state.posts.clone();
    let comments = web::block(move || posts.comments(&category, &filename)).await??;
    Ok(common::success_with(CommentsResponse { comments }))
}

#[derive(Deserialize)]
struct SendPayload {
    body: String,
}

#[post("/{category}/{filename}")]
async fn send_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    path: web::Path<(String, String)>,
    payload: web::Json<SendPayload>,
) -> Result<impl Responder, BlogError> {
    let actor = context.require_login()?;
    let (category, filename) = path.into_inner();
    let posts = state.posts.clone();
    let timestamp = state.now().local;
    web::block(move || posts.add_comment(&category, &filename, &actor.username, &payload.body, &timestamp)).await??;
    Ok(common::simple_success())
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/comment")
        .service(list_handler)
        .service(send_handler)
}
