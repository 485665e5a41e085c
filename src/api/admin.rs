use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, Responder};
use serde::{Deserialize, Serialize};

use crate::accounts::{self, Review, UserSummary};
use crate::context::RequestContext;
use crate::database::category;
use crate::error::BlogError;
use crate::models::{Category, Role, Status};
use crate::posts::AdminPost;
use crate::AppState;

use super::category::CategoriesResponse;
use super::common::{self, ErrorCode};

#[get("/categories")]
async fn list_categories_handler(
    state: web::Data<AppState>,
    context: RequestContext,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let mut connection = state.stores.accounts.get()?;
    let categories = web::block(move || category::list_active(&mut connection)).await??;
    Ok(common::success_with(CategoriesResponse { categories }))
}

#[derive(Deserialize)]
struct CreateCategoryPayload {
    name: String,
    #[serde(default)]
    sort_order: i32,
}

#[derive(Serialize)]
struct CategoryResponse {
    category: Category,
}

#[post("/categories")]
async fn create_category_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    payload: web::Json<CreateCategoryPayload>,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let mut connection = state.stores.accounts.get()?;
    let content = state.content().clone();
    let timestamp = state.now().local;
    let category = web::block(move || {
        category::create(&mut connection, &content, &payload.name, payload.sort_order, &timestamp)
    })
    .await??;
    Ok(common::success_with(CategoryResponse { category }))
}

#[post("/categories/{id}/delete")]
async fn delete_category_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    id: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let mut connection = state.stores.accounts.get()?;
    let content = state.content().clone();
    let id = id.into_inner();
    web::block(move || category::delete(&mut connection, &content, id)).await??;
    Ok(common::simple_success())
}

#[derive(Serialize)]
struct UsersResponse {
    users: Vec<UserSummary>,
}

#[get("/users")]
async fn list_users_handler(
    state: web::Data<AppState>,
    context: RequestContext,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let mut connection = state.stores.accounts.get()?;
    let users = web::block(move || accounts::list_users(&mut connection)).await??;
    Ok(common::success_with(UsersResponse { users }))
}

#[get("/users/pending")]
async fn pending_users_handler(
    state: web::Data<AppState>,
    context: RequestContext,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let mut connection = state.stores.accounts.get()?;
    let users = web::block(move || accounts::list_pending(&mut connection)).await??;
    Ok(common::success_with(UsersResponse { users }))
}

#[derive(Deserialize)]
struct RolePayload {
    role: String,
}

#[post("/users/{id}/role")]
async fn set_role_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    id: web::Path<i32>,
    payload: web::Json<RolePayload>,
) -> Result<impl Responder, BlogError> {
    let actor = context.require_admin()?;
    let role: Role = payload
        .role
        .parse()
        .map_err(|_| BlogError::validation(ErrorCode::InvalidRole, format!("unknown role {:?}", payload.role)))?;
    let mut connection = state.stores.accounts.get()?;
    let id = id.into_inner();
    web::block(move || accounts::set_role(&mut connection, actor.user_id, id, role)).await??;
    Ok(common::simple_success())
}

#[derive(Deserialize)]
struct StatusPayload {
    status: String,
}

#[post("/users/{id}/status")]
async fn set_status_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    id: web::Path<i32>,
    payload: web::Json<StatusPayload>,
) -> Result<impl Responder, BlogError> {
    let actor = context.require_admin()?;
    let status: Status = payload
        .status
        .parse()
        .map_err(|_| BlogError::validation(ErrorCode::InvalidStatus, format!("unknown status {:?}", payload.status)))?;
    let mut connection = state.stores.accounts.get()?;
    let id = id.into_inner();
    web::block(move || accounts::set_status(&mut connection, actor.user_id, id, status)).await??;
    Ok(common::simple_success())
}

#[derive(Deserialize)]
struct ReviewPayload {
    action: String,
}

#[post("/users/{id}/review")]
async fn review_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    id: web::Path<i32>,
    payload: web::Json<ReviewPayload>,
) -> Result<impl Responder, BlogError> {
    let actor = context.require_admin()?;
    let review = Review::parse(&payload.action)
        .ok_or_else(|| BlogError::validation(ErrorCode::InvalidStatus, format!("unknown action {:?}", payload.action)))?;
    let mut connection = state.stores.accounts.get()?;
    let id = id.into_inner();
    web::block(move || accounts::review_pending(&mut connection, actor.user_id, id, review)).await??;
    Ok(common::simple_success())
}

#[derive(Serialize)]
struct PostsResponse {
    posts: Vec<AdminPost>,
}

#[get("/posts")]
async fn list_posts_handler(
    state: web::Data<AppState>,
    context: RequestContext,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let posts = state.posts.clone();
    let posts = web::block(move || posts.list_all()).await??;
    Ok(common::success_with(PostsResponse { posts }))
}

#[derive(Deserialize)]
struct CreatePostPayload {
    category: String,
    filename: String,
    title: String,
    content: String,
}

#[post("/posts")]
async fn create_post_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    payload: web::Json<CreatePostPayload>,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let posts = state.posts.clone();
    web::block(move || posts.create(&payload.category, &payload.filename, &payload.title, &payload.content)).await??;
    Ok(common::simple_success())
}

#[derive(Serialize)]
struct EditPostResponse {
    category: String,
    filename: String,
    title: String,
    content: String,
}

#[get("/posts/{category}/{filename}")]
async fn edit_post_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let (category, filename) = path.into_inner();
    let posts = state.posts.clone();
    let response = web::block(move || {
        let document = posts.read(&category, &filename)?;
        Ok::<_, BlogError>(EditPostResponse {
            category,
            filename,
            title: document.title,
            content: document.body,
        })
    })
    .await??;
    Ok(common::success_with(response))
}

#[derive(Deserialize)]
struct UpdatePostPayload {
    title: String,
    content: String,
}

#[post("/posts/{category}/{filename}")]
async fn update_post_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    path: web::Path<(String, String)>,
    payload: web::Json<UpdatePostPayload>,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let (category, filename) = path.into_inner();
    let posts = state.posts.clone();
    web::block(move || posts.update(&category, &filename, &payload.title, &payload.content)).await??;
    Ok(common::simple_success())
}

#[derive(Serialize)]
struct DeletePostResponse {
    removed: bool,
}

#[post("/posts/{category}/{filename}/delete")]
async fn delete_post_handler(
    state: web::Data<AppState>,
    context: RequestContext,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, BlogError> {
    context.require_admin()?;
    let (category, filename) = path.into_inner();
    let posts = state.posts.clone();
    let removed = web::block(move || posts.delete(&category, &filename)).await??;
    Ok(common::success_with(DeletePostResponse { removed }))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/admin")
        .service(list_categories_handler)
        .service(create_category_handler)
        .service(delete_category_handler)
        .service(list_users_handler)
        .service(pending_users_handler)
        .service(set_role_handler)
        .service(set_status_handler)
        .service(review_handler)
        .service(list_posts_handler)
        .service(create_post_handler)
        .service(edit_post_handler)
        .service(update_post_handler)
        .service(delete_post_handler)
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    use crate::test_support::{Fixture, RecordingNotifier};

    use super::*;

    #[actix_web::test]
    async fn writers_and_anonymous_callers_are_refused() {
        let fixture = Fixture::new();
        let (_, writer) = fixture.signed_in("writer", Role::Writer);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fixture.app_state(RecordingNotifier::new())))
                .service(get_service()),
        )
        .await;
        for uri in ["/admin/users", "/admin/posts", "/admin/categories"] {
            let request = test::TestRequest::get().uri(uri).to_request();
            assert_eq!(test::call_service(&app, request).await.status(), StatusCode::FORBIDDEN);
            let request = test::TestRequest::get()
                .uri(uri)
                .insert_header(("Authorization", writer.clone()))
                .to_request();
            assert_eq!(test::call_service(&app, request).await.status(), StatusCode::FORBIDDEN);
        }
    }

    #[actix_web::test]
    async fn category_management() {
        let fixture = Fixture::new();
        let (_, admin) = fixture.signed_in("admin", Role::Admin);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fixture.app_state(RecordingNotifier::new())))
                .service(get_service()),
        )
        .await;
        let create = |name: &str| {
            test::TestRequest::post()
                .uri("/admin/categories")
                .insert_header(("Authorization", admin.clone()))
                .set_json(json!({"name": name, "sort_order": 40}))
                .to_request()
        };

        let body: Value = test::call_and_read_body_json(&app, create("أخبار")).await;
        assert_eq!(body["category"]["slug"], "akhbar");
        let id = body["category"]["id"].as_i64().unwrap();
        assert!(fixture.content.folder_exists("akhbar"));

        let body: Value = test::call_and_read_body_json(&app, create("Akhbar")).await;
        assert_eq!(body["code"], ErrorCode::SlugDuplicated as u8);

        let request = test::TestRequest::post()
            .uri("/admin/categories/1/delete")
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["code"], ErrorCode::CategoryProtected as u8);

        let request = test::TestRequest::post()
            .uri(&format!("/admin/categories/{}/delete", id))
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        assert!(!fixture.content.folder_exists("akhbar"));
    }

    #[actix_web::test]
    async fn user_management_protects_the_acting_admin() {
        let fixture = Fixture::new();
        let (admin_id, admin) = fixture.signed_in("admin", Role::Admin);
        let (writer_id, _) = fixture.signed_in("writer", Role::Writer);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fixture.app_state(RecordingNotifier::new())))
                .service(get_service()),
        )
        .await;
        let call = |uri: String, payload: Value| {
            test::TestRequest::post()
                .uri(&uri)
                .insert_header(("Authorization", admin.clone()))
                .set_json(payload)
                .to_request()
        };

        let request = call(format!("/admin/users/{}/status", admin_id), json!({"status": "banned"}));
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["code"], ErrorCode::SelfActionForbidden as u8);
        let request = call(format!("/admin/users/{}/role", admin_id), json!({"role": "writer"}));
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["code"], ErrorCode::SelfActionForbidden as u8);
        let request = call(format!("/admin/users/{}/role", writer_id), json!({"role": "owner"}));
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["code"], ErrorCode::InvalidRole as u8);
        let request = call("/admin/users/999/status".to_owned(), json!({"status": "active"}));
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::NOT_FOUND);

        let request = call(format!("/admin/users/{}/status", writer_id), json!({"status": "pending"}));
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        let request = test::TestRequest::get()
            .uri("/admin/users/pending")
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["users"][0]["id"], writer_id);

        let request = call(format!("/admin/users/{}/review", writer_id), json!({"action": "approve"}));
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        let request = test::TestRequest::get()
            .uri("/admin/users")
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        let writer = body["users"]
            .as_array()
            .unwrap()
            .iter()
            .find(|user| user["id"] == writer_id)
            .unwrap();
        assert_eq!(writer["status"], "active");
    }

    #[actix_web::test]
    async fn post_lifecycle() {
        let fixture = Fixture::new();
        let (_, admin) = fixture.signed_in("admin", Role::Admin);
        let state = fixture.app_state(RecordingNotifier::new());
        let posts = state.posts.clone();
        let app = test::init_service(App::new().app_data(web::Data::new(state)).service(get_service())).await;
        let call = |uri: &str, payload: Value| {
            test::TestRequest::post()
                .uri(uri)
                .insert_header(("Authorization", admin.clone()))
                .set_json(payload)
                .to_request()
        };

        let request = call(
            "/admin/posts",
            json!({"category": "projects", "filename": "hello", "title": "Hello", "content": "<p>Hi</p>"}),
        );
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        assert_eq!(posts.view("projects", "hello").unwrap().views, 1);
        posts.add_comment("projects", "hello", "omar", "hi", "2024-01-01 10:00:00").unwrap();

        let request = call("/admin/posts/projects/hello", json!({"title": "Hello again", "content": "new"}));
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["success"], true);
        let request = test::TestRequest::get()
            .uri("/admin/posts/projects/hello")
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["title"], "Hello again");
        assert_eq!(body["content"], "new");

        let request = test::TestRequest::get()
            .uri("/admin/posts")
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["posts"][0]["title"], "Hello again");
        assert_eq!(body["posts"][0]["category_slug"], "projects");

        let request = call("/admin/posts/projects/hello/delete", json!({}));
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["removed"], true);
        assert_eq!(posts.views("projects", "hello").unwrap(), 0);
        assert!(posts.comments("projects", "hello").unwrap().is_empty());

        let request = call("/admin/posts/projects/hello", json!({"title": "Back", "content": ""}));
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::NOT_FOUND);
    }
}
