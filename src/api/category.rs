use actix_web::dev::HttpServiceFactory;
use actix_web::{get, web, Responder};
use serde::Serialize;

use crate::content::PostSummary;
use crate::database::category;
use crate::error::BlogError;
use crate::models::Category;
use crate::AppState;

use super::common;

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

#[get("")]
async fn list_handler(state: web::Data<AppState>) -> Result<impl Responder, BlogError> {
    let mut connection = state.stores.accounts.get()?;
    let categories = web::block(move || category::list_active(&mut connection)).await??;
    Ok(common::success_with(CategoriesResponse { categories }))
}

#[derive(Serialize)]
struct CategoryPageResponse {
    category: Category,
    posts: Vec<PostSummary>,
}

#[get("/{slug}")]
async fn page_handler(
    state: web::Data<AppState>,
    slug: web::Path<String>,
) -> Result<impl Responder, BlogError> {
    let mut connection = state.stores.accounts.get()?;
    let posts = state.posts.clone();
    let page = web::block(move || {
        let category = category::get_active_by_slug(&mut connection, &slug)?.ok_or(BlogError::NotFound)?;
        let posts = posts.list(&category.folder)?;
        Ok::<_, BlogError>(CategoryPageResponse { category, posts })
    })
    .await??;
    Ok(common::success_with(page))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/categories")
        .service(list_handler)
        .service(page_handler)
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    use crate::test_support::{Fixture, RecordingNotifier};

    use super::*;

    #[actix_web::test]
    async fn lists_active_categories_and_their_posts() {
        let fixture = Fixture::new();
        let state = fixture.app_state(RecordingNotifier::new());
        state.posts.create("tutorials", "intro", "Intro", "body").unwrap();
        let app = test::init_service(App::new().app_data(web::Data::new(state)).service(get_service())).await;

        let request = test::TestRequest::get().uri("/categories").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        let slugs: Vec<_> = body["categories"]
            .as_array()
            .unwrap()
            .iter()
            .map(|category| category["slug"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(slugs, vec!["projects", "tutorials", "articles"]);

        let request = test::TestRequest::get().uri("/categories/tutorials").to_request();
        let body: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["category"]["folder"], "tutorials");
        assert_eq!(body["posts"][0]["filename"], "intro");
        assert_eq!(body["posts"][0]["title"], "Intro");

        let request = test::TestRequest::get().uri("/categories/missing").to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::NOT_FOUND);
    }
}
