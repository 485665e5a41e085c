use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, Responder};
use serde::{Deserialize, Serialize};

use crate::accounts::{self, Registration, ResetRequestOutcome};
use crate::context::RequestContext;
use crate::error::BlogError;
use crate::AppState;

use super::common;

#[derive(Deserialize)]
struct RegisterPayload {
    name: String,
    email: String,
    #[serde(default)]
    phone: String,
    password: String,
    confirm_password: String,
}

#[post("/register")]
async fn register_handler(
    state: web::Data<AppState>,
    payload: web::Json<RegisterPayload>,
) -> Result<impl Responder, BlogError> {
    let payload = payload.into_inner();
    let mut connection = state.stores.accounts.get()?;
    let notifier = state.notifier.clone();
    let base_url = state.config.app_base_url.clone();
    let now = state.now();
    let outcome = web::block(move || {
        accounts::register(
            &mut connection,
            notifier.as_ref(),
            &base_url,
            Registration {
                name: payload.name,
                email: payload.email,
                phone: payload.phone,
                password: payload.password,
                confirm: payload.confirm_password,
            },
            &now,
        )
    })
    .await??;
    Ok(common::success_with(outcome))
}

#[derive(Deserialize)]
struct LoginPayload {
    login: String,
    password: String,
}

#[post("/login")]
async fn login_handler(
    state: web::Data<AppState>,
    payload: web::Json<LoginPayload>,
) -> Result<impl Responder, BlogError> {
    let mut connection = state.stores.accounts.get()?;
    let now = state.now();
    let lifetime = state.config.session_lifetime;
    let session = web::block(move || {
        accounts::login(&mut connection, &payload.login, &payload.password, &now, lifetime)
    })
    .await??;
    Ok(common::success_with(session))
}

#[post("/logout")]
async fn logout_handler(
    state: web::Data<AppState>,
    context: RequestContext,
) -> Result<impl Responder, BlogError> {
    if let Some(token) = context.token {
        let mut connection = state.stores.accounts.get()?;
        web::block(move || accounts::logout(&mut connection, &token)).await??;
    }
    Ok(common::simple_success())
}

#[derive(Serialize)]
struct MeResponse {
    #[serde(flatten)]
    context: RequestContext,
    pending_count: i64,
}

#[get("/me")]
async fn me_handler(
    state: web::Data<AppState>,
    context: RequestContext,
) -> Result<impl Responder, BlogError> {
    let pending_count = if context.is_admin() {
        let mut connection = state.stores.accounts.get()?;
        web::block(move || accounts::pending_count(&mut connection)).await??
    } else {
        0
    };
    Ok(common::success_with(MeResponse { context, pending_count }))
}

#[get("/verify/{token}")]
async fn verify_handler(
    state: web::Data<AppState>,
    token: web::Path<String>,
) -> Result<impl Responder, BlogError> {
    let mut connection = state.stores.accounts.get()?;
    let now = state.now();
    web::block(move || accounts::verify_email(&mut connection, &token, &now)).await??;
    Ok(common::simple_success())
}

#[derive(Deserialize)]
struct ForgotPayload {
    email: String,
}

#[derive(Serialize)]
struct ForgotResponse {
    delivered: bool,
}

/// Unknown addresses get the same answer as a successful send.
#[post("/forgot")]
async fn forgot_handler(
    state: web::Data<AppState>,
    payload: web::Json<ForgotPayload>,
) -> Result<impl Responder, BlogError> {
    let mut connection = state.stores.accounts.get()?;
    let notifier = state.notifier.clone();
    let base_url = state.config.app_base_url.clone();
    let now = state.now();
    let outcome = web::block(move || {
        accounts::request_password_reset(&mut connection, notifier.as_ref(), &base_url, &payload.email, &now)
    })
    .await??;
    Ok(common::success_with(ForgotResponse {
        delivered: outcome != ResetRequestOutcome::DeliveryFailed,
    }))
}

#[get("/reset/{token}")]
async fn check_reset_handler(
    state: web::Data<AppState>,
    token: web::Path<String>,
) -> Result<impl Responder, BlogError> {
    let mut connection = state.stores.accounts.get()?;
    let now = state.now();
    web::block(move || accounts::check_reset_token(&mut connection, &token, &now)).await??;
    Ok(common::simple_success())
}

#[derive(Deserialize)]
struct ResetPayload {
    password: String,
}

#[post("/reset/{token}")]
async fn reset_handler(
    state: web::Data<AppState>,
    token: web::Path<String>,
    payload: web::Json<ResetPayload>,
) -> Result<impl Responder, BlogError> {
    let mut connection = state.stores.accounts.get()?;
    let now = state.now();
    web::block(move || accounts::reset_password(&mut connection, &token, &payload.password, &now)).await??;
    Ok(common::simple_success())
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/user")
        .service(register_handler)
        .service(login_handler)
        .service(logout_handler)
        .service(me_handler)
        .service(verify_handler)
        .service(forgot_handler)
        .service(check_reset_handler)
        .service(reset_handler)
}
