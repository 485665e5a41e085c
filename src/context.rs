use std::future::Future;
use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use serde::Serialize;

use crate::database::session;
use crate::error::BlogError;
use crate::models::{Role, Status, User};
use crate::AppState;

/// Who is making the request. Built from the `Authorization: Bearer` session
/// token; a missing, unknown or banned session yields an anonymous context.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    pub user_id: Option<i32>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub is_authenticated: bool,
    #[serde(skip)]
    pub token: Option<String>,
}

/// A signed-in caller.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
}

impl RequestContext {
    pub fn anonymous() -> RequestContext {
        RequestContext::default()
    }

    pub fn for_user(user: &User, token: String) -> RequestContext {
        RequestContext {
            user_id: Some(user.id),
            username: Some(user.username.clone()),
            role: Some(user.role()),
            is_authenticated: true,
            token: Some(token),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated && self.role == Some(Role::Admin)
    }

    pub fn require_login(&self) -> Result<Actor, BlogError> {
        match (self.is_authenticated, self.user_id, &self.username, self.role) {
            (true, Some(user_id), Some(username), Some(role)) => Ok(Actor {
                user_id,
                username: username.clone(),
                role,
            }),
            _ => Err(BlogError::Forbidden),
        }
    }

    pub fn require_admin(&self) -> Result<Actor, BlogError> {
        let actor = self.require_login()?;
        if actor.role != Role::Admin {
            return Err(BlogError::Forbidden);
        }
        Ok(actor)
    }
}

fn bearer_token(request: &HttpRequest) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if session::is_session_token(token) {
        Some(token.to_owned())
    } else {
        None
    }
}

impl FromRequest for RequestContext {
    type Error = BlogError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = bearer_token(request);
        let state = request.app_data::<web::Data<AppState>>().cloned();
        Box::pin(async move {
            let (token, state) = match (token, state) {
                (Some(token), Some(state)) => (token, state),
                _ => return Ok(RequestContext::anonymous()),
            };
            let pool = state.stores.accounts.clone();
            let lookup = token.clone();
            let now = state.now().utc;
            let user = web::block(move || session::find_user(&mut *pool.get()?, &lookup, now)).await??;
            Ok(match user {
                Some(user) if user.status() != Status::Banned => RequestContext::for_user(&user, token),
                _ => RequestContext::anonymous(),
            })
        })
    }
}
