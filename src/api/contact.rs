use actix_web::dev::HttpServiceFactory;
use actix_web::{post, web, Responder};
use serde::{Deserialize, Serialize};

use crate::error::BlogError;
use crate::notifier;
use crate::AppState;

use super::common::{self, ErrorCode};

#[derive(Deserialize)]
struct ContactPayload {
    name: String,
    email: String,
    message: String,
}

#[derive(Serialize)]
struct ContactResponse {
    delivered: bool,
}

/// Forwards the message to the site's own address. A failed send is reported,
/// not raised.
#[post("")]
async fn send_handler(
    state: web::Data<AppState>,
    payload: web::Json<ContactPayload>,
) -> Result<impl Responder, BlogError> {
    let payload = payload.into_inner();
    let (name, email, message) = (payload.name.trim(), payload.email.trim(), payload.message.trim());
    if name.is_empty() || email.is_empty() || message.is_empty() {
        return Err(BlogError::validation(ErrorCode::MissingField, "name, email and message are required"));
    }
    let mail = notifier::contact_email(name, email, message);
    let to = state.config.mail.sender_address().to_owned();
    let sender = state.notifier.clone();
    let delivered = match web::block(move || sender.send(&to, &mail.subject, &mail.html)).await? {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("could not forward contact message from {}: {}", email, e);
            false
        }
    };
    Ok(common::success_with(ContactResponse { delivered }))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/contact").service(send_handler)
}
