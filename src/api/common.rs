use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    EmailDuplicated = 2,
    NameTooLong = 3,
    EmailTooLong = 4,
    EmailInvalid = 5,
    CommentTooLong = 6,
    TokenInvalid = 7,
    CommentTooShort = 9,
    MissingField = 10,
    PasswordMismatch = 11,
    PasswordTooShort = 12,
    TokenExpired = 13,
    InvalidCredentials = 14,
    AccountBanned = 15,
    EmailNotVerified = 16,
    SelfActionForbidden = 17,
    SlugDuplicated = 18,
    CategoryProtected = 19,
    CategoryNotEmpty = 20,
    InvalidName = 21,
    InvalidRole = 22,
    InvalidStatus = 23,
    UnsupportedFileType = 24,
    FileTooLarge = 25,
    Internal = 255,
}

#[derive(Serialize)]
struct SimpleSuccessResponse {
    success: bool,
}

pub fn simple_success() -> HttpResponse {
    HttpResponse::Ok().json(SimpleSuccessResponse { success: true })
}

pub fn success_with<T: Serialize>(value: T) -> HttpResponse {
    #[derive(Serialize)]
    struct SerializeHelper<T: Serialize> {
        success: bool,

        #[serde(flatten)]
        value: T,
    }
    HttpResponse::Ok().json(SerializeHelper { success: true, value })
}

#[derive(Serialize)]
struct ErrorResponseWithCode {
    success: bool,
    code: ErrorCode,
}

pub fn error_response_with_code(code: ErrorCode, status: StatusCode) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponseWithCode { success: false, code })
}
