pub mod admin;
pub mod category;
pub mod comment;
pub mod common;
pub mod contact;
pub mod post;
pub mod upload;
pub mod user;
