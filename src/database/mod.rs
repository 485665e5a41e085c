mod connection;
pub mod account;
pub mod category;
pub mod comments;
pub mod common;
pub mod session;
pub mod stats;
pub mod tokens;

pub use connection::*;
