pub mod rest;
pub mod websocket;

pub use rest::{ApiError, ApiResult, AppState, RestApi};
