pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::{AppState, create_router};
