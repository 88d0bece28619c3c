pub mod config;
mod error;
mod handlers;
pub mod retention;
mod routes;

pub use config::{ServiceConfig, load_service_config};
pub use error::ApiError;
pub use routes::{AppState, create_router};

#[cfg(test)]
pub(crate) mod test_support;
