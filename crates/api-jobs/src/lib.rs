mod config;
mod error;
mod openapi;
mod routes;
mod state;

pub use config::JobsConfig;
pub use error::JobsApiError;
pub use openapi::openapi;
pub use routes::router;
pub use state::JobsState;
