pub mod api;
pub mod config;
pub mod decode;
pub mod error;
pub mod functions;
pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod validate;

pub use api::{build_router, AppState};
pub use config::Config;
pub use error::GatewayError;
