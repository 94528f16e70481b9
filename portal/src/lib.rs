pub mod api;
pub mod cli;
pub mod error;
pub mod models;
pub mod render;
pub mod routes;
pub mod services;
pub mod session;
pub mod settings;
pub mod store;

pub use error::{PortalError, Result};
