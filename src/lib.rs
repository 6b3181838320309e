pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod models;
pub mod services;

pub use config::*;
pub use database::*;
pub use error::*;
pub use events::*;
pub use models::*;
pub use services::*;
