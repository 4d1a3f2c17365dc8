pub mod analysis;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod logging;
pub mod models;
pub mod ner;
pub mod oracle;
pub mod recommend;
pub mod store;

pub use config::AppConfig;
pub use errors::*;
