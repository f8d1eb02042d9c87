pub mod config;
pub mod conversation;
pub mod engine;
pub mod knowledge;
pub mod mode;
pub mod models;
pub mod render;
pub mod scoring;
pub mod server;
pub mod together;
pub mod tokenizer;

pub use config::AppConfig;
pub use engine::Resolver;
pub use server::run_server;
