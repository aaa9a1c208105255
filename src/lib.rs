pub mod config;
pub mod console;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod models;
pub mod panel;
pub mod realtime;
pub mod service;
pub mod store;

pub use config::Config;
pub use console::SupportConsole;
pub use error::ConsoleError;
