pub mod support_handler;

pub use support_handler::SupportEventHandler;
