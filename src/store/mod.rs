pub mod supportstore;

pub use supportstore::{DetailView, Notice, NoticeLevel, SupportSnapshot, SupportStore};
