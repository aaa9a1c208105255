pub mod filters;
pub mod support_panel;

pub use filters::{categories, filter_records, SupportFilters, SupportStats};
pub use support_panel::SupportPanel;
