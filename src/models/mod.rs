pub mod chatmodels;
pub mod supportmodel;
