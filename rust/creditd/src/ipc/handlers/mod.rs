pub mod auth;
pub mod catalog;
pub mod changes;
pub mod completion;
pub mod core;
pub mod progress;
pub mod reports;
pub mod settings;
pub mod students;
