pub mod batch;
pub mod reminder;
pub mod store;
