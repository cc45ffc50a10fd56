pub mod sanitize;
pub mod staging;
