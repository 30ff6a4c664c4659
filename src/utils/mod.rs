//! Utility modules for common operations

pub mod preprocessing;
pub mod validation;

pub use preprocessing::ImagePreprocessor;
pub use validation::{PathValidator, UploadValidator};
