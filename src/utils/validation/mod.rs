//! Validation utilities shared by the job runner, server and CLI

pub mod path;
pub mod upload;

pub use path::PathValidator;
pub use upload::UploadValidator;
