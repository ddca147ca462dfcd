pub mod document;
pub mod error;

pub use document::{
    Document, ID_ATTRIBUTE, KEY_ATTRIBUTE, REV_ATTRIBUTE, is_system_attribute, new_revision,
};
pub use error::{DbError, Result};
