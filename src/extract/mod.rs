//! Extraction engine
//!
//! Turns a decoded document into records. Each field is an ordered chain of
//! strategies (CSS queries for markup, dot paths for JSON, or the page URL);
//! item scopes keep one item's fields from leaking into another's.

mod engine;
mod entity;
mod html;
mod json;
mod strategy;

pub use engine::{Extraction, Extractor};
pub use entity::EntityKeyRule;
pub use strategy::{FieldSpec, Strategy};

pub(crate) use html::first_href;
pub(crate) use json::{parse_path, resolve, scalar_strings};
pub(crate) use strategy::compile_selector;
