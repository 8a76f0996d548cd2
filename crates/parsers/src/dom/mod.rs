// ABOUTME: HTML querying layer: selector cache, extraction helpers and chapter mapping.
// ABOUTME: Documents are parsed and dropped inside synchronous helpers; nothing here is async.

pub mod chapters;
pub mod compiled;
pub mod select;

pub use chapters::map_chapters;
pub use select::*;
