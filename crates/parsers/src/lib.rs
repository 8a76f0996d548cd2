// ABOUTME: Library entry point for the tankobon manga site adapters.
// ABOUTME: Re-exports the adapter contract, data model, errors, configuration and every adapter.

//! tankobon-parsers - scraping adapters for manga, manhwa and comic sites.
//!
//! Every site is a [`MangaParser`]: it lists catalog pages, fills in series details and
//! chapters, and resolves a chapter to its page images. Adapters share the same HTTP
//! client, selector helpers, date normalizer and filter validation through
//! [`SourceContext`].
//!
//! # Example
//!
//! ```no_run
//! use tankobon_parsers::{Mangahere, MangaListFilter, MangaParser, ParserError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ParserError> {
//!     let parser = Mangahere::new(Mangahere::default_config())?;
//!     let filter = MangaListFilter {
//!         query: Some("berserk".into()),
//!         ..Default::default()
//!     };
//!     let found = parser.list_page(1, parser.default_sort_order(), &filter).await?;
//!     if let Some(first) = found.first() {
//!         let details = parser.details(first).await?;
//!         println!("{} chapters", details.chapters.map(|c| c.len()).unwrap_or(0));
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod date;
pub mod dom;
pub mod error;
pub mod http;
pub mod imagepipe;
pub mod model;
pub mod paging;
pub mod parser;
pub mod sources;
pub mod templates;

pub use crate::config::{SourceConfig, SourceConfigBuilder};
pub use crate::date::{DateLocale, DateNormalizer, RelativePrecision};
pub use crate::error::{ErrorCode, ParserError, Result};
pub use crate::http::{FetchResult, HttpClient};
pub use crate::imagepipe::{ImagePipeline, QuickJsEvaluator, ScriptEvaluator};
pub use crate::model::{
    ContentRating, ContentType, FilterCapabilities, FilterOptions, Manga, MangaChapter,
    MangaListFilter, MangaPage, MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
pub use crate::paging::{ListQuery, Paging};
pub use crate::parser::{MangaParser, SourceContext};
pub use crate::sources::{Mangago, Mangahere, Manhwa18, ReadComicOnline, SadScans, ScantradUnion};
pub use crate::templates::{builtin_sites, find_site, TemplateSite};
