// ABOUTME: The adapter contract (MangaParser) and the SourceContext every adapter is built on.
// ABOUTME: SourceContext owns the HTTP client and source descriptor and shapes records and urls.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::dom;
use crate::error::Result;
use crate::http::HttpClient;
use crate::model::{
    generate_uid, FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter,
    MangaPage, MangaSource, MangaTag, SortOrder,
};
use crate::paging::{ListQuery, Paging};

/// One site-specific adapter.
///
/// List pages return summary records without chapters; [`details`](MangaParser::details)
/// enriches a summary with tags, authors, description, state and chapters.
#[async_trait]
pub trait MangaParser: Send + Sync {
    fn source(&self) -> &MangaSource;

    fn config(&self) -> &SourceConfig;

    fn paging(&self) -> Paging;

    /// Supported orders; the first one is the default.
    fn sort_orders(&self) -> &[SortOrder];

    fn filter_capabilities(&self) -> FilterCapabilities;

    fn default_sort_order(&self) -> SortOrder {
        self.sort_orders()
            .first()
            .copied()
            .unwrap_or(SortOrder::Updated)
    }

    /// One page (1-based) of the catalog.
    async fn list_page(
        &self,
        page: u32,
        order: SortOrder,
        filter: &MangaListFilter,
    ) -> Result<Vec<Manga>>;

    async fn details(&self, manga: &Manga) -> Result<Manga>;

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>>;

    async fn filter_options(&self) -> Result<FilterOptions>;

    async fn available_tags(&self) -> Result<BTreeSet<MangaTag>> {
        Ok(self.filter_options().await?.available_tags)
    }
}

/// Shared state and helpers for one adapter instance.
#[derive(Debug, Clone)]
pub struct SourceContext {
    source: MangaSource,
    http: HttpClient,
}

impl SourceContext {
    pub fn new(source: MangaSource, config: SourceConfig) -> Result<Self> {
        Ok(Self {
            source,
            http: HttpClient::new(config)?,
        })
    }

    pub fn source(&self) -> &MangaSource {
        &self.source
    }

    pub fn config(&self) -> &SourceConfig {
        self.http.config()
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn domain(&self) -> &str {
        &self.config().domain
    }

    pub fn base_url(&self) -> String {
        self.config().base_url()
    }

    pub fn absolute_url(&self, url: &str) -> String {
        dom::to_absolute_url(url, &self.base_url())
    }

    pub fn relative_url(&self, url: &str) -> String {
        dom::to_relative_url(url, self.domain())
    }

    pub fn uid(&self, url: &str) -> i64 {
        generate_uid(&self.source.name, url)
    }

    /// Validates a list request; `None` when the page lies outside what `paging` can serve.
    pub fn list_query(
        &self,
        paging: Paging,
        capabilities: &FilterCapabilities,
        page: u32,
        order: SortOrder,
        filter: &MangaListFilter,
    ) -> Result<Option<ListQuery>> {
        let query = ListQuery::resolve(capabilities, page, order, filter)?;
        if !paging.covers(page) {
            return Ok(None);
        }
        Ok(Some(query))
    }

    /// Fetches `url` (relative or absolute) and returns the decoded body.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.http.get_text(&self.absolute_url(url)).await
    }

    /// A summary record for a relative manga url.
    pub fn manga(&self, url: &str, title: impl Into<String>) -> Manga {
        let url = self.relative_url(url);
        let public_url = self.absolute_url(&url);
        Manga::summary(&self.source, url, public_url, title)
    }

    /// A chapter record with the ordinal left for [`dom::map_chapters`] to assign.
    pub fn chapter(&self, url: &str, title: Option<String>, upload_date: i64) -> MangaChapter {
        let url = self.relative_url(url);
        MangaChapter {
            id: self.uid(&url),
            title: title.filter(|t| !t.is_empty()),
            number: 0.0,
            volume: 0,
            url,
            scanlator: None,
            upload_date,
            branch: None,
            source: self.source.name.clone(),
        }
    }

    pub fn page(&self, url: impl Into<String>) -> MangaPage {
        MangaPage::new(url, &self.source.name)
    }

    pub fn tag(&self, key: impl Into<String>, title: impl Into<String>) -> MangaTag {
        MangaTag::new(key, title, &self.source.name)
    }
}
