// ABOUTME: MangaHere adapter: directory listings per genre and sort order, title search.
// ABOUTME: Chapter dates are "Today", "N hours ago", "Yesterday" or "Mar 05,2024"; any "ago" reads as today.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::{SourceConfig, SourceConfigBuilder};
use crate::date::{DateNormalizer, RelativePrecision};
use crate::dom;
use crate::error::Result;
use crate::model::{
    ContentType, FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter,
    MangaPage, MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
use crate::paging::{encode_query, ListQuery, Paging};
use crate::parser::{MangaParser, SourceContext};

const SORT_ORDERS: &[SortOrder] = &[
    SortOrder::Updated,
    SortOrder::Popularity,
    SortOrder::Rating,
    SortOrder::Alphabetical,
    SortOrder::Newest,
];

const DIRECTORY_ITEM: &str = ".manga-list-1-list li";
const SEARCH_ITEM: &str = ".manga-list-4-list > li";

pub struct Mangahere {
    ctx: SourceContext,
    dates: DateNormalizer,
}

impl Mangahere {
    pub const NAME: &'static str = "MANGAHERE";

    pub fn descriptor() -> MangaSource {
        MangaSource::new(Self::NAME, "MangaHere", None, ContentType::Manga)
    }

    pub fn default_config() -> SourceConfig {
        SourceConfigBuilder::new("www.mangahere.cc")
            .page_size(60)
            .search_page_size(12)
            .build()
    }

    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self {
            ctx: SourceContext::new(Self::descriptor(), config)?,
            dates: DateNormalizer::new("%b %d,%Y")
                .with_format("%b %d, %Y")
                .with_precision(RelativePrecision::Today),
        })
    }

    fn list_url(&self, query: &ListQuery) -> Result<String> {
        let base = self.ctx.base_url();
        if let Some(q) = query.query() {
            return Ok(format!(
                "{}/search?title={}&page={}",
                base,
                encode_query(q),
                query.page
            ));
        }
        let section = query.tag()?.map(|t| t.key.as_str()).unwrap_or("directory");
        let sort = match query.order {
            SortOrder::Updated => "?latest",
            SortOrder::Rating => "?rating",
            SortOrder::Alphabetical => "?az",
            SortOrder::Newest => "?news",
            _ => "",
        };
        Ok(format!("{}/{}/{}.htm{}", base, section, query.page, sort))
    }

    fn parse_list(&self, html: &str) -> Vec<Manga> {
        let doc = dom::parse_document(html);
        let root = doc.root_element();
        let mut items = dom::select_all(root, DIRECTORY_ITEM);
        if items.is_empty() {
            items = dom::select_all(root, SEARCH_ITEM);
        }
        items
            .into_iter()
            .filter_map(|li| {
                let link = dom::select_first(li, "a")?;
                let href = dom::attr(link, "href")?;
                let title = dom::attr(link, "title")
                    .map(str::to_string)
                    .or_else(|| {
                        dom::select_first(li, ".manga-list-4-item-title a, p.manga-list-1-item-title a")
                            .and_then(dom::text_or_none)
                    })?;
                let cover = dom::select_first(li, "img.manga-list-1-cover, img.manga-list-4-cover")
                    .and_then(dom::image_src)
                    .map(|src| self.ctx.absolute_url(src));
                Some(Manga {
                    cover_url: cover,
                    ..self.ctx.manga(href, title)
                })
            })
            .collect()
    }

    fn parse_details(&self, manga: &Manga, html: &str) -> Manga {
        let doc = dom::parse_document(html);
        let root = doc.root_element();

        let tags: BTreeSet<MangaTag> = dom::select_all(root, ".detail-info-right-tag-list > a")
            .into_iter()
            .filter_map(|a| {
                let key = last_segment(dom::attr(a, "href")?)?;
                let title = dom::attr(a, "title")
                    .map(str::to_string)
                    .unwrap_or_else(|| dom::text(a));
                Some(self.ctx.tag(key, title))
            })
            .into_tag_set();
        let state = dom::select_first(root, "span.detail-info-right-title-tip")
            .map(|tip| dom::text(tip).to_lowercase())
            .and_then(|tip| match tip.as_str() {
                "ongoing" => Some(MangaState::Ongoing),
                "complete" | "completed" => Some(MangaState::Finished),
                _ => None,
            });
        let authors = dom::select_all(root, ".detail-info-right-say > a")
            .into_iter()
            .filter_map(dom::text_or_none)
            .collect();

        let items = dom::select_all(root, "ul.detail-main-list > li");
        let chapters = dom::map_chapters(items, true, 1, |_, li| {
            let link = dom::select_first(li, "a")?;
            let href = dom::attr(link, "href")?;
            let title = dom::select_first(li, "p.title3").and_then(dom::text_or_none);
            let date = dom::select_first(li, "p.title2")
                .map(|p| self.dates.parse(&dom::text(p)))
                .unwrap_or(0);
            Some(self.ctx.chapter(href, title, date))
        });

        Manga {
            tags,
            state,
            authors,
            description: dom::select_first(root, ".fullcontent").and_then(dom::text_or_none),
            chapters: Some(chapters),
            ..manga.clone()
        }
    }

    fn parse_pages(&self, html: &str) -> Vec<MangaPage> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), ".chapter-container img")
            .into_iter()
            .filter_map(dom::image_src)
            .map(|src| self.ctx.page(self.ctx.absolute_url(src)))
            .collect()
    }

    fn parse_tags(&self, html: &str) -> BTreeSet<MangaTag> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), ".update-bar-filter-list-title ~ ul > li > a")
            .into_iter()
            .filter_map(|a| {
                let title = dom::text_or_none(a).filter(|t| t.as_str() != "All")?;
                let key = last_segment(dom::attr(a, "href")?)?;
                Some(self.ctx.tag(key, title))
            })
            .into_tag_set()
    }
}

/// Last non-empty path segment, e.g. `action` for `/directory/action/`.
fn last_segment(href: &str) -> Option<&str> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.ends_with(".htm"))
}

#[async_trait]
impl MangaParser for Mangahere {
    fn source(&self) -> &MangaSource {
        self.ctx.source()
    }

    fn config(&self) -> &SourceConfig {
        self.ctx.config()
    }

    fn paging(&self) -> Paging {
        Paging::paged(self.config().page_size, self.config().search_page_size)
    }

    fn sort_orders(&self) -> &[SortOrder] {
        SORT_ORDERS
    }

    fn filter_capabilities(&self) -> FilterCapabilities {
        FilterCapabilities {
            is_search_supported: true,
            ..Default::default()
        }
    }

    async fn list_page(
        &self,
        page: u32,
        order: SortOrder,
        filter: &MangaListFilter,
    ) -> Result<Vec<Manga>> {
        let caps = self.filter_capabilities();
        let Some(query) = self.ctx.list_query(self.paging(), &caps, page, order, filter)? else {
            return Ok(Vec::new());
        };
        let html = self.ctx.get_text(&self.list_url(&query)?).await?;
        Ok(self.parse_list(&html))
    }

    async fn details(&self, manga: &Manga) -> Result<Manga> {
        let html = self.ctx.get_text(&manga.url).await?;
        Ok(self.parse_details(manga, &html))
    }

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>> {
        let html = self.ctx.get_text(&chapter.url).await?;
        Ok(self.parse_pages(&html))
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        let html = self.ctx.get_text("/directory/").await?;
        Ok(FilterOptions {
            available_tags: self.parse_tags(&html),
            available_states: [MangaState::Ongoing, MangaState::Finished].into_iter().collect(),
            available_content_ratings: BTreeSet::new(),
        })
    }
}
