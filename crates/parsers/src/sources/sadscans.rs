// ABOUTME: SadScans adapter (Turkish): the whole series catalog comes back on one page.
// ABOUTME: Search narrows that single page; chapter dates read like "05 Mar, 24".

use async_trait::async_trait;

use crate::config::{SourceConfig, SourceConfigBuilder};
use crate::date::DateNormalizer;
use crate::dom;
use crate::error::Result;
use crate::model::{
    ContentType, FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter,
    MangaPage, MangaSource, MangaState, SortOrder,
};
use crate::paging::{encode_query, ListQuery, Paging};
use crate::parser::{MangaParser, SourceContext};

const SORT_ORDERS: &[SortOrder] = &[SortOrder::Alphabetical];

pub struct SadScans {
    ctx: SourceContext,
    dates: DateNormalizer,
}

impl SadScans {
    pub const NAME: &'static str = "SADSCANS";

    pub fn descriptor() -> MangaSource {
        MangaSource::new(Self::NAME, "SadScans", Some("tr"), ContentType::Manga)
    }

    pub fn default_config() -> SourceConfig {
        SourceConfigBuilder::new("sadscans.com").build()
    }

    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self {
            ctx: SourceContext::new(Self::descriptor(), config)?,
            dates: DateNormalizer::new("%d %b, %y"),
        })
    }

    fn list_url(&self, query: &ListQuery) -> String {
        match query.query() {
            Some(q) => format!("{}/series?search={}", self.ctx.base_url(), encode_query(q)),
            None => format!("{}/series", self.ctx.base_url()),
        }
    }

    /// Site links are relative without a leading slash.
    fn rooted(href: &str) -> String {
        if href.starts_with('/') || href.contains("://") {
            href.to_string()
        } else {
            format!("/{}", href)
        }
    }

    fn parse_list(&self, html: &str) -> Vec<Manga> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), ".series-list")
            .into_iter()
            .filter_map(|item| {
                let href = dom::select_first(item, "a").and_then(|a| dom::attr(a, "href"))?;
                let title = dom::select_first(item, "h2").and_then(dom::text_or_none)?;
                let cover = dom::select_first(item, "img")
                    .and_then(dom::image_src)
                    .map(|src| self.ctx.absolute_url(&Self::rooted(src)));
                Some(Manga {
                    cover_url: cover,
                    ..self.ctx.manga(&Self::rooted(href), title)
                })
            })
            .collect()
    }

    fn parse_details(&self, manga: &Manga, html: &str) -> Manga {
        let doc = dom::parse_document(html);
        let root = doc.root_element();

        let state = dom::select_last(root, ".status span").and_then(|span| {
            match dom::text(span).as_str() {
                "Devam ediyor" => Some(MangaState::Ongoing),
                "Tamamlandı" => Some(MangaState::Finished),
                _ => None,
            }
        });
        let authors = dom::select_last(root, ".author span")
            .and_then(dom::text_or_none)
            .into_iter()
            .collect();

        let items = dom::select_all(root, ".chap-section .chap");
        let chapters = dom::map_chapters(items, true, 1, |_, item| {
            let link = dom::select_first(item, "a")?;
            let href = Self::rooted(dom::attr(link, "href")?);
            let date = dom::select_last(item, ".detail span")
                .map(|span| self.dates.parse(&dom::text(span)))
                .unwrap_or(0);
            Some(self.ctx.chapter(&href, dom::text_or_none(link), date))
        });

        Manga {
            state,
            authors,
            description: dom::select_first(root, ".summary").and_then(dom::text_or_none),
            chapters: Some(chapters),
            ..manga.clone()
        }
    }

    fn parse_pages(&self, html: &str) -> Vec<MangaPage> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), ".swiper-slide img")
            .into_iter()
            .filter_map(dom::image_src)
            .map(|src| self.ctx.page(self.ctx.absolute_url(&Self::rooted(src))))
            .collect()
    }
}

#[async_trait]
impl MangaParser for SadScans {
    fn source(&self) -> &MangaSource {
        self.ctx.source()
    }

    fn config(&self) -> &SourceConfig {
        self.ctx.config()
    }

    fn paging(&self) -> Paging {
        Paging::Single
    }

    fn sort_orders(&self) -> &[SortOrder] {
        SORT_ORDERS
    }

    fn filter_capabilities(&self) -> FilterCapabilities {
        FilterCapabilities {
            is_search_supported: true,
            is_search_with_filters_supported: true,
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
        let html = self.ctx.get_text(&self.list_url(&query)).await?;
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
        Ok(FilterOptions::default())
    }
}
