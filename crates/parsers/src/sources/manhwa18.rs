// ABOUTME: Manhwa18.net adapter: faceted search with genre ids, relative chapter dates.
// ABOUTME: Genre names on detail pages are resolved through a tag map fetched once per instance.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::{SourceConfig, SourceConfigBuilder};
use crate::date::DateNormalizer;
use crate::dom;
use crate::error::{ParserError, Result};
use crate::model::{
    ContentType, FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter,
    MangaPage, MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
use crate::paging::{encode_query, ListQuery, Paging};
use crate::parser::{MangaParser, SourceContext};

const SORT_ORDERS: &[SortOrder] = &[
    SortOrder::Updated,
    SortOrder::Popularity,
    SortOrder::Alphabetical,
    SortOrder::Newest,
    SortOrder::Rating,
];

pub struct Manhwa18 {
    ctx: SourceContext,
    dates: DateNormalizer,
    /// Lowercased genre name to tag.
    tags: OnceCell<BTreeMap<String, MangaTag>>,
}

impl Manhwa18 {
    pub const NAME: &'static str = "MANHWA18";

    pub fn descriptor() -> MangaSource {
        MangaSource::new(Self::NAME, "Manhwa18.net", Some("en"), ContentType::Hentai)
    }

    pub fn default_config() -> SourceConfig {
        SourceConfigBuilder::new("manhwa18.net")
            .page_size(18)
            .search_page_size(18)
            .build()
    }

    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self {
            ctx: SourceContext::new(Self::descriptor(), config)?,
            dates: DateNormalizer::default(),
            tags: OnceCell::new(),
        })
    }

    fn list_url(&self, query: &ListQuery) -> Result<String> {
        let mut url = format!("{}/tim-kiem?page={}", self.ctx.base_url(), query.page);
        if let Some(q) = query.query() {
            url.push_str("&q=");
            url.push_str(&encode_query(q));
            return Ok(url);
        }
        url.push_str("&accept_genres=");
        url.push_str(&query.tag_keys(","));
        url.push_str("&reject_genres=");
        url.push_str(&query.excluded_tag_keys(","));
        url.push_str("&sort=");
        url.push_str(match query.order {
            SortOrder::Alphabetical => "az",
            SortOrder::AlphabeticalDesc => "za",
            SortOrder::Popularity => "top",
            SortOrder::Updated => "update",
            SortOrder::Newest => "new",
            SortOrder::Rating => "like",
            _ => "",
        });
        if let Some(state) = query.state()? {
            url.push_str("&status=");
            url.push_str(match state {
                MangaState::Ongoing => "1",
                MangaState::Finished => "3",
                MangaState::Paused => "2",
                MangaState::Abandoned => "",
            });
        }
        Ok(url)
    }

    /// The genre tag map, fetched on first use.
    async fn tag_map(&self) -> Result<&BTreeMap<String, MangaTag>> {
        self.tags
            .get_or_try_init(|| async {
                debug!(source = Self::NAME, "loading genre map");
                let html = self.ctx.get_text("/tim-kiem?q=").await?;
                Ok::<_, ParserError>(self.parse_tag_map(&html))
            })
            .await
    }

    fn parse_tag_map(&self, html: &str) -> BTreeMap<String, MangaTag> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), "[data-genre-id]")
            .into_iter()
            .filter_map(|el| {
                let id = dom::attr(el, "data-genre-id")?;
                let name = dom::text_or_none(el)?;
                Some((name.to_lowercase(), self.ctx.tag(id, title_case(&name))))
            })
            .collect()
    }

    fn parse_list(&self, html: &str) -> Vec<Manga> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), ".card-body .thumb-item-flow")
            .into_iter()
            .filter_map(|item| {
                let link = dom::select_first(item, ".thumb_attr.series-title > a")?;
                let href = dom::attr(link, "href")?;
                let cover = dom::select_first(item, "div.img-in-ratio")
                    .and_then(|el| dom::attr_as_absolute_url(el, "data-bg", &self.ctx.base_url()));
                Some(Manga {
                    cover_url: cover,
                    ..self.ctx.manga(href, dom::text(link))
                })
            })
            .collect()
    }

    fn parse_details(
        &self,
        manga: &Manga,
        html: &str,
        tag_map: &BTreeMap<String, MangaTag>,
    ) -> Manga {
        let doc = dom::parse_document(html);
        let root = doc.root_element();
        let info = dom::select_first(root, "div.series-information");

        let info_links = |label: &str| -> Vec<String> {
            info.and_then(|el| dom::select_containing(el, ".info-name", label))
                .and_then(dom::parent_element)
                .map(|parent| {
                    dom::select_all(parent, "a")
                        .into_iter()
                        .filter_map(dom::text_or_none)
                        .collect()
                })
                .unwrap_or_default()
        };

        let tags = info_links("Genre")
            .iter()
            .filter_map(|name| tag_map.get(&name.to_lowercase()).cloned())
            .into_tag_set();
        let state = info_links("Status")
            .first()
            .and_then(|s| match s.to_lowercase().as_str() {
                "on going" => Some(MangaState::Ongoing),
                "completed" => Some(MangaState::Finished),
                "on hold" => Some(MangaState::Paused),
                _ => None,
            });
        let alt_titles = info
            .and_then(|el| dom::select_containing(el, "b", "Other names"))
            .and_then(dom::parent_element)
            .map(|parent| {
                let own = dom::own_text(parent);
                own.trim_start_matches(':').trim().to_string()
            })
            .filter(|alt| !alt.is_empty())
            .into_iter()
            .collect();

        let links = dom::select_all(root, ".card-body > .list-chapters > a");
        let chapters = dom::map_chapters(links, true, 1, |_, link| {
            let href = dom::attr(link, "href")?;
            let name = dom::select_first(link, ".chapter-name").and_then(dom::text_or_none);
            let date = dom::select_first(link, ".chapter-time")
                .map(|el| self.dates.parse(&dom::text(el)))
                .unwrap_or(0);
            Some(self.ctx.chapter(href, name, date))
        });

        Manga {
            alt_titles,
            authors: info_links("Author").into_iter().collect(),
            tags,
            state,
            description: dom::select_first(root, ".series-summary .summary-content")
                .and_then(dom::text_or_none),
            chapters: Some(chapters),
            ..manga.clone()
        }
    }

    fn parse_pages(&self, html: &str, url: &str) -> Result<Vec<MangaPage>> {
        let doc = dom::parse_document(html);
        let content = dom::require_first(doc.root_element(), "#chapter-content", url)?;
        Ok(dom::select_all(content, "img")
            .into_iter()
            .filter_map(dom::image_src)
            .map(|src| self.ctx.page(self.ctx.absolute_url(src)))
            .collect())
    }
}

fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl MangaParser for Manhwa18 {
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
            is_search_with_filters_supported: false,
            is_multiple_tags_supported: true,
            is_tags_exclusion_supported: true,
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
        let tag_map = self.tag_map().await?;
        let html = self.ctx.get_text(&manga.url).await?;
        Ok(self.parse_details(manga, &html, tag_map))
    }

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>> {
        let url = self.ctx.absolute_url(&chapter.url);
        let html = self.ctx.get_text(&url).await?;
        self.parse_pages(&html, &url)
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        Ok(FilterOptions {
            available_tags: self.tag_map().await?.values().cloned().into_tag_set(),
            available_states: [MangaState::Ongoing, MangaState::Finished, MangaState::Paused]
                .into_iter()
                .collect(),
            available_content_ratings: BTreeSet::new(),
        })
    }
}
