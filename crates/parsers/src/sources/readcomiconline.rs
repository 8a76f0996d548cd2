// ABOUTME: ReadComicOnline adapter: comic lists, advanced search combining query and genres.
// ABOUTME: Genres come from a static id table; page urls are read from the reader's inline script.

use std::collections::BTreeSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{SourceConfig, SourceConfigBuilder};
use crate::date::DateNormalizer;
use crate::dom;
use crate::error::{ParserError, Result};
use crate::model::{
    ContentRating, ContentType, FilterCapabilities, FilterOptions, Manga, MangaChapter,
    MangaListFilter, MangaPage, MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
use crate::paging::{encode_query, ListQuery, Paging};
use crate::parser::{MangaParser, SourceContext};

const SORT_ORDERS: &[SortOrder] = &[
    SortOrder::Updated,
    SortOrder::Popularity,
    SortOrder::Newest,
    SortOrder::Alphabetical,
];

static IMAGE_PUSH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"lstImages\.push\(\s*["']([^"']+)["']\s*\)"#).unwrap());

const GENRES: &[(&str, &str)] = &[
    ("1", "Action"),
    ("2", "Adventure"),
    ("38", "Anthology"),
    ("46", "Anthropomorphic"),
    ("41", "Biography"),
    ("49", "Children"),
    ("3", "Comedy"),
    ("17", "Crime"),
    ("19", "Drama"),
    ("25", "Family"),
    ("20", "Fantasy"),
    ("31", "Fighting"),
    ("5", "Graphic Novels"),
    ("28", "Historical"),
    ("15", "Horror"),
    ("35", "Leading Ladies"),
    ("51", "LGBTQ"),
    ("44", "Literature"),
    ("40", "Manga"),
    ("4", "Martial Arts"),
    ("8", "Mature"),
    ("33", "Military"),
    ("56", "Mini-Series"),
    ("47", "Movies & TV"),
    ("55", "Music"),
    ("23", "Mystery"),
    ("21", "Mythology"),
    ("48", "Personal"),
    ("42", "Political"),
    ("43", "Post-Apocalyptic"),
    ("27", "Psychological"),
    ("39", "Pulp"),
    ("53", "Religious"),
    ("9", "Robots"),
    ("32", "Romance"),
    ("52", "School Life"),
    ("16", "Sci-Fi"),
    ("50", "Slice of Life"),
    ("54", "Sport"),
    ("30", "Spy"),
    ("22", "Superhero"),
    ("24", "Supernatural"),
    ("29", "Suspense"),
    ("18", "Thriller"),
    ("34", "Vampires"),
    ("37", "Video Games"),
    ("26", "War"),
    ("45", "Western"),
    ("36", "Zombies"),
];

pub struct ReadComicOnline {
    ctx: SourceContext,
    dates: DateNormalizer,
}

impl ReadComicOnline {
    pub const NAME: &'static str = "READCOMICONLINE";

    pub fn descriptor() -> MangaSource {
        MangaSource::new(Self::NAME, "ReadComicOnline", Some("en"), ContentType::Comics)
    }

    pub fn default_config() -> SourceConfig {
        SourceConfigBuilder::new("readcomiconline.li")
            .page_size(20)
            .search_page_size(20)
            .build()
    }

    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self {
            ctx: SourceContext::new(Self::descriptor(), config)?,
            dates: DateNormalizer::new("%m/%d/%Y"),
        })
    }

    fn list_url(&self, query: &ListQuery) -> String {
        let base = self.ctx.base_url();
        if query.filter.is_empty() {
            let path = match query.order {
                SortOrder::Updated => "ComicList/LatestUpdate",
                SortOrder::Newest => "ComicList/Newest",
                SortOrder::Alphabetical => "ComicList",
                _ => "ComicList/MostPopular",
            };
            return format!("{}/{}?page={}", base, path, query.page);
        }

        let mut url = format!(
            "{}/AdvanceSearch?comicName={}&page={}",
            base,
            encode_query(query.query().unwrap_or_default()),
            query.page
        );
        let states = &query.filter.states;
        if !states.is_empty() {
            let status = if states.contains(&MangaState::Finished) {
                "Completed"
            } else if states.contains(&MangaState::Ongoing) {
                "Ongoing"
            } else {
                ""
            };
            url.push_str("&status=");
            url.push_str(status);
        }
        if !query.filter.tags.is_empty() {
            url.push_str("&ig=");
            url.push_str(&encode_query(&query.tag_keys(",")));
        }
        if !query.filter.tags_exclude.is_empty() {
            url.push_str("&eg=");
            url.push_str(&encode_query(&query.excluded_tag_keys(",")));
        }
        url
    }

    fn parse_list(&self, html: &str) -> Vec<Manga> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), "div.item-list div.section.group.list")
            .into_iter()
            .filter_map(|item| {
                let link = dom::select_first(item, "div.col.info p:first-child a")?;
                let href = dom::attr(link, "href")?;
                let cover = dom::select_first(item, "div.col.cover a img")
                    .and_then(dom::image_src)
                    .map(|src| self.ctx.absolute_url(src));
                Some(Manga {
                    cover_url: cover,
                    ..self.ctx.manga(href, dom::text(link))
                })
            })
            .collect()
    }

    fn parse_details(&self, manga: &Manga, html: &str) -> Result<Manga> {
        let doc = dom::parse_document(html);
        let root = doc.root_element();
        let url = manga.public_url.as_str();
        let info = dom::require_first(root, "div.section.group div.col.info", url)?;
        let title = dom::text(dom::require_first(root, "div.heading h3", url)?);

        let labelled_links = |label: &str| -> Vec<String> {
            dom::select_containing(info, "p", label)
                .map(|p| {
                    dom::select_all(p, "a")
                        .into_iter()
                        .filter_map(dom::text_or_none)
                        .collect()
                })
                .unwrap_or_default()
        };

        let tags: BTreeSet<MangaTag> = labelled_links("Genres:")
            .into_iter()
            .map(|name| self.ctx.tag(name.clone(), name))
            .into_tag_set();
        let content_rating = if tags.iter().any(|t| t.title.eq_ignore_ascii_case("Mature")) {
            ContentRating::Adult
        } else {
            ContentRating::Safe
        };
        let state = dom::select_containing(info, "p", "Status:")
            .map(dom::text)
            .and_then(|status| {
                if status.contains("Ongoing") {
                    Some(MangaState::Ongoing)
                } else if status.contains("Completed") {
                    Some(MangaState::Finished)
                } else {
                    None
                }
            });
        let description = dom::select_all(root, "div.section.group")
            .get(1)
            .map(|section| {
                dom::select_all(*section, "p")
                    .into_iter()
                    .map(dom::text)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|d| !d.trim().is_empty());
        let cover = dom::select_first(root, "div.col.cover img")
            .and_then(|img| dom::attr_as_absolute_url(img, "src", &self.ctx.base_url()));

        let rows = dom::select_first(root, "ul.list")
            .map(|list| dom::select_all(list, "li"))
            .unwrap_or_default();
        let chapters = dom::map_chapters(rows, true, 1, |_, row| {
            let link = dom::select_first(row, "div.col-1 a")?;
            let href = dom::attr(link, "href")?;
            let date = dom::select_first(row, "div.col-2 span")
                .map(|span| self.dates.parse(&dom::text(span)))
                .unwrap_or(0);
            Some(self.ctx.chapter(href, dom::text_or_none(link), date))
        });

        Ok(Manga {
            title,
            authors: labelled_links("Writer:").into_iter().collect(),
            description,
            tags,
            state,
            cover_url: cover.or_else(|| manga.cover_url.clone()),
            content_rating: Some(content_rating),
            chapters: Some(chapters),
            ..manga.clone()
        })
    }

    fn parse_pages(&self, html: &str, url: &str) -> Result<Vec<MangaPage>> {
        let pages: Vec<MangaPage> = IMAGE_PUSH
            .captures_iter(html)
            .map(|c| self.ctx.page(self.ctx.absolute_url(&c[1])))
            .collect();
        if pages.is_empty() {
            return Err(ParserError::not_found(url, "lstImages.push"));
        }
        Ok(pages)
    }
}

#[async_trait]
impl MangaParser for ReadComicOnline {
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
            is_search_with_filters_supported: true,
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
        let html = self.ctx.get_text(&self.list_url(&query)).await?;
        Ok(self.parse_list(&html))
    }

    async fn details(&self, manga: &Manga) -> Result<Manga> {
        let html = self.ctx.get_text(&manga.url).await?;
        self.parse_details(manga, &html)
    }

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>> {
        let url = self.ctx.absolute_url(&chapter.url);
        let html = self.ctx.get_text(&url).await?;
        self.parse_pages(&html, &url)
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        Ok(FilterOptions {
            available_tags: GENRES
                .iter()
                .map(|(key, title)| self.ctx.tag(*key, *title))
                .collect(),
            available_states: [MangaState::Ongoing, MangaState::Finished].into_iter().collect(),
            available_content_ratings: BTreeSet::new(),
        })
    }
}
