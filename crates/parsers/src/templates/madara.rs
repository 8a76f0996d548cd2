// ABOUTME: Madara (WordPress manga theme) template adapter.
// ABOUTME: Faceted search via ?s=&post_type=wp-manga, chapter lists inline or through the ajax endpoints.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceConfig;
use crate::date::{DateLocale, DateNormalizer};
use crate::dom;
use crate::error::Result;
use crate::model::{
    FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter, MangaPage,
    MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
use crate::paging::{encode_query, ListQuery, Paging};
use crate::parser::{MangaParser, SourceContext};
use crate::templates::TemplateSite;

const SORT_ORDERS: &[SortOrder] = &[
    SortOrder::Updated,
    SortOrder::Popularity,
    SortOrder::Newest,
    SortOrder::Alphabetical,
    SortOrder::Rating,
];

const ONGOING: &[&str] = &[
    "ongoing", "on going", "updating", "en cours", "en curso", "em andamento",
    "em lançamento", "ativo", "devam ediyor", "publicándose", "en emisión", "emision",
];
const FINISHED: &[&str] = &[
    "completed", "complete", "completo", "completado", "concluído", "concluido",
    "finalizado", "terminé", "tamamlandı", "bitti",
];
const PAUSED: &[&str] = &["on hold", "hiatus", "pausado", "en espera", "durduruldu"];
const ABANDONED: &[&str] = &["canceled", "cancelled", "cancelado", "abandonné", "dropped", "iptal edildi"];

/// Selectors and paths of a Madara site.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MadaraParams {
    /// Catalog path, relative to the site root, with a trailing slash.
    pub list_url: String,
    /// Page listing the genre checkboxes.
    pub genre_endpoint: String,
    /// Chapters are fetched with `admin-ajax.php` instead of `{manga}/ajax/chapters/`.
    pub use_admin_ajax: bool,
    pub date_format: String,
    pub list_item_selector: String,
    pub list_link_selector: String,
    pub details_author_selector: String,
    pub details_description_selector: String,
    pub details_tag_selector: String,
    pub chapter_selector: String,
    pub chapter_date_selector: String,
    pub page_selector: String,
}

impl Default for MadaraParams {
    fn default() -> Self {
        Self {
            list_url: "manga/".into(),
            genre_endpoint: "/?s=genre&post_type=wp-manga".into(),
            use_admin_ajax: false,
            date_format: "%B %d, %Y".into(),
            list_item_selector: "div.c-tabs-item__content, .manga__item, div.page-item-detail"
                .into(),
            list_link_selector: "div.post-title a, h3.h5 a".into(),
            details_author_selector: "div.author-content > a, div.manga-authors > a".into(),
            details_description_selector: "div.description-summary div.summary__content, \
                                           div.summary_content div.post-content_item > h5 + div, \
                                           div.summary_content div.manga-excerpt"
                .into(),
            details_tag_selector: "div.genres-content a".into(),
            chapter_selector: "li.wp-manga-chapter".into(),
            chapter_date_selector: "span.chapter-release-date".into(),
            page_selector: "div.page-break img, li.blocks-gallery-item img, \
                            .reading-content .text-left img"
                .into(),
        }
    }
}

pub struct Madara {
    ctx: SourceContext,
    site: TemplateSite,
    params: MadaraParams,
    dates: DateNormalizer,
}

/// Where the chapter list of a details page lives.
enum ChapterSource {
    Inline(Vec<MangaChapter>),
    /// The list is loaded by script; carries the `data-id` of the holder element.
    Ajax(Option<String>),
}

impl Madara {
    pub fn new(site: TemplateSite, params: MadaraParams, config: SourceConfig) -> Result<Self> {
        let dates = DateNormalizer::new(&params.date_format)
            .with_locale(DateLocale::from_code(site.locale.as_deref()));
        Ok(Self {
            ctx: SourceContext::new(site.descriptor(), config)?,
            site,
            params,
            dates,
        })
    }

    fn order_param(order: SortOrder) -> &'static str {
        match order {
            SortOrder::Popularity => "views",
            SortOrder::Newest => "new-manga",
            SortOrder::Alphabetical => "alphabet",
            SortOrder::Rating => "rating",
            _ => "latest",
        }
    }

    fn list_url(&self, query: &ListQuery) -> String {
        let base = self.ctx.base_url();
        let page_path = if query.page > 1 {
            format!("page/{}/", query.page)
        } else {
            String::new()
        };

        if query.filter.is_empty() {
            return format!(
                "{}/{}{}?m_orderby={}",
                base,
                self.params.list_url,
                page_path,
                Self::order_param(query.order)
            );
        }

        let mut url = format!(
            "{}/{}?s={}&post_type=wp-manga",
            base,
            page_path,
            encode_query(query.query().unwrap_or_default())
        );
        for tag in &query.filter.tags {
            url.push_str("&genre[]=");
            url.push_str(&encode_query(&tag.key));
        }
        for state in &query.filter.states {
            url.push_str("&status[]=");
            url.push_str(match state {
                MangaState::Ongoing => "on-going",
                MangaState::Finished => "end",
                MangaState::Paused => "on-hold",
                MangaState::Abandoned => "canceled",
            });
        }
        url.push_str("&m_orderby=");
        url.push_str(Self::order_param(query.order));
        url
    }

    fn parse_list(&self, html: &str) -> Vec<Manga> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), &self.params.list_item_selector)
            .into_iter()
            .filter_map(|item| {
                let link = dom::select_first(item, &self.params.list_link_selector)?;
                let href = dom::attr(link, "href")?;
                let cover = dom::select_first(item, "img")
                    .and_then(dom::image_src)
                    .map(|src| self.ctx.absolute_url(src));
                Some(Manga {
                    cover_url: cover,
                    ..self.ctx.manga(href, dom::text(link))
                })
            })
            .collect()
    }

    fn parse_chapters(&self, root: scraper::ElementRef<'_>) -> Vec<MangaChapter> {
        let items = dom::select_all(root, &self.params.chapter_selector);
        dom::map_chapters(items, true, 1, |_, li| {
            let link = dom::select_first(li, "a")?;
            let href = dom::attr(link, "href")?;
            let date = dom::select_first(li, &self.params.chapter_date_selector)
                .and_then(|el| {
                    dom::text_or_none(el).or_else(|| {
                        // fresh chapters show an icon whose title holds the relative date
                        dom::select_first(el, "a[title]")
                            .and_then(|a| dom::attr(a, "title"))
                            .map(str::to_string)
                    })
                })
                .map(|text| self.dates.parse(&text))
                .unwrap_or(0);
            Some(self.ctx.chapter(href, dom::text_or_none(link), date))
        })
    }

    fn parse_chapter_fragment(&self, html: &str) -> Vec<MangaChapter> {
        let doc = dom::parse_document(html);
        self.parse_chapters(doc.root_element())
    }

    fn parse_details(&self, manga: &Manga, html: &str) -> (Manga, ChapterSource) {
        let doc = dom::parse_document(html);
        let root = doc.root_element();

        let tags: BTreeSet<MangaTag> = dom::select_all(root, &self.params.details_tag_selector)
            .into_iter()
            .filter_map(|a| {
                let href = dom::attr(a, "href")?;
                let key = href.trim_end_matches('/').rsplit('/').next()?;
                Some(self.ctx.tag(key, dom::text(a)))
            })
            .into_tag_set();
        let authors = dom::select_all(root, &self.params.details_author_selector)
            .into_iter()
            .filter_map(dom::text_or_none)
            .collect();
        let state = dom::select_containing(root, "div.summary-heading", "Status")
            .or_else(|| dom::select_containing(root, "div.summary-heading", "Estado"))
            .or_else(|| dom::select_containing(root, "div.summary-heading", "Durum"))
            .and_then(dom::next_element_sibling)
            .and_then(|el| parse_state(&dom::text(el)));
        let alt_titles = dom::select_containing(root, "div.summary-heading", "Alternative")
            .and_then(dom::next_element_sibling)
            .map(|el| {
                dom::text(el)
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let chapters = self.parse_chapters(root);
        let source = if !chapters.is_empty() {
            ChapterSource::Inline(chapters)
        } else {
            let holder = dom::select_first(root, "div[id^=manga-chapters-holder]")
                .and_then(|el| dom::attr(el, "data-id"))
                .map(str::to_string);
            ChapterSource::Ajax(holder)
        };

        let details = Manga {
            tags,
            authors,
            state,
            alt_titles,
            description: dom::select_first(root, &self.params.details_description_selector)
                .and_then(dom::text_or_none),
            cover_url: dom::select_first(root, "div.summary_image img")
                .and_then(dom::image_src)
                .map(|src| self.ctx.absolute_url(src))
                .or_else(|| manga.cover_url.clone()),
            ..manga.clone()
        };
        (details, source)
    }

    async fn fetch_chapters(&self, manga: &Manga, holder: Option<String>) -> Result<Vec<MangaChapter>> {
        let html = match (self.params.use_admin_ajax, holder) {
            (true, Some(id)) => {
                let url = format!("{}/wp-admin/admin-ajax.php", self.ctx.base_url());
                debug!(url = %url, manga = %id, "loading chapters through admin-ajax");
                self.ctx
                    .http()
                    .post_form(&url, &[("action", "manga_get_chapters"), ("manga", id.as_str())])
                    .await?
            }
            _ => {
                let mut url = self.ctx.absolute_url(&manga.url);
                if !url.ends_with('/') {
                    url.push('/');
                }
                url.push_str("ajax/chapters/");
                debug!(url = %url, "loading chapters through ajax endpoint");
                self.ctx.http().post_form(&url, &[]).await?
            }
        };
        Ok(self.parse_chapter_fragment(&html))
    }

    fn parse_pages(&self, html: &str) -> Vec<MangaPage> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), &self.params.page_selector)
            .into_iter()
            .filter_map(dom::image_src)
            .map(|src| self.ctx.page(self.ctx.absolute_url(src)))
            .collect()
    }

    fn parse_genres(&self, html: &str) -> BTreeSet<MangaTag> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), "div.checkbox-group div.checkbox")
            .into_iter()
            .filter_map(|item| {
                let key = dom::select_first(item, "input[type=checkbox]")
                    .and_then(|input| dom::attr(input, "value"))?;
                let title = dom::select_first(item, "label").and_then(dom::text_or_none)?;
                Some(self.ctx.tag(key, title))
            })
            .into_tag_set()
    }
}

fn parse_state(text: &str) -> Option<MangaState> {
    let text = text.to_lowercase();
    let matches = |words: &[&str]| words.iter().any(|w| text == *w);
    if matches(ONGOING) {
        Some(MangaState::Ongoing)
    } else if matches(FINISHED) {
        Some(MangaState::Finished)
    } else if matches(PAUSED) {
        Some(MangaState::Paused)
    } else if matches(ABANDONED) {
        Some(MangaState::Abandoned)
    } else {
        None
    }
}

#[async_trait]
impl MangaParser for Madara {
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
        self.site.capabilities.apply(FilterCapabilities {
            is_search_supported: true,
            is_search_with_filters_supported: true,
            is_multiple_tags_supported: true,
            is_tags_exclusion_supported: false,
        })
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
        let (details, chapters) = self.parse_details(manga, &html);
        let chapters = match chapters {
            ChapterSource::Inline(chapters) => chapters,
            ChapterSource::Ajax(holder) => self.fetch_chapters(manga, holder).await?,
        };
        Ok(Manga {
            chapters: Some(chapters),
            ..details
        })
    }

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>> {
        let html = self.ctx.get_text(&chapter.url).await?;
        Ok(self.parse_pages(&html))
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        let html = self.ctx.get_text(&self.params.genre_endpoint).await?;
        Ok(FilterOptions {
            available_tags: self.parse_genres(&html),
            available_states: [
                MangaState::Ongoing,
                MangaState::Finished,
                MangaState::Paused,
                MangaState::Abandoned,
            ]
            .into_iter()
            .collect(),
            available_content_ratings: BTreeSet::new(),
        })
    }
}
