// ABOUTME: Mangago adapter: genre listing with exclusion, search, details and encrypted page lists.
// ABOUTME: Page urls come from the obfuscated image pipeline behind a `_m_superu` cookie.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::{SourceConfig, SourceConfigBuilder};
use crate::date::DateNormalizer;
use crate::dom;
use crate::error::Result;
use crate::imagepipe::{self, ImagePipeline};
use crate::model::{
    ContentType, FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter,
    MangaPage, MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
use crate::paging::{encode_query, ListQuery, Paging};
use crate::parser::{MangaParser, SourceContext};

const SORT_ORDERS: &[SortOrder] = &[SortOrder::Updated, SortOrder::Popularity, SortOrder::Newest];

const LIST_ITEM: &str = ".thm-effect";
const CHAPTER_ROW: &str = "table#chapter_table > tbody > tr, table.uk-table > tbody > tr";
const READER_COOKIE: (&str, &str) = ("Cookie", "_m_superu=1");

pub struct Mangago {
    ctx: SourceContext,
    pipeline: ImagePipeline,
    dates: DateNormalizer,
}

impl Mangago {
    pub const NAME: &'static str = "MANGAGO";

    pub fn descriptor() -> MangaSource {
        MangaSource::new(Self::NAME, "Mangago", Some("en"), ContentType::Hentai)
    }

    pub fn default_config() -> SourceConfig {
        SourceConfigBuilder::new("mangago.me")
            .page_size(48)
            .search_page_size(10)
            .build()
    }

    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self {
            ctx: SourceContext::new(Self::descriptor(), config)?,
            pipeline: ImagePipeline::default(),
            dates: DateNormalizer::new("%b %d, %Y"),
        })
    }

    /// Replaces the script evaluator used for descrambling keys.
    pub fn with_pipeline(mut self, pipeline: ImagePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    fn list_url(&self, query: &ListQuery) -> String {
        let base = self.ctx.base_url();
        if let Some(q) = query.query() {
            return format!("{}/r/l_search/?name={}&page={}", base, encode_query(q), query.page);
        }
        let tags = if query.filter.tags.is_empty() {
            "all".to_string()
        } else {
            query
                .filter
                .tags
                .iter()
                .map(|t| encode_query(&t.key))
                .collect::<Vec<_>>()
                .join(",")
        };
        // f=0 hides finished series, o=0 hides ongoing ones
        let finished = if query.filter.states.contains(&MangaState::Ongoing) { 0 } else { 1 };
        let ongoing = if query.filter.states.contains(&MangaState::Finished) { 0 } else { 1 };
        let sort = match query.order {
            SortOrder::Updated => "update_date",
            SortOrder::Popularity => "view",
            SortOrder::Newest => "create_date",
            _ => "",
        };
        format!(
            "{}/genre/{}/{}/?f={}&o={}&sortby={}&e={}",
            base,
            tags,
            query.page,
            finished,
            ongoing,
            sort,
            query.excluded_tag_keys(",")
        )
    }

    fn parse_list(&self, html: &str) -> Vec<Manga> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), LIST_ITEM)
            .into_iter()
            .filter_map(|item| {
                let href = dom::attr(item, "href")?;
                let title = dom::attr(item, "title")
                    .map(str::to_string)
                    .or_else(|| dom::text_or_none(item))?;
                let cover = dom::select_first(item, "img")
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

        let tags: BTreeSet<MangaTag> = dom::select_containing(root, "label", "Genre")
            .and_then(dom::parent_element)
            .map(|parent| {
                dom::select_all(parent, "a")
                    .into_iter()
                    .filter_map(dom::text_or_none)
                    .map(|name| self.ctx.tag(name.clone(), name))
                    .into_tag_set()
            })
            .unwrap_or_default();

        let authors: BTreeSet<String> = dom::select_containing(root, "label", "Author")
            .and_then(dom::parent_element)
            .and_then(|parent| dom::select_first(parent, "a"))
            .and_then(dom::text_or_none)
            .into_iter()
            .collect();

        let state = dom::select_containing(root, "label", "Status")
            .and_then(dom::parent_element)
            .map(|parent| dom::text(parent).to_lowercase())
            .and_then(|status| {
                if status.contains("ongoing") {
                    Some(MangaState::Ongoing)
                } else if status.contains("completed") {
                    Some(MangaState::Finished)
                } else {
                    None
                }
            });

        let rows = dom::select_all(root, CHAPTER_ROW);
        let chapters = dom::map_chapters(rows, true, 1, |_, row| {
            let link = dom::select_first(row, "a.chico")?;
            let href = dom::attr(link, "href")?;
            let date = dom::select_last(row, "td")
                .map(|td| self.dates.parse(&dom::text(td)))
                .unwrap_or(0);
            Some(self.ctx.chapter(href, dom::text_or_none(link), date))
        });

        Manga {
            tags,
            authors,
            state: state.or(manga.state),
            description: dom::select_first(root, ".manga_summary").and_then(dom::text_or_none),
            chapters: Some(chapters),
            ..manga.clone()
        }
    }

    fn parse_tags(&self, html: &str) -> BTreeSet<MangaTag> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), "a.genre_select_div")
            .into_iter()
            .filter_map(|a| dom::attr(a, "_id"))
            .map(|name| self.ctx.tag(name, name))
            .into_tag_set()
    }
}

#[async_trait]
impl MangaParser for Mangago {
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
        let html = self.ctx.get_text(&self.list_url(&query)).await?;
        Ok(self.parse_list(&html))
    }

    async fn details(&self, manga: &Manga) -> Result<Manga> {
        let html = self.ctx.get_text(&manga.url).await?;
        Ok(self.parse_details(manga, &html))
    }

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>> {
        let url = self.ctx.absolute_url(&chapter.url);
        let urls = self
            .pipeline
            .fetch_image_urls(self.ctx.http(), &url, &[READER_COOKIE])
            .await?;
        Ok(imagepipe::to_pages(urls, &self.source().name))
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        let html = self.ctx.get_text("/genre/").await?;
        Ok(FilterOptions {
            available_tags: self.parse_tags(&html),
            available_states: [MangaState::Ongoing, MangaState::Finished].into_iter().collect(),
            available_content_ratings: BTreeSet::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mangago() -> Mangago {
        Mangago::new(Mangago::default_config()).unwrap()
    }

    fn query(order: SortOrder, filter: MangaListFilter) -> ListQuery {
        ListQuery::resolve(&mangago().filter_capabilities(), 2, order, &filter).unwrap()
    }

    #[test]
    fn genre_url_with_states_and_exclusions() {
        let m = mangago();
        let filter = MangaListFilter {
            tags: [m.ctx.tag("Romance", "Romance"), m.ctx.tag("Drama", "Drama")]
                .into_iter()
                .collect(),
            tags_exclude: [m.ctx.tag("Yaoi", "Yaoi")].into_iter().collect(),
            states: [MangaState::Ongoing].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            m.list_url(&query(SortOrder::Popularity, filter)),
            "https://mangago.me/genre/Drama,Romance/2/?f=0&o=1&sortby=view&e=Yaoi"
        );
    }

    #[test]
    fn search_url_ignores_facets() {
        let m = mangago();
        let filter = MangaListFilter {
            query: Some("tower of god".into()),
            tags: [m.ctx.tag("Romance", "Romance")].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            m.list_url(&query(SortOrder::Updated, filter)),
            "https://mangago.me/r/l_search/?name=tower+of+god&page=2"
        );
    }

    #[test]
    fn parses_details_page() {
        let html = r#"<div class="manga_right"><table><tr><td>
            <label>Author:</label> <a href="/author/1">Kim</a>
            <label>Status:</label> <span>Ongoing</span>
          </td></tr></table>
          <div><label>Genre(s):</label><a>Drama</a><a>Romance</a></div></div>
          <div class="manga_summary">  A story.  </div>
          <table id="chapter_table"><tbody>
            <tr><td><a class="chico" href="https://mangago.me/read-manga/x/c2/">Ch.2</a></td><td>Feb 3, 2024</td></tr>
            <tr><td><a class="chico" href="https://mangago.me/read-manga/x/c1/">Ch.1</a></td><td>Jan 5, 2024</td></tr>
          </tbody></table>"#;
        let m = mangago();
        let manga = m.ctx.manga("/read-manga/x/", "X");
        let details = m.parse_details(&manga, html);
        let chapters = details.chapters.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].url, "/read-manga/x/c1/");
        assert_eq!(chapters[0].number, 1.0);
        assert_eq!(chapters[1].title.as_deref(), Some("Ch.2"));
        assert!(chapters[0].upload_date > 0);
        assert_eq!(details.description.as_deref(), Some("A story."));
        assert_eq!(details.tags.len(), 2);
        assert_eq!(details.state, Some(MangaState::Ongoing));
    }
}
