// ABOUTME: MangaReader (WordPress "mangareader" theme) template adapter.
// ABOUTME: Catalog filters through genre[]/status query params; reader images from markup or the ts_reader script.

use std::collections::BTreeSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::date::{DateLocale, DateNormalizer};
use crate::dom;
use crate::error::{ParserError, Result};
use crate::model::{
    FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter, MangaPage,
    MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
use crate::paging::{encode_query, ListQuery, Paging};
use crate::parser::{MangaParser, SourceContext};
use crate::templates::TemplateSite;

static TS_READER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)ts_reader\.run\((\{.*?\})\);").unwrap());

const SORT_ORDERS: &[SortOrder] = &[
    SortOrder::Updated,
    SortOrder::Popularity,
    SortOrder::Alphabetical,
    SortOrder::AlphabeticalDesc,
    SortOrder::Newest,
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MangaReaderParams {
    /// Catalog path, with a leading slash and no trailing one.
    pub list_url: String,
    pub date_format: String,
    pub list_item_selector: String,
    pub details_container_selector: String,
    pub chapter_selector: String,
    pub page_selector: String,
}

impl Default for MangaReaderParams {
    fn default() -> Self {
        Self {
            list_url: "/manga".into(),
            date_format: "%B %d, %Y".into(),
            list_item_selector: ".utao .uta .imgu, .listupd .bs .bsx, .listo .bs .bsx".into(),
            details_container_selector: "div.bigcontent, div.animefull, div.main-info, div.postbody"
                .into(),
            chapter_selector: "#chapterlist li".into(),
            page_selector: "div#readerarea img".into(),
        }
    }
}

pub struct MangaReader {
    ctx: SourceContext,
    site: TemplateSite,
    params: MangaReaderParams,
    dates: DateNormalizer,
}

#[derive(Deserialize)]
struct ReaderScript {
    #[serde(default)]
    sources: Vec<ReaderSource>,
}

#[derive(Deserialize)]
struct ReaderSource {
    #[serde(default)]
    images: Vec<String>,
}

impl MangaReader {
    pub fn new(
        site: TemplateSite,
        params: MangaReaderParams,
        config: SourceConfig,
    ) -> Result<Self> {
        let dates = DateNormalizer::new(&params.date_format)
            .with_locale(DateLocale::from_code(site.locale.as_deref()));
        Ok(Self {
            ctx: SourceContext::new(site.descriptor(), config)?,
            site,
            params,
            dates,
        })
    }

    fn list_url(&self, query: &ListQuery) -> Result<String> {
        let base = self.ctx.base_url();
        if let Some(q) = query.query() {
            return Ok(format!("{}/page/{}/?s={}", base, query.page, encode_query(q)));
        }

        let order = match query.order {
            SortOrder::Popularity => "popular",
            SortOrder::Alphabetical => "title",
            SortOrder::AlphabeticalDesc => "titlereverse",
            SortOrder::Newest => "latest",
            _ => "update",
        };
        let mut url = format!(
            "{}{}/?order={}&page={}",
            base, self.params.list_url, order, query.page
        );
        for tag in &query.filter.tags {
            url.push_str("&genre[]=");
            url.push_str(&encode_query(&tag.key));
        }
        for tag in &query.filter.tags_exclude {
            url.push_str("&genre[]=-");
            url.push_str(&encode_query(&tag.key));
        }
        if let Some(state) = query.state()? {
            url.push_str("&status=");
            url.push_str(match state {
                MangaState::Ongoing => "ongoing",
                MangaState::Finished => "completed",
                MangaState::Paused => "hiatus",
                MangaState::Abandoned => "dropped",
            });
        }
        Ok(url)
    }

    fn parse_list(&self, html: &str) -> Vec<Manga> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), &self.params.list_item_selector)
            .into_iter()
            .filter_map(|item| {
                let link = dom::select_first(item, "a")?;
                let href = dom::attr(link, "href")?;
                let title = dom::attr(link, "title")
                    .map(str::to_string)
                    .or_else(|| {
                        dom::select_first(item, ".tt, h4, h3").and_then(dom::text_or_none)
                    })?;
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

    fn parse_details(&self, manga: &Manga, html: &str) -> Result<Manga> {
        let doc = dom::parse_document(html);
        let root = doc.root_element();
        let info = dom::require_first(root, &self.params.details_container_selector, &manga.url)?;

        let tags: BTreeSet<MangaTag> = dom::select_all(info, ".seriestugenre a, .mgen a, div.gnr a")
            .into_iter()
            .filter_map(|a| {
                let href = dom::attr(a, "href")?;
                let key = href.trim_end_matches('/').rsplit('/').next()?;
                Some(self.ctx.tag(key, dom::text(a)))
            })
            .into_tag_set();

        // "Status"/"Author" rows come either as .imptdt blocks or as .fmed cells
        let field = |label: &str| -> Option<String> {
            dom::select_containing(info, ".imptdt", label)
                .and_then(|row| dom::select_first(row, "i, a"))
                .and_then(dom::text_or_none)
                .or_else(|| {
                    dom::select_containing(info, ".fmed b", label)
                        .and_then(dom::next_element_sibling)
                        .and_then(dom::text_or_none)
                })
        };
        let state = field("Status").or_else(|| field("Durum")).or_else(|| field("Estado"));
        let state = state.and_then(|s| match s.to_lowercase().as_str() {
            "ongoing" | "devam ediyor" | "en curso" | "publishing" => Some(MangaState::Ongoing),
            "completed" | "tamamlandı" | "finalizado" | "completo" => Some(MangaState::Finished),
            "hiatus" | "on hold" | "durduruldu" | "pausado" => Some(MangaState::Paused),
            "dropped" | "cancelled" | "canceled" | "bırakıldı" | "abandonado" => {
                Some(MangaState::Abandoned)
            }
            _ => None,
        });
        let authors = field("Author")
            .or_else(|| field("Yazar"))
            .or_else(|| field("Autor"))
            .filter(|a| a.as_str() != "-")
            .into_iter()
            .collect();
        let alt_titles = dom::select_first(info, ".alternative")
            .or_else(|| {
                dom::select_containing(info, ".wd-full", "Alternative")
                    .and_then(|row| dom::select_first(row, "span"))
            })
            .and_then(dom::text_or_none)
            .map(|text| {
                text.split([',', ';'])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let items = dom::select_all(root, &self.params.chapter_selector);
        let chapters = dom::map_chapters(items, true, 1, |_, li| {
            let link = dom::select_first(li, "a")?;
            let href = dom::attr(link, "href")?;
            let title = dom::select_first(li, ".chapternum").and_then(dom::text_or_none);
            let date = dom::select_first(li, ".chapterdate")
                .map(|el| self.dates.parse(&dom::text(el)))
                .unwrap_or(0);
            Some(self.ctx.chapter(href, title, date))
        });

        Ok(Manga {
            title: dom::select_first(info, "h1.entry-title")
                .and_then(dom::text_or_none)
                .unwrap_or_else(|| manga.title.clone()),
            tags,
            state,
            authors,
            alt_titles,
            description: dom::select_first(info, "div.entry-content, div[itemprop=description]")
                .and_then(dom::text_or_none),
            cover_url: dom::select_first(info, ".thumb img, .thumbook img")
                .and_then(dom::image_src)
                .map(|src| self.ctx.absolute_url(src))
                .or_else(|| manga.cover_url.clone()),
            chapters: Some(chapters),
            ..manga.clone()
        })
    }

    fn parse_pages(&self, chapter_url: &str, html: &str) -> Result<Vec<MangaPage>> {
        let doc = dom::parse_document(html);
        let images: Vec<String> = dom::select_all(doc.root_element(), &self.params.page_selector)
            .into_iter()
            .filter_map(dom::image_src)
            .map(|src| self.ctx.absolute_url(src))
            .collect();
        if !images.is_empty() {
            return Ok(images.into_iter().map(|url| self.ctx.page(url)).collect());
        }

        let script = dom::inline_scripts(&doc)
            .into_iter()
            .find_map(|script| {
                TS_READER
                    .captures(&script)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
            })
            .ok_or_else(|| ParserError::not_found(chapter_url, "ts_reader.run"))?;
        let reader: ReaderScript = serde_json::from_str(&script).map_err(|e| {
            ParserError::format(chapter_url, "ts_reader.run", Some(anyhow::anyhow!(e)))
        })?;
        Ok(reader
            .sources
            .into_iter()
            .next()
            .map(|source| source.images)
            .unwrap_or_default()
            .into_iter()
            .map(|url| self.ctx.page(self.ctx.absolute_url(&url)))
            .collect())
    }

    fn parse_genres(&self, html: &str) -> BTreeSet<MangaTag> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), "ul.genrez li")
            .into_iter()
            .filter_map(|li| {
                let key = dom::select_first(li, "input").and_then(|i| dom::attr(i, "value"))?;
                let title = dom::select_first(li, "label").and_then(dom::text_or_none)?;
                Some(self.ctx.tag(key, title))
            })
            .into_tag_set()
    }
}

#[async_trait]
impl MangaParser for MangaReader {
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
            is_search_with_filters_supported: false,
            is_multiple_tags_supported: true,
            is_tags_exclusion_supported: true,
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
        let html = self.ctx.get_text(&self.list_url(&query)?).await?;
        Ok(self.parse_list(&html))
    }

    async fn details(&self, manga: &Manga) -> Result<Manga> {
        let html = self.ctx.get_text(&manga.url).await?;
        self.parse_details(manga, &html)
    }

    async fn pages(&self, chapter: &MangaChapter) -> Result<Vec<MangaPage>> {
        let html = self.ctx.get_text(&chapter.url).await?;
        self.parse_pages(&chapter.url, &html)
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        let html = self.ctx.get_text(&format!("{}/", self.params.list_url)).await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{find_site, TemplateParams};
    use pretty_assertions::assert_eq;

    fn reader(name: &str) -> MangaReader {
        let site = find_site(name).unwrap().unwrap();
        let TemplateParams::MangaReader(params) = site.params.clone() else {
            panic!("{} is not a mangareader site", name);
        };
        let config = site.default_config();
        MangaReader::new(site, params, config).unwrap()
    }

    fn url_for(m: &MangaReader, page: u32, order: SortOrder, filter: MangaListFilter) -> String {
        let query = ListQuery::resolve(&m.filter_capabilities(), page, order, &filter).unwrap();
        m.list_url(&query).unwrap()
    }

    #[test]
    fn catalog_url_carries_genres_and_status() {
        let m = reader("ARVENSCANS");
        let filter = MangaListFilter {
            tags: [m.ctx.tag("action", "Action")].into_iter().collect(),
            tags_exclude: [m.ctx.tag("romance", "Romance")].into_iter().collect(),
            states: [MangaState::Ongoing].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            url_for(&m, 2, SortOrder::Popularity, filter),
            "https://arvencomics.com/series/?order=popular&page=2&genre[]=action&genre[]=-romance&status=ongoing"
        );
    }

    #[test]
    fn search_ignores_facets() {
        let m = reader("ARVENSCANS");
        let filter = MangaListFilter {
            query: Some("tower god".into()),
            tags: [m.ctx.tag("action", "Action")].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            url_for(&m, 1, SortOrder::Updated, filter),
            "https://arvencomics.com/page/1/?s=tower+god"
        );
    }

    #[test]
    fn exclusion_follows_site_override() {
        let m = reader("LUASCANS");
        let filter = MangaListFilter {
            tags_exclude: [m.ctx.tag("romance", "Romance")].into_iter().collect(),
            ..Default::default()
        };
        let err = ListQuery::resolve(&m.filter_capabilities(), 1, SortOrder::Updated, &filter)
            .unwrap_err();
        assert!(err.is_invalid_filter());
    }

    #[test]
    fn parses_details() {
        let html = r#"<div class="bigcontent">
              <div class="thumb"><img src="/wp-content/cover.jpg"></div>
              <h1 class="entry-title">Nano Machine</h1>
              <div class="imptdt">Status <i>Ongoing</i></div>
              <div class="fmed"><b>Author</b><span>Great H</span></div>
              <div class="mgen"><a href="/genres/action/">Action</a><a href="/genres/martial-arts/">Martial Arts</a></div>
              <div class="entry-content"><p>Cheon Yeo-woon.</p></div>
            </div>
            <div id="chapterlist"><ul>
              <li><a href="/nano-machine-chapter-2/"><span class="chapternum">Chapter 2</span><span class="chapterdate">March 5, 2024</span></a></li>
              <li><a href="/nano-machine-chapter-1/"><span class="chapternum">Chapter 1</span><span class="chapterdate">March 1, 2024</span></a></li>
            </ul></div>"#;
        let m = reader("ARVENSCANS");
        let manga = m.ctx.manga("/series/nano-machine/", "Nano");
        let details = m.parse_details(&manga, html).unwrap();
        assert_eq!(details.title, "Nano Machine");
        assert_eq!(details.state, Some(MangaState::Ongoing));
        assert!(details.authors.contains("Great H"));
        let keys: Vec<_> = details.tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["action", "martial-arts"]);
        assert_eq!(details.description.as_deref(), Some("Cheon Yeo-woon."));
        let chapters = details.chapters.unwrap();
        assert_eq!(chapters[0].title.as_deref(), Some("Chapter 1"));
        assert_eq!(chapters[1].upload_date, 1_709_596_800_000);
    }

    #[test]
    fn missing_container_is_not_found() {
        let m = reader("ARVENSCANS");
        let manga = m.ctx.manga("/series/x/", "X");
        let err = m.parse_details(&manga, "<html></html>").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn pages_from_reader_script() {
        let html = r#"<div id="readerarea"></div>
            <script>ts_reader.run({"post_id":1,"sources":[{"source":"Server 1","images":["https://cdn.example/1.webp","https://cdn.example/2.webp"]}]});</script>"#;
        let m = reader("ARVENSCANS");
        let pages = m.parse_pages("/ch-1/", html).unwrap();
        let urls: Vec<_> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://cdn.example/1.webp", "https://cdn.example/2.webp"]);

        let err = m.parse_pages("/ch-1/", "<div id=\"readerarea\"></div>").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn genres_from_filter_form() {
        let html = r#"<ul class="genrez">
            <li><input type="checkbox" value="action"><label>Action</label></li>
            <li><input type="checkbox" value="comedy"><label>Comedy</label></li></ul>"#;
        assert_eq!(reader("ARVENSCANS").parse_genres(html).len(), 2);
    }
}
