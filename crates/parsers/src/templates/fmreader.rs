// ABOUTME: FMReader template adapter: catalog sorted via sort/sort_type, genre pages by path prefix.
// ABOUTME: Details come from labeled "ul.manga-info" rows; pages may be routed through an image proxy.

use std::collections::BTreeSet;

use async_trait::async_trait;
use scraper::ElementRef;
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::date::{DateLocale, DateNormalizer};
use crate::dom;
use crate::error::Result;
use crate::model::{
    FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter, MangaPage,
    MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
use crate::paging::{encode_query, exceeds_last_page, last_page_from_href, ListQuery, Paging};
use crate::parser::{MangaParser, SourceContext};
use crate::templates::TemplateSite;

const SORT_ORDERS: &[SortOrder] = &[
    SortOrder::Updated,
    SortOrder::UpdatedAsc,
    SortOrder::Popularity,
    SortOrder::PopularityAsc,
    SortOrder::Alphabetical,
    SortOrder::AlphabeticalDesc,
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FmReaderParams {
    pub list_url: String,
    /// Genre pages live at `/{tag_prefix}{key}.html`.
    pub tag_prefix: String,
    pub state_label: String,
    pub alt_label: String,
    pub tag_label: String,
    pub author_label: String,
    pub date_format: String,
    /// Path prefix page images are requested through, e.g. `/proxy.php?link=`.
    pub image_proxy: Option<String>,
}

impl Default for FmReaderParams {
    fn default() -> Self {
        Self {
            list_url: "/manga-list.html".into(),
            tag_prefix: "manga-list-genre-".into(),
            state_label: "Status".into(),
            alt_label: "Other names".into(),
            tag_label: "Genre".into(),
            author_label: "Author".into(),
            date_format: "%d/%m/%Y".into(),
            image_proxy: None,
        }
    }
}

pub struct FmReader {
    ctx: SourceContext,
    site: TemplateSite,
    params: FmReaderParams,
    dates: DateNormalizer,
}

impl FmReader {
    pub fn new(site: TemplateSite, params: FmReaderParams, config: SourceConfig) -> Result<Self> {
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
            return Ok(format!(
                "{}{}?page={}&name={}",
                base,
                self.params.list_url,
                query.page,
                encode_query(q)
            ));
        }

        let status = match query.state()? {
            Some(MangaState::Ongoing) => "2",
            Some(MangaState::Finished) => "1",
            Some(MangaState::Abandoned) => "3",
            _ => "",
        };
        if let Some(tag) = query.tag()? {
            return Ok(format!(
                "{}/{}{}.html?page={}&m_status={}",
                base, self.params.tag_prefix, tag.key, query.page, status
            ));
        }
        let sort = match query.order {
            SortOrder::Popularity => "views&sort_type=DESC",
            SortOrder::PopularityAsc => "views&sort_type=ASC",
            SortOrder::UpdatedAsc => "last_update&sort_type=ASC",
            SortOrder::Alphabetical => "name&sort_type=ASC",
            SortOrder::AlphabeticalDesc => "name&sort_type=DESC",
            _ => "last_update&sort_type=DESC",
        };
        Ok(format!(
            "{}{}?page={}&sort={}&m_status={}",
            base, self.params.list_url, query.page, sort, status
        ))
    }

    /// Entries of a catalog page, or nothing when `page` lies past the advertised last page.
    fn parse_list(&self, page: u32, html: &str) -> Vec<Manga> {
        let doc = dom::parse_document(html);
        let root = doc.root_element();
        let last_page = dom::select_last(root, ".pagination a")
            .and_then(|a| dom::attr(a, "href"))
            .and_then(|href| last_page_from_href(href, "page"))
            .unwrap_or(1);
        if exceeds_last_page(page, last_page) {
            return Vec::new();
        }

        dom::select_all(root, "div.thumb-item-flow")
            .into_iter()
            .filter_map(|item| {
                let link = dom::select_first(item, "div.series-title a")?;
                let href = dom::attr(link, "href")?;
                let cover = dom::select_first(item, "div.img-in-ratio")
                    .and_then(background_image)
                    .map(|src| self.ctx.absolute_url(&src));
                Some(Manga {
                    cover_url: cover,
                    ..self.ctx.manga(href, dom::text(link))
                })
            })
            .collect()
    }

    fn info_row<'a>(root: ElementRef<'a>, label: &str) -> Option<ElementRef<'a>> {
        dom::select_containing(root, "ul.manga-info li", label)
    }

    fn tag_key<'a>(&self, href: &'a str) -> Option<&'a str> {
        let file = href.rsplit('/').next()?;
        let key = file.strip_prefix(&self.params.tag_prefix)?;
        Some(key.split(['.', '?']).next().unwrap_or(key)).filter(|k| !k.is_empty())
    }

    fn parse_details(&self, manga: &Manga, html: &str) -> Manga {
        let doc = dom::parse_document(html);
        let root = doc.root_element();

        let tags: BTreeSet<MangaTag> = Self::info_row(root, &self.params.tag_label)
            .map(|row| dom::select_all(row, "a"))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| {
                let key = self.tag_key(dom::attr(a, "href")?)?;
                Some(self.ctx.tag(key, dom::text(a)))
            })
            .into_tag_set();
        let authors = Self::info_row(root, &self.params.author_label)
            .map(|row| dom::select_all(row, "a"))
            .unwrap_or_default()
            .into_iter()
            .filter_map(dom::text_or_none)
            .collect();
        let state = Self::info_row(root, &self.params.state_label)
            .and_then(|row| dom::select_first(row, "a"))
            .and_then(|a| match dom::text(a).to_lowercase().as_str() {
                "on going" | "ongoing" | "en curso" | "en emisión" => Some(MangaState::Ongoing),
                "completed" | "completado" | "finalizado" => Some(MangaState::Finished),
                "abandonado" | "dropped" => Some(MangaState::Abandoned),
                _ => None,
            });
        let alt_titles = Self::info_row(root, &self.params.alt_label)
            .map(|row| {
                let text = dom::text(row);
                let value = text.split_once(':').map(|(_, v)| v).unwrap_or_default();
                value
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let items = dom::select_all(root, "ul.list-chapters a, div#list-chapters p a");
        let chapters = dom::map_chapters(items, true, 1, |_, a| {
            let href = dom::attr(a, "href")?;
            let title = dom::select_first(a, ".chapter-name")
                .and_then(dom::text_or_none)
                .or_else(|| dom::text_or_none(a));
            let date = dom::select_first(a, ".chapter-time")
                .map(|el| self.dates.parse(&dom::text(el)))
                .unwrap_or(0);
            Some(self.ctx.chapter(href, title, date))
        });

        Manga {
            tags,
            authors,
            state,
            alt_titles,
            description: dom::select_first(root, "div.summary-content, div.row ~ div.row p")
                .and_then(dom::text_or_none),
            cover_url: dom::select_first(root, "div.info-cover img, div.thumbnail img")
                .and_then(dom::image_src)
                .map(|src| self.ctx.absolute_url(src))
                .or_else(|| manga.cover_url.clone()),
            chapters: Some(chapters),
            ..manga.clone()
        }
    }

    fn parse_pages(&self, html: &str) -> Vec<MangaPage> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), "div.chapter-content img, #chapter-content img")
            .into_iter()
            .filter_map(dom::image_src)
            .map(|src| match &self.params.image_proxy {
                Some(proxy) => self.ctx.absolute_url(&format!("{}{}", proxy, src)),
                None => self.ctx.absolute_url(src),
            })
            .map(|url| self.ctx.page(url))
            .collect()
    }

    fn parse_tags(&self, html: &str) -> BTreeSet<MangaTag> {
        let doc = dom::parse_document(html);
        let css = format!("a[href*=\"{}\"]", self.params.tag_prefix);
        dom::select_all(doc.root_element(), &css)
            .into_iter()
            .filter_map(|a| {
                let key = self.tag_key(dom::attr(a, "href")?)?;
                Some(self.ctx.tag(key, dom::text_or_none(a)?))
            })
            .into_tag_set()
    }
}

/// Cover url from `data-bg` or an inline `background-image: url(...)`.
fn background_image(el: ElementRef<'_>) -> Option<String> {
    if let Some(bg) = dom::attr(el, "data-bg") {
        return Some(bg.to_string());
    }
    let style = dom::attr(el, "style")?;
    let start = style.find("url(")? + 4;
    let end = start + style[start..].find(')')?;
    Some(style[start..end].trim_matches(['\'', '"', ' ']).to_string()).filter(|s| !s.is_empty())
}

#[async_trait]
impl MangaParser for FmReader {
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
            ..Default::default()
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
        Ok(self.parse_list(page, &html))
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
        let html = self.ctx.get_text(&self.params.list_url).await?;
        Ok(FilterOptions {
            available_tags: self.parse_tags(&html),
            available_states: [MangaState::Ongoing, MangaState::Finished, MangaState::Abandoned]
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

    fn olimpo() -> FmReader {
        let site = find_site("OLIMPOSCANS").unwrap().unwrap();
        let TemplateParams::FmReader(params) = site.params.clone() else {
            panic!("OLIMPOSCANS is not an fmreader site");
        };
        let config = site.default_config();
        FmReader::new(site, params, config).unwrap()
    }

    fn url_for(m: &FmReader, page: u32, order: SortOrder, filter: MangaListFilter) -> String {
        let query = ListQuery::resolve(&m.filter_capabilities(), page, order, &filter).unwrap();
        m.list_url(&query).unwrap()
    }

    #[test]
    fn catalog_urls() {
        let m = olimpo();
        let filter = MangaListFilter {
            states: [MangaState::Finished].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            url_for(&m, 3, SortOrder::PopularityAsc, filter),
            "https://leerolimpo.com/manga-list.html?page=3&sort=views&sort_type=ASC&m_status=1"
        );
        let filter = MangaListFilter {
            tags: [m.ctx.tag("accion", "Acción")].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            url_for(&m, 1, SortOrder::Updated, filter),
            "https://leerolimpo.com/lista-de-comics-genero-accion.html?page=1&m_status="
        );
        let filter = MangaListFilter {
            query: Some("rey".into()),
            ..Default::default()
        };
        assert_eq!(
            url_for(&m, 2, SortOrder::Updated, filter),
            "https://leerolimpo.com/manga-list.html?page=2&name=rey"
        );
    }

    #[test]
    fn list_stops_after_last_page() {
        let html = r#"<div class="thumb-item-flow">
              <div class="img-in-ratio" style="background-image: url('/covers/rey.jpg')"></div>
              <div class="series-title"><a href="/manga-el-rey.html">El Rey</a></div>
            </div>
            <ul class="pagination"><li><a href="/manga-list.html?page=1">1</a></li>
              <li><a href="/manga-list.html?page=2&artist=">2</a></li></ul>"#;
        let m = olimpo();
        let first = m.parse_list(2, html);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].url, "/manga-el-rey.html");
        assert_eq!(
            first[0].cover_url.as_deref(),
            Some("https://leerolimpo.com/covers/rey.jpg")
        );
        assert!(m.parse_list(3, html).is_empty());
    }

    #[test]
    fn parses_labeled_rows() {
        let html = r#"<ul class="manga-info">
              <li><b>Otros nombres</b>: The King, El Rey</li>
              <li><b>Autor</b>: <a href="/autor-x.html">Kim</a></li>
              <li><b>Género</b>: <a href="/lista-de-comics-genero-accion.html">Acción</a>
                 <a href="/lista-de-comics-genero-drama.html">Drama</a></li>
              <li><b>Estado</b>: <a href="/x">En curso</a></li>
            </ul>
            <div class="summary-content">Un rey.</div>
            <ul class="list-chapters">
              <a href="/el-rey-capitulo-2.html"><div class="chapter-name">Capítulo 2</div><div class="chapter-time">05/03/2024</div></a>
              <a href="/el-rey-capitulo-1.html"><div class="chapter-name">Capítulo 1</div><div class="chapter-time">01/03/2024</div></a>
            </ul>"#;
        let m = olimpo();
        let manga = m.ctx.manga("/manga-el-rey.html", "El Rey");
        let details = m.parse_details(&manga, html);
        assert_eq!(details.state, Some(MangaState::Ongoing));
        assert!(details.authors.contains("Kim"));
        assert!(details.alt_titles.contains("The King"));
        let keys: Vec<_> = details.tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["accion", "drama"]);
        let chapters = details.chapters.unwrap();
        assert_eq!(chapters[0].title.as_deref(), Some("Capítulo 1"));
        assert_eq!(chapters[0].number, 1.0);
        assert_eq!(chapters[1].upload_date, 1_709_596_800_000);
    }

    #[test]
    fn pages_go_through_proxy() {
        let html = r#"<div class="chapter-content">
            <img src="https://img.example/1.jpg"><img data-src="https://img.example/2.jpg"></div>"#;
        let pages = olimpo().parse_pages(html);
        assert_eq!(
            pages[0].url,
            "https://leerolimpo.com/proxy.php?link=https://img.example/1.jpg"
        );
        assert_eq!(pages.len(), 2);
    }
}
