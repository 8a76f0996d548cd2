// ABOUTME: Scantrad Union adapter (French): search, per-tag listings and the front-page updates feed.
// ABOUTME: The updates feed has no pagination, so only its first page yields entries.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::{SourceConfig, SourceConfigBuilder, CHROME_DESKTOP_USER_AGENT};
use crate::date::{DateLocale, DateNormalizer};
use crate::dom;
use crate::error::{ParserError, Result};
use crate::model::{
    ContentType, FilterCapabilities, FilterOptions, Manga, MangaChapter, MangaListFilter,
    MangaPage, MangaSource, MangaState, MangaTag, SortOrder, TagSetExt,
};
use crate::paging::{encode_query, ListQuery, ListRequest, Paging};
use crate::parser::{MangaParser, SourceContext};

const SORT_ORDERS: &[SortOrder] = &[SortOrder::Updated, SortOrder::Alphabetical];

pub struct ScantradUnion {
    ctx: SourceContext,
    dates: DateNormalizer,
}

impl ScantradUnion {
    pub const NAME: &'static str = "SCANTRADUNION";

    pub fn descriptor() -> MangaSource {
        MangaSource::new(Self::NAME, "Scantrad Union", Some("fr"), ContentType::Manga)
    }

    pub fn default_config() -> SourceConfig {
        SourceConfigBuilder::new("scantrad-union.com")
            .user_agent(CHROME_DESKTOP_USER_AGENT)
            .page_size(10)
            .search_page_size(10)
            .build()
    }

    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self {
            ctx: SourceContext::new(Self::descriptor(), config)?,
            dates: DateNormalizer::new("%d-%m-%Y").with_locale(DateLocale::French),
        })
    }

    fn list_request(&self, query: &ListQuery) -> Result<ListRequest> {
        let base = self.ctx.base_url();
        if let Some(q) = query.query() {
            return Ok(ListRequest::Fetch(format!(
                "{}/page/{}/?s={}",
                base,
                query.page,
                encode_query(q)
            )));
        }
        if let Some(tag) = query.tag()? {
            return Ok(ListRequest::Fetch(format!(
                "{}/tag/{}/page/{}/",
                base, tag.key, query.page
            )));
        }
        match query.order {
            SortOrder::Alphabetical => Ok(ListRequest::Fetch(format!(
                "{}/manga/page/{}/",
                base, query.page
            ))),
            _ if query.page > 1 => Ok(ListRequest::Exhausted),
            _ => Ok(ListRequest::Fetch(format!("{}/", base))),
        }
    }

    fn parse_list(&self, html: &str, url: &str) -> Result<Vec<Manga>> {
        let doc = dom::parse_document(html);
        let root = doc.root_element();

        if let Some(feed) = dom::select_first(root, "#dernierschapitres") {
            return Ok(dom::select_all(feed, "div.colonne")
                .into_iter()
                .filter_map(|card| {
                    let href = dom::select_first(card, "a.index-top4-a")
                        .and_then(|a| dom::attr(a, "href"))?;
                    let title = dom::select_all(card, ".carteinfos a")
                        .into_iter()
                        .map(dom::text)
                        .collect::<Vec<_>>()
                        .join(" ");
                    let cover = dom::select_first(card, "img.attachment-thumbnail")
                        .and_then(|img| dom::attr_as_absolute_url(img, "src", &self.ctx.base_url()));
                    Some(Manga {
                        cover_url: cover,
                        ..self.ctx.manga(href, title)
                    })
                })
                .collect());
        }

        let main = dom::require_first(root, "#main", url)?;
        Ok(dom::select_all(main, "article.post-outer")
            .into_iter()
            .filter_map(|article| {
                let href = dom::select_first(article, "a.thumb-link")
                    .and_then(|a| dom::attr(a, "href"))?;
                let title = dom::select_first(article, ".index-post-header a")
                    .map(dom::text)
                    .unwrap_or_default();
                let cover = dom::select_first(article, "img")
                    .and_then(|img| dom::attr_as_absolute_url(img, "src", &self.ctx.base_url()));
                Some(Manga {
                    cover_url: cover,
                    ..self.ctx.manga(href, title)
                })
            })
            .collect())
    }

    fn parse_details(&self, manga: &Manga, html: &str) -> Result<Manga> {
        let doc = dom::parse_document(html);
        let main = dom::require_first(doc.root_element(), "#main", &manga.public_url)?;

        let authors = dom::select_first(main, "div.project-details a[href*=auteur]")
            .and_then(dom::text_or_none)
            .into_iter()
            .collect();
        let alt_titles = dom::select_containing(main, ".divider2", "Noms associés :")
            .map(|el| {
                let text = dom::text(el);
                text.split_once(':')
                    .map(|(_, names)| names.trim().to_string())
                    .unwrap_or(text)
            })
            .filter(|alt| !alt.is_empty())
            .into_iter()
            .collect();
        let state = dom::select_all(main, ".label.label-primary")
            .get(2)
            .and_then(|label| match dom::text(*label).as_str() {
                "En cours" => Some(MangaState::Ongoing),
                "Terminé" | "Abondonné" | "One Shot" => Some(MangaState::Finished),
                _ => None,
            });
        let tags: BTreeSet<MangaTag> = dom::select_all(main, "div.project-details a[href*=tag]")
            .into_iter()
            .filter_map(|a| {
                let href = dom::attr(a, "href")?;
                let key = href.trim_end_matches('/').rsplit('/').next()?;
                Some(self.ctx.tag(key, dom::text(a)))
            })
            .into_tag_set();

        let read_prefix = format!("{}/read/", self.ctx.domain());
        let items = dom::select_all(main, "div.chapter-list li");
        let chapters = dom::map_chapters(items, true, 0, |i, li| {
            let href = dom::select_all(li, "a")
                .into_iter()
                .filter_map(|a| dom::attr(a, "href"))
                .map(|href| self.ctx.absolute_url(href))
                .find(|href| href.contains(&read_prefix))?;
            let title = dom::select_first(li, ".chapter-name")
                .and_then(dom::text_or_none)
                .unwrap_or_else(|| format!("Chapter {}", i));
            let date = dom::select_first(li, ".name-chapter")
                .and_then(|el| el.children().filter_map(scraper::ElementRef::wrap).nth(2))
                .map(|el| self.dates.parse(&dom::text(el)))
                .unwrap_or(0);
            Some(self.ctx.chapter(&href, Some(title), date))
        });

        Ok(Manga {
            alt_titles,
            authors,
            state,
            tags,
            description: dom::select_first(main, "p.sContent").and_then(dom::text_or_none),
            chapters: Some(chapters),
            ..manga.clone()
        })
    }

    fn parse_pages(&self, html: &str, url: &str) -> Result<Vec<MangaPage>> {
        let doc = dom::parse_document(html);
        let reader = dom::require_first(doc.root_element(), "#webtoon", url)?;
        dom::select_all(reader, "img")
            .into_iter()
            .map(|img| {
                let src = dom::attr(img, "data-src")
                    .or_else(|| dom::attr(img, "src"))
                    .ok_or_else(|| ParserError::not_found(url, "#webtoon img[src]"))?;
                Ok(self.ctx.page(self.ctx.absolute_url(src)))
            })
            .collect()
    }

    fn parse_tags(&self, html: &str) -> BTreeSet<MangaTag> {
        let doc = dom::parse_document(html);
        dom::select_all(doc.root_element(), ".asp_gochosen")
            .get(1)
            .map(|select| {
                dom::select_all(*select, "option")
                    .into_iter()
                    .filter_map(dom::text_or_none)
                    .map(|name| self.ctx.tag(name.to_lowercase().replace(' ', "-"), name))
                    .into_tag_set()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl MangaParser for ScantradUnion {
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
        match self.list_request(&query)? {
            ListRequest::Exhausted => Ok(Vec::new()),
            ListRequest::Fetch(url) => {
                let html = self.ctx.get_text(&url).await?;
                self.parse_list(&html, &url)
            }
        }
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
        let html = self.ctx.get_text("/").await?;
        Ok(FilterOptions {
            available_tags: self.parse_tags(&html),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scantrad() -> ScantradUnion {
        ScantradUnion::new(ScantradUnion::default_config()).unwrap()
    }

    fn request(page: u32, order: SortOrder, filter: MangaListFilter) -> ListRequest {
        let s = scantrad();
        let query = ListQuery::resolve(&s.filter_capabilities(), page, order, &filter).unwrap();
        s.list_request(&query).unwrap()
    }

    #[test]
    fn updates_feed_has_one_page() {
        assert_eq!(
            request(1, SortOrder::Updated, MangaListFilter::default()),
            ListRequest::Fetch("https://scantrad-union.com/".into())
        );
        assert_eq!(
            request(2, SortOrder::Updated, MangaListFilter::default()),
            ListRequest::Exhausted
        );
        assert_eq!(
            request(3, SortOrder::Alphabetical, MangaListFilter::default()),
            ListRequest::Fetch("https://scantrad-union.com/manga/page/3/".into())
        );
    }

    #[test]
    fn tag_listing_and_search() {
        let s = scantrad();
        let tagged = MangaListFilter {
            tags: [s.ctx.tag("tranche-de-vie", "Tranche de vie")].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            request(2, SortOrder::Updated, tagged),
            ListRequest::Fetch("https://scantrad-union.com/tag/tranche-de-vie/page/2/".into())
        );
        let search = MangaListFilter {
            query: Some("one piece".into()),
            ..Default::default()
        };
        assert_eq!(
            request(1, SortOrder::Updated, search),
            ListRequest::Fetch("https://scantrad-union.com/page/1/?s=one+piece".into())
        );
    }

    #[test]
    fn exclusion_is_rejected() {
        let s = scantrad();
        let filter = MangaListFilter {
            tags_exclude: [s.ctx.tag("x", "x")].into_iter().collect(),
            ..Default::default()
        };
        let err = ListQuery::resolve(&s.filter_capabilities(), 1, SortOrder::Updated, &filter)
            .unwrap_err();
        assert!(err.is_invalid_filter());
    }

    #[test]
    fn details_number_chapters_from_zero() {
        let html = r#"<div id="main">
            <div class="project-details">
              <a href="https://scantrad-union.com/auteur/oda/">Oda</a>
              <a href="https://scantrad-union.com/tag/aventure/">Aventure</a>
            </div>
            <div class="divider2">Noms associés : Wan Pīsu</div>
            <span class="label label-primary">Manga</span>
            <span class="label label-primary">2020</span>
            <span class="label label-primary">En cours</span>
            <p class="sContent">Pirates.</p>
            <div class="chapter-list"><ul>
              <li><div class="name-chapter"><span>1</span><span>Le grand départ</span><span>05-03-2024</span></div>
                  <a href="https://scantrad-union.com/read/op/chapter-1/">Lire</a></li>
              <li><div class="name-chapter"><span>0</span><span>Prologue</span><span>01-03-2024</span></div>
                  <a href="https://example.org/elsewhere/">Ext</a>
                  <a href="https://scantrad-union.com/read/op/chapter-0/">Lire</a></li>
            </ul></div>
          </div>"#;
        let s = scantrad();
        let manga = s.ctx.manga("/projets/one-piece/", "One Piece");
        let details = s.parse_details(&manga, html).unwrap();
        assert_eq!(details.state, Some(MangaState::Ongoing));
        assert_eq!(details.tags.iter().next().map(|t| t.key.as_str()), Some("aventure"));
        assert_eq!(details.authors.len(), 1);
        assert_eq!(
            details.alt_titles.iter().next().map(String::as_str),
            Some("Wan Pīsu")
        );

        let chapters = details.chapters.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].number, 0.0);
        assert_eq!(chapters[0].url, "/read/op/chapter-0/");
        assert_eq!(chapters[0].title.as_deref(), Some("Chapter 0"));
        assert_eq!(chapters[1].number, 1.0);
        assert_eq!(chapters[1].upload_date, 1_709_596_800_000);
    }

    #[test]
    fn site_relative_chapter_links_are_kept() {
        let html = r#"<div id="main"><div class="chapter-list"><ul>
              <li><div class="name-chapter"><span>2</span><span>Suite</span><span>10-03-2024</span></div>
                  <a href="/read/op/chapter-2/">Lire</a></li>
              <li><div class="name-chapter"><span>1</span><span>Début</span><span>05-03-2024</span></div>
                  <a href="/projets/one-piece/">Projet</a>
                  <a href="https://scantrad-union.com/read/op/chapter-1/">Lire</a></li>
            </ul></div></div>"#;
        let s = scantrad();
        let manga = s.ctx.manga("/projets/one-piece/", "One Piece");
        let chapters = s.parse_details(&manga, html).unwrap().chapters.unwrap();
        let urls: Vec<_> = chapters.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["/read/op/chapter-1/", "/read/op/chapter-2/"]);
    }

    #[test]
    fn feed_and_archive_layouts() {
        let s = scantrad();
        let feed = r#"<div id="dernierschapitres"><div class="colonne">
            <a class="index-top4-a" href="https://scantrad-union.com/projets/a/">x</a>
            <div class="carteinfos"><a>Alpha</a></div>
            <img class="attachment-thumbnail" src="https://scantrad-union.com/a.jpg">
          </div></div>"#;
        let list = s.parse_list(feed, "u").unwrap();
        assert_eq!(list[0].title, "Alpha");
        assert_eq!(list[0].url, "/projets/a/");

        let archive = r#"<div id="main"><article class="post-outer">
            <a class="thumb-link" href="/projets/b/"><img src="/b.jpg"></a>
            <div class="index-post-header"><a>Beta</a></div>
          </article></div>"#;
        let list = s.parse_list(archive, "u").unwrap();
        assert_eq!(list[0].title, "Beta");
        assert_eq!(list[0].cover_url.as_deref(), Some("https://scantrad-union.com/b.jpg"));

        assert!(s.parse_list("<p></p>", "u").unwrap_err().is_not_found());
    }

    #[test]
    fn tags_come_from_second_chooser() {
        let html = r#"<select class="asp_gochosen"><option>Ignored</option></select>
            <select class="asp_gochosen"><option>Tranche de vie</option><option>Action</option></select>"#;
        let tags = scantrad().parse_tags(html);
        let keys: Vec<_> = tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["action", "tranche-de-vie"]);
    }
}
