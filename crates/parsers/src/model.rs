// ABOUTME: Value records shared by every adapter: manga, chapters, pages, tags and filters.
// ABOUTME: Records are immutable; enrichment produces a new record via struct update syntax.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Rating value used when a source does not expose one.
pub const RATING_UNKNOWN: f32 = -1.0;

/// Derives a stable identifier from a source name and a canonical relative URL.
///
/// The same pair always yields the same id; the source name is folded in first so equal
/// paths on different sources do not collide.
pub fn generate_uid(source: &str, url: &str) -> i64 {
    let mut h: i64 = 1125899906842597;
    for c in source.chars().chain(url.chars()) {
        h = h.wrapping_mul(31).wrapping_add(c as i64);
    }
    h
}

/// Broad kind of content a source publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Manga,
    Manhwa,
    Manhua,
    /// Sources that publish mostly adult content.
    Hentai,
    /// Western comics.
    Comics,
    Novel,
    Other,
}

/// Static description of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaSource {
    pub name: String,
    pub title: String,
    pub locale: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
}

impl MangaSource {
    pub fn new(name: &str, title: &str, locale: Option<&str>, content_type: ContentType) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            locale: locale.map(str::to_string),
            content_type,
        }
    }

    /// True for sources whose whole catalog is adult content.
    pub fn is_nsfw(&self) -> bool {
        self.content_type == ContentType::Hentai
    }
}

/// Publication lifecycle of a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MangaState {
    Ongoing,
    Finished,
    Paused,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentRating {
    Safe,
    Suggestive,
    Adult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Updated,
    UpdatedAsc,
    Popularity,
    PopularityAsc,
    Rating,
    RatingAsc,
    Newest,
    NewestAsc,
    Alphabetical,
    AlphabeticalDesc,
    Relevance,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortOrder::Updated => "updated",
            SortOrder::UpdatedAsc => "updated_asc",
            SortOrder::Popularity => "popularity",
            SortOrder::PopularityAsc => "popularity_asc",
            SortOrder::Rating => "rating",
            SortOrder::RatingAsc => "rating_asc",
            SortOrder::Newest => "newest",
            SortOrder::NewestAsc => "newest_asc",
            SortOrder::Alphabetical => "alphabetical",
            SortOrder::AlphabeticalDesc => "alphabetical_desc",
            SortOrder::Relevance => "relevance",
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for SortOrder {
    fn from(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "updated_asc" => SortOrder::UpdatedAsc,
            "popularity" | "popular" => SortOrder::Popularity,
            "popularity_asc" => SortOrder::PopularityAsc,
            "rating" => SortOrder::Rating,
            "rating_asc" => SortOrder::RatingAsc,
            "newest" | "new" => SortOrder::Newest,
            "newest_asc" => SortOrder::NewestAsc,
            "alphabetical" | "az" => SortOrder::Alphabetical,
            "alphabetical_desc" | "za" => SortOrder::AlphabeticalDesc,
            "relevance" => SortOrder::Relevance,
            _ => SortOrder::Updated,
        }
    }
}

/// A source-scoped category.
///
/// Equality, ordering and hashing only look at `(source, key)`, so a `BTreeSet<MangaTag>`
/// keeps one entry per key. Build scraped sets with [`TagSetExt::into_tag_set`] so the first
/// title seen for a key wins; `collect()` keeps the last one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaTag {
    pub key: String,
    pub title: String,
    pub source: String,
}

impl MangaTag {
    pub fn new(key: impl Into<String>, title: impl Into<String>, source: &str) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            source: source.to_string(),
        }
    }
}

/// Collects tags into a set, keeping the first title seen for each key.
pub trait TagSetExt: Iterator<Item = MangaTag> + Sized {
    fn into_tag_set(self) -> BTreeSet<MangaTag> {
        self.fold(BTreeSet::new(), |mut set, tag| {
            set.insert(tag);
            set
        })
    }
}

impl<I: Iterator<Item = MangaTag>> TagSetExt for I {}

impl PartialEq for MangaTag {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.key == other.key
    }
}

impl Eq for MangaTag {}

impl Hash for MangaTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.key.hash(state);
    }
}

impl PartialOrd for MangaTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MangaTag {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.source, &self.key).cmp(&(&other.source, &other.key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaChapter {
    pub id: i64,
    pub title: Option<String>,
    pub number: f32,
    pub volume: i32,
    pub url: String,
    pub scanlator: Option<String>,
    /// Epoch milliseconds, 0 when unknown.
    pub upload_date: i64,
    pub branch: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaPage {
    pub id: i64,
    pub url: String,
    pub preview: Option<String>,
    pub source: String,
}

impl MangaPage {
    pub fn new(url: impl Into<String>, source: &str) -> Self {
        let url = url.into();
        Self {
            id: generate_uid(source, &url),
            url,
            preview: None,
            source: source.to_string(),
        }
    }
}

/// A series record. Summary records from list pages carry no chapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: i64,
    pub title: String,
    pub alt_titles: BTreeSet<String>,
    pub url: String,
    pub public_url: String,
    pub cover_url: Option<String>,
    pub large_cover_url: Option<String>,
    pub content_rating: Option<ContentRating>,
    pub rating: f32,
    pub tags: BTreeSet<MangaTag>,
    pub state: Option<MangaState>,
    pub authors: BTreeSet<String>,
    pub description: Option<String>,
    pub chapters: Option<Vec<MangaChapter>>,
    pub source: String,
}

impl Manga {
    /// Builds a summary record with everything but identity left empty.
    pub fn summary(
        source: &MangaSource,
        url: impl Into<String>,
        public_url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: generate_uid(&source.name, &url),
            title: title.into(),
            alt_titles: BTreeSet::new(),
            url,
            public_url: public_url.into(),
            cover_url: None,
            large_cover_url: None,
            content_rating: source.is_nsfw().then_some(ContentRating::Adult),
            rating: RATING_UNKNOWN,
            tags: BTreeSet::new(),
            state: None,
            authors: BTreeSet::new(),
            description: None,
            chapters: None,
            source: source.name.clone(),
        }
    }
}

/// What an adapter can do with a [`MangaListFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterCapabilities {
    #[serde(default)]
    pub is_search_supported: bool,
    #[serde(default)]
    pub is_search_with_filters_supported: bool,
    #[serde(default)]
    pub is_multiple_tags_supported: bool,
    #[serde(default)]
    pub is_tags_exclusion_supported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MangaListFilter {
    pub query: Option<String>,
    pub tags: BTreeSet<MangaTag>,
    pub tags_exclude: BTreeSet<MangaTag>,
    pub states: BTreeSet<MangaState>,
    pub content_ratings: BTreeSet<ContentRating>,
}

impl MangaListFilter {
    /// The trimmed query, or `None` when it is absent or blank.
    pub fn query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    pub fn has_facets(&self) -> bool {
        !self.tags.is_empty()
            || !self.tags_exclude.is_empty()
            || !self.states.is_empty()
            || !self.content_ratings.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.query().is_none() && !self.has_facets()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub available_tags: BTreeSet<MangaTag>,
    pub available_states: BTreeSet<MangaState>,
    pub available_content_ratings: BTreeSet<ContentRating>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_is_stable_and_source_scoped() {
        let a = generate_uid("MANGAGO", "/read-manga/one/");
        assert_eq!(a, generate_uid("MANGAGO", "/read-manga/one/"));
        assert_ne!(a, generate_uid("MANGAGO", "/read-manga/two/"));
        assert_ne!(a, generate_uid("MANHWA18", "/read-manga/one/"));
    }

    #[test]
    fn tag_set_deduplicates_by_key() {
        let tags: BTreeSet<MangaTag> = [
            MangaTag::new("action", "Action", "MANGAGO"),
            MangaTag::new("action", "ACTION!", "MANGAGO"),
            MangaTag::new("drama", "Drama", "MANGAGO"),
        ]
        .into_iter()
        .into_tag_set();

        assert_eq!(tags.len(), 2);
        let action = tags.iter().find(|t| t.key == "action").unwrap();
        assert_eq!(action.title, "Action");
    }

    #[test]
    fn blank_query_is_none() {
        let filter = MangaListFilter {
            query: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(filter.query().is_none());
        assert!(filter.is_empty());
    }

    #[test]
    fn sort_order_from_str() {
        assert_eq!(SortOrder::from("popularity"), SortOrder::Popularity);
        assert_eq!(SortOrder::from("AZ"), SortOrder::Alphabetical);
        assert_eq!(SortOrder::from("unknown"), SortOrder::Updated);
    }

    #[test]
    fn summary_marks_adult_sources() {
        let source = MangaSource::new("X", "X", Some("en"), ContentType::Hentai);
        let manga = Manga::summary(&source, "/a", "https://x/a", "A");
        assert_eq!(manga.content_rating, Some(ContentRating::Adult));
        assert_eq!(manga.rating, RATING_UNKNOWN);
        assert!(manga.chapters.is_none());
    }
}
