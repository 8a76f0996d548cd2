// ABOUTME: Pagination and filter orchestration shared by every adapter.
// ABOUTME: Normalizes a list filter against a source's capabilities and decides when pages run out.

use std::collections::BTreeSet;

use crate::error::{ParserError, Result};
use crate::model::{FilterCapabilities, MangaListFilter, MangaState, MangaTag, SortOrder};

/// How a source splits its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    Paged {
        page_size: usize,
        search_page_size: usize,
    },
    /// The whole listing comes back in one response.
    Single,
}

impl Paging {
    pub fn paged(page_size: usize, search_page_size: usize) -> Self {
        Paging::Paged {
            page_size,
            search_page_size,
        }
    }

    /// Expected number of entries on one page, `None` for single-page sources.
    pub fn page_size(&self, searching: bool) -> Option<usize> {
        match *self {
            Paging::Paged {
                page_size,
                search_page_size,
            } => Some(if searching { search_page_size } else { page_size }),
            Paging::Single => None,
        }
    }

    /// True when `page` can hold entries at all.
    pub fn covers(&self, page: u32) -> bool {
        match self {
            Paging::Paged { .. } => page >= 1,
            Paging::Single => page == 1,
        }
    }
}

/// What an adapter should do for one list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListRequest {
    Fetch(String),
    /// The adapter knows no entries exist for this page.
    Exhausted,
}

/// A list filter validated against a source's capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u32,
    pub order: SortOrder,
    pub filter: MangaListFilter,
}

impl ListQuery {
    /// Normalizes `filter` for a source.
    ///
    /// A non-empty query drops every facet unless the source can combine search and filters.
    /// Several tags on a single-tag source, or excluded tags on a source without exclusion,
    /// are rejected rather than silently narrowed.
    pub fn resolve(
        capabilities: &FilterCapabilities,
        page: u32,
        order: SortOrder,
        filter: &MangaListFilter,
    ) -> Result<Self> {
        if page == 0 {
            return Err(ParserError::invalid_filter("list", "page numbers start at 1"));
        }
        let mut filter = filter.clone();
        filter.query = filter.query().map(str::to_string);

        if filter.query.is_some() {
            if !capabilities.is_search_supported {
                return Err(ParserError::invalid_filter("list", "search is not supported"));
            }
            if !capabilities.is_search_with_filters_supported {
                filter = MangaListFilter {
                    query: filter.query,
                    ..Default::default()
                };
            }
        }

        if filter.tags.len() > 1 && !capabilities.is_multiple_tags_supported {
            return Err(ParserError::invalid_filter(
                "list",
                format!("only one tag is supported, got {}", filter.tags.len()),
            ));
        }
        if !filter.tags_exclude.is_empty() && !capabilities.is_tags_exclusion_supported {
            return Err(ParserError::invalid_filter(
                "list",
                "excluding tags is not supported",
            ));
        }

        Ok(Self {
            page,
            order,
            filter,
        })
    }

    pub fn query(&self) -> Option<&str> {
        self.filter.query.as_deref()
    }

    /// The single selected tag, if any.
    pub fn tag(&self) -> Result<Option<&MangaTag>> {
        one_or_none(&self.filter.tags)
    }

    /// The single selected state, if any.
    pub fn state(&self) -> Result<Option<MangaState>> {
        one_or_none(&self.filter.states).map(|state| state.copied())
    }

    /// Keys of the included tags joined with `sep`.
    pub fn tag_keys(&self, sep: &str) -> String {
        join_keys(&self.filter.tags, sep)
    }

    /// Keys of the excluded tags joined with `sep`.
    pub fn excluded_tag_keys(&self, sep: &str) -> String {
        join_keys(&self.filter.tags_exclude, sep)
    }
}

fn join_keys(tags: &BTreeSet<MangaTag>, sep: &str) -> String {
    tags.iter()
        .map(|t| t.key.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

/// `None` for an empty set, the element for a singleton, `InvalidFilter` otherwise.
pub fn one_or_none<T>(set: &BTreeSet<T>) -> Result<Option<&T>> {
    let mut iter = set.iter();
    let first = iter.next();
    if iter.next().is_some() {
        return Err(ParserError::invalid_filter(
            "list",
            format!("expected at most one value, got {}", set.len()),
        ));
    }
    Ok(first)
}

/// True when `page` lies past the last page a listing advertises.
pub fn exceeds_last_page(page: u32, last_page: u32) -> bool {
    page > last_page
}

/// Reads the last page number out of a pagination link, e.g. `?page=7&artist=`.
pub fn last_page_from_href(href: &str, param: &str) -> Option<u32> {
    let needle = format!("{}=", param);
    let start = href.rfind(&needle)? + needle.len();
    let digits: String = href[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Percent-encodes a query value for inclusion in a url.
pub fn encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tag(key: &str) -> MangaTag {
        MangaTag::new(key, key, "TEST")
    }

    fn filter_with(query: Option<&str>, tags: &[&str]) -> MangaListFilter {
        MangaListFilter {
            query: query.map(str::to_string),
            tags: tags.iter().map(|k| tag(k)).collect(),
            ..Default::default()
        }
    }

    fn caps(search: bool, combined: bool, multi: bool, exclude: bool) -> FilterCapabilities {
        FilterCapabilities {
            is_search_supported: search,
            is_search_with_filters_supported: combined,
            is_multiple_tags_supported: multi,
            is_tags_exclusion_supported: exclude,
        }
    }

    #[test]
    fn query_drops_facets_without_combined_support() {
        let filter = MangaListFilter {
            states: [MangaState::Ongoing].into_iter().collect(),
            ..filter_with(Some("  solo  "), &["action", "drama"])
        };
        let q = ListQuery::resolve(&caps(true, false, true, false), 1, SortOrder::Updated, &filter)
            .unwrap();
        assert_eq!(q.query(), Some("solo"));
        assert!(q.filter.tags.is_empty());
        assert!(q.filter.states.is_empty());
    }

    #[test]
    fn query_keeps_facets_with_combined_support() {
        let filter = filter_with(Some("solo"), &["action", "drama"]);
        let q = ListQuery::resolve(&caps(true, true, true, true), 2, SortOrder::Updated, &filter)
            .unwrap();
        assert_eq!(q.tag_keys(","), "action,drama");
        assert_eq!(q.query(), Some("solo"));
    }

    #[test]
    fn too_many_tags_rejected() {
        let filter = filter_with(None, &["action", "drama"]);
        let err = ListQuery::resolve(&caps(true, false, false, false), 1, SortOrder::Updated, &filter)
            .unwrap_err();
        assert!(err.is_invalid_filter());
    }

    #[test]
    fn exclusion_rejected_without_support() {
        let filter = MangaListFilter {
            tags_exclude: [tag("gore")].into_iter().collect(),
            ..Default::default()
        };
        let err = ListQuery::resolve(&caps(true, false, true, false), 1, SortOrder::Updated, &filter)
            .unwrap_err();
        assert!(err.is_invalid_filter());
    }

    #[test]
    fn search_rejected_when_unsupported() {
        let filter = filter_with(Some("x"), &[]);
        assert!(
            ListQuery::resolve(&caps(false, false, false, false), 1, SortOrder::Updated, &filter)
                .is_err()
        );
        assert!(ListQuery::resolve(&caps(true, false, false, false), 0, SortOrder::Updated, &filter)
            .is_err());
    }

    #[test]
    fn one_or_none_behaviour() {
        let empty: BTreeSet<u8> = BTreeSet::new();
        assert_eq!(one_or_none(&empty).unwrap(), None);
        let one: BTreeSet<u8> = [3].into_iter().collect();
        assert_eq!(one_or_none(&one).unwrap(), Some(&3));
        let two: BTreeSet<u8> = [3, 4].into_iter().collect();
        assert!(one_or_none(&two).unwrap_err().is_invalid_filter());
    }

    #[test]
    fn paging_and_last_page() {
        assert!(Paging::Single.covers(1));
        assert!(!Paging::Single.covers(2));
        assert!(Paging::paged(20, 10).covers(9));
        assert_eq!(Paging::paged(20, 10).page_size(true), Some(10));
        assert!(exceeds_last_page(4, 3));
        assert!(!exceeds_last_page(3, 3));
        assert_eq!(
            last_page_from_href("/lista-de-manga.html?page=7&artist=", "page"),
            Some(7)
        );
        assert_eq!(last_page_from_href("/lista.html", "page"), None);
    }

    #[test]
    fn encodes_queries() {
        assert_eq!(encode_query("solo leveling"), "solo+leveling");
        assert_eq!(encode_query("a&b"), "a%26b");
    }
}
