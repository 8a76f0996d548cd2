// ABOUTME: Site templates: one parser per CMS theme, parameterized by embedded JSON site records.
// ABOUTME: Loads data/template_sites.json and builds Madara, MangaReader and FmReader adapters.

//! Template-driven adapters.
//!
//! Many sites run the same CMS theme and differ only in domain, list path, page size and a
//! handful of selectors. Those sites are described as data in `data/template_sites.json`;
//! each record names its template and overrides only what differs from the template's
//! defaults.

pub mod fmreader;
pub mod madara;
pub mod mangareader;

use serde::Deserialize;

use crate::config::{SourceConfig, SourceConfigBuilder};
use crate::error::{ParserError, Result};
use crate::model::{ContentType, FilterCapabilities, MangaSource};
use crate::parser::MangaParser;

pub use fmreader::{FmReader, FmReaderParams};
pub use madara::{Madara, MadaraParams};
pub use mangareader::{MangaReader, MangaReaderParams};

const BUILTIN_SITES_JSON: &str = include_str!("../../data/template_sites.json");

/// Per-template parameters, selected by the record's `template` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum TemplateParams {
    Madara(MadaraParams),
    MangaReader(MangaReaderParams),
    FmReader(FmReaderParams),
}

/// Capability switches a site flips relative to its template.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct CapabilityOverrides {
    pub search_with_filters: Option<bool>,
    pub multiple_tags: Option<bool>,
    pub tags_exclusion: Option<bool>,
}

impl CapabilityOverrides {
    pub fn apply(&self, base: FilterCapabilities) -> FilterCapabilities {
        FilterCapabilities {
            is_search_supported: base.is_search_supported,
            is_search_with_filters_supported: self
                .search_with_filters
                .unwrap_or(base.is_search_with_filters_supported),
            is_multiple_tags_supported: self
                .multiple_tags
                .unwrap_or(base.is_multiple_tags_supported),
            is_tags_exclusion_supported: self
                .tags_exclusion
                .unwrap_or(base.is_tags_exclusion_supported),
        }
    }
}

fn default_page_size() -> usize {
    20
}

/// One site running a known template.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSite {
    pub name: String,
    pub title: String,
    pub domain: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub search_page_size: Option<usize>,
    #[serde(default)]
    pub capabilities: CapabilityOverrides,
    #[serde(flatten)]
    pub params: TemplateParams,
}

impl TemplateSite {
    pub fn descriptor(&self) -> MangaSource {
        MangaSource::new(
            &self.name,
            &self.title,
            self.locale.as_deref(),
            self.content_type,
        )
    }

    pub fn default_config(&self) -> SourceConfig {
        SourceConfigBuilder::new(&self.domain)
            .page_size(self.page_size)
            .search_page_size(self.search_page_size.unwrap_or(self.page_size))
            .build()
    }

    /// Builds the adapter for this site.
    pub fn build(&self, config: SourceConfig) -> Result<Box<dyn MangaParser>> {
        Ok(match &self.params {
            TemplateParams::Madara(params) => {
                Box::new(Madara::new(self.clone(), params.clone(), config)?)
            }
            TemplateParams::MangaReader(params) => {
                Box::new(MangaReader::new(self.clone(), params.clone(), config)?)
            }
            TemplateParams::FmReader(params) => {
                Box::new(FmReader::new(self.clone(), params.clone(), config)?)
            }
        })
    }
}

/// The template sites shipped with the crate.
pub fn builtin_sites() -> Result<Vec<TemplateSite>> {
    serde_json::from_str(BUILTIN_SITES_JSON).map_err(|e| {
        ParserError::format(
            "data/template_sites.json",
            "load template sites",
            Some(anyhow::anyhow!(e)),
        )
    })
}

/// Looks a template site up by source name, case-insensitively.
pub fn find_site(name: &str) -> Result<Option<TemplateSite>> {
    Ok(builtin_sites()?
        .into_iter()
        .find(|site| site.name.eq_ignore_ascii_case(name)))
}
