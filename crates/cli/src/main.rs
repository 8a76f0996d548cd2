// ABOUTME: CLI for exercising tankobon site adapters from the command line.
// ABOUTME: Lists catalogs, loads details, resolves pages and tags for one source and prints JSON.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tankobon_parsers::config::ConfigOverrides;
use tankobon_parsers::dom::{to_absolute_url, to_relative_url};
use tankobon_parsers::model::generate_uid;
use tankobon_parsers::{
    find_site, Manga, MangaChapter, MangaListFilter, MangaParser, MangaTag, Mangago, Mangahere,
    Manhwa18, ReadComicOnline, SadScans, ScantradUnion, SortOrder, SourceConfig,
};
use tracing_subscriber::EnvFilter;

/// Query a manga site adapter and output JSON.
#[derive(Parser, Debug)]
#[command(name = "tankobon")]
#[command(about = "Browse manga sites through tankobon adapters and print JSON", long_about = None)]
struct Args {
    /// Source name, e.g. MANGAHERE or MANGASUSHI (case-insensitive).
    source: String,

    #[command(subcommand)]
    command: Command,

    /// Output compact JSON instead of pretty.
    #[arg(long, global = true, default_value_t = false)]
    compact: bool,

    /// JSON file with config overrides (domain, scheme, user_agent, timeout_secs, headers).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the source domain (mirrors).
    #[arg(long, global = true)]
    domain: Option<String>,

    #[arg(long, global = true)]
    scheme: Option<String>,

    #[arg(long, global = true)]
    user_agent: Option<String>,

    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One catalog page.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        query: Option<String>,

        /// Tag key to include; repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Tag key to exclude; repeatable.
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Sort order, e.g. updated, popularity, alphabetical. Defaults to the source's first.
        #[arg(long)]
        order: Option<String>,
    },
    /// Series details and chapters for a manga url.
    Details { url: String },
    /// Page images of a chapter url.
    Pages { url: String },
    /// Available tags and states.
    Tags,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let overrides = load_overrides(&args)?;
    let parser = build_parser(&args.source, &overrides)?;

    let output = match &args.command {
        Command::List {
            page,
            query,
            tags,
            exclude,
            order,
        } => {
            let source = parser.source().name.clone();
            let to_tags = |keys: &[String]| -> BTreeSet<MangaTag> {
                keys.iter()
                    .map(|k| MangaTag::new(k.as_str(), k.as_str(), &source))
                    .collect()
            };
            let filter = MangaListFilter {
                query: query.clone(),
                tags: to_tags(tags),
                tags_exclude: to_tags(exclude),
                ..Default::default()
            };
            let order = order
                .as_deref()
                .map(SortOrder::from)
                .unwrap_or_else(|| parser.default_sort_order());
            let found = parser.list_page(*page, order, &filter).await?;
            json!({
                "source": source,
                "page": page,
                "order": order.to_string(),
                "page_size": parser.paging().page_size(filter.query().is_some()),
                "count": found.len(),
                "manga": found,
            })
        }
        Command::Details { url } => {
            let manga = manga_for(parser.as_ref(), url);
            serde_json::to_value(parser.details(&manga).await?)?
        }
        Command::Pages { url } => {
            let chapter = chapter_for(parser.as_ref(), url);
            serde_json::to_value(parser.pages(&chapter).await?)?
        }
        Command::Tags => {
            let options = parser.filter_options().await?;
            json!({
                "source": parser.source().name,
                "sort_orders": parser.sort_orders().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "capabilities": parser.filter_capabilities(),
                "options": options,
            })
        }
    };

    if args.compact {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}

/// Config file first, then flags on top.
fn load_overrides(args: &Args) -> Result<ConfigOverrides> {
    let mut overrides = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ConfigOverrides::default(),
    };
    if args.domain.is_some() {
        overrides.domain = args.domain.clone();
    }
    if args.scheme.is_some() {
        overrides.scheme = args.scheme.clone();
    }
    if args.user_agent.is_some() {
        overrides.user_agent = args.user_agent.clone();
    }
    if args.timeout_secs.is_some() {
        overrides.timeout_secs = args.timeout_secs;
    }
    Ok(overrides)
}

fn build_parser(name: &str, overrides: &ConfigOverrides) -> Result<Box<dyn MangaParser>> {
    let config = |defaults: SourceConfig| defaults.merge(overrides);
    let parser: Box<dyn MangaParser> = match name.to_ascii_uppercase().as_str() {
        Mangago::NAME => Box::new(Mangago::new(config(Mangago::default_config()))?),
        Mangahere::NAME => Box::new(Mangahere::new(config(Mangahere::default_config()))?),
        Manhwa18::NAME => Box::new(Manhwa18::new(config(Manhwa18::default_config()))?),
        ReadComicOnline::NAME => {
            Box::new(ReadComicOnline::new(config(ReadComicOnline::default_config()))?)
        }
        SadScans::NAME => Box::new(SadScans::new(config(SadScans::default_config()))?),
        ScantradUnion::NAME => {
            Box::new(ScantradUnion::new(config(ScantradUnion::default_config()))?)
        }
        other => {
            let site = find_site(other)?.ok_or_else(|| anyhow!("unknown source: {}", name))?;
            site.build(config(site.default_config()))?
        }
    };
    Ok(parser)
}

fn manga_for(parser: &dyn MangaParser, url: &str) -> Manga {
    let config = parser.config();
    let relative = to_relative_url(url, &config.domain);
    let public = to_absolute_url(&relative, &config.base_url());
    Manga::summary(parser.source(), relative, public, "")
}

fn chapter_for(parser: &dyn MangaParser, url: &str) -> MangaChapter {
    let source = &parser.source().name;
    let relative = to_relative_url(url, &parser.config().domain);
    MangaChapter {
        id: generate_uid(source, &relative),
        title: None,
        number: 0.0,
        volume: 0,
        url: relative,
        scanlator: None,
        upload_date: 0,
        branch: None,
        source: source.clone(),
    }
}
