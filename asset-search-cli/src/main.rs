use asset_search::query::fields::{self, Bound};
use asset_search::{
    ErrorDescriptor, SearchConfig, SearchFilters, SearchManager, SearchOptions, SearchQuery,
    SortOrder,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "asset-search")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON config file. Falls back to ASSET_SEARCH_* environment variables.
    #[arg(long, env = "ASSET_SEARCH_CONFIG", default_value = "./asset-search.json", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Run one search and print the result as JSON
    Search {
        /// Free text; omit to match everything
        #[arg(default_value = "")]
        query: String,
        /// Structured filter, repeatable (e.g. --filter province=Madrid --filter price_max=200000)
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        page_token: Option<String>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long, default_value = "relevance")]
        sort: String,
        /// Facet key to aggregate, repeatable
        #[arg(long = "facet")]
        facets: Vec<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Print autocomplete suggestions for a prefix
    Suggest {
        query: String,
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = SearchConfig::load_or_default(&cli.config);
    let manager = SearchManager::from_config(&config)?;

    match cli.command {
        Command::Search {
            query,
            filters,
            page_size,
            page_token,
            offset,
            sort,
            facets,
            user,
        } => {
            let filters = parse_filters(&filters)
                .map_err(|msg| std::io::Error::new(std::io::ErrorKind::InvalidInput, msg))?;
            let sort: SortOrder = sort
                .parse()
                .map_err(|msg: String| std::io::Error::new(std::io::ErrorKind::InvalidInput, msg))?;
            let mut options = SearchOptions {
                page_token,
                offset,
                sort,
                facets,
                user_pseudo_id: user,
                ..Default::default()
            };
            if let Some(n) = page_size {
                options.page_size = n;
            }

            let query = SearchQuery::new(query)
                .with_filters(filters)
                .with_options(options);
            match manager.search(&query).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(e) => {
                    eprintln!(
                        "{}",
                        serde_json::to_string_pretty(&ErrorDescriptor::from(&e))?
                    );
                    std::process::exit(2);
                }
            }
        }
        Command::Suggest { query, user } => {
            let suggestions = manager.get_suggestions(&query, user.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
        }
    }
    Ok(())
}

/// `key=value` pairs into filters. Range keys parse as numbers; repeated
/// categorical keys accumulate into a list.
fn parse_filters(pairs: &[String]) -> Result<SearchFilters, String> {
    let mut map = serde_json::Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("filter '{}' is not KEY=VALUE", pair))?;
        let (key, value) = (key.trim(), value.trim());
        if !fields::FILTER_FIELDS.iter().any(|m| m.public == key) {
            return Err(format!("unknown filter key '{}'", key));
        }

        if fields::bound_of(key) != Bound::Exact {
            let n: f64 = value
                .parse()
                .map_err(|_| format!("filter '{}' needs a number, got '{}'", key, value))?;
            map.insert(key.to_string(), serde_json::json!(n));
            continue;
        }

        let value = serde_json::Value::String(value.to_string());
        match map.remove(key) {
            None => {
                map.insert(key.to_string(), value);
            }
            Some(serde_json::Value::Array(mut list)) => {
                list.push(value);
                map.insert(key.to_string(), serde_json::Value::Array(list));
            }
            Some(prev) => {
                map.insert(key.to_string(), serde_json::Value::Array(vec![prev, value]));
            }
        }
    }
    serde_json::from_value(serde_json::Value::Object(map)).map_err(|e| e.to_string())
}
