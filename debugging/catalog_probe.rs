//! Fetch one catalog listing page or one movie detail and print it as mapped
//! by the crate's models.
//! Usage:
//!   cargo run --bin catalog_probe -- page <trending|new|classic> [page]
//!   cargo run --bin catalog_probe -- search <text> [page]
//!   cargo run --bin catalog_probe -- detail <movie_id>
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use cinexplora::config::Config;
use cinexplora::state::DiscoverFilter;
use cinexplora::tmdb::{CatalogApi, QueryCriteria, QueryMode, TmdbClient};
use dotenvy::dotenv;
use serde_json::json;
use std::env;
use std::str::FromStr;

fn usage() -> ! {
    eprintln!("Usage: cargo run --bin catalog_probe -- page <trending|new|classic> [page]");
    eprintln!("       cargo run --bin catalog_probe -- search <text> [page]");
    eprintln!("       cargo run --bin catalog_probe -- detail <movie_id>");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let config = Config::from_env()?;
    let client = TmdbClient::new(&config).context("Failed to build catalog client")?;
    let page_arg = |i: usize| -> Result<u32> {
        args.get(i)
            .map(|p| p.parse().context("page must be a positive integer"))
            .unwrap_or(Ok(1))
    };

    match args[1].as_str() {
        "page" => {
            let filter = DiscoverFilter::from_str(&args[2])?;
            let criteria = QueryCriteria {
                mode: filter.mode(),
                search_text: None,
                genre_id: env::var("PROBE_GENRE").ok(),
                year: env::var("PROBE_YEAR").ok(),
                page: page_arg(3)?,
            };
            print_page(&client, &criteria).await?
        }
        "search" => {
            let criteria = QueryCriteria {
                mode: QueryMode::Search,
                search_text: Some(args[2].clone()),
                genre_id: None,
                year: None,
                page: page_arg(3)?,
            };
            print_page(&client, &criteria).await?
        }
        "detail" => {
            let id: i64 = args[2].parse().context("movie_id must be an integer")?;
            let detail = client.fetch_detail(id).await?;
            let output = json!({
                "movie": detail.summary,
                "year": detail.summary.year(),
                "rating": detail.summary.rating_label(),
                "poster": detail.summary.poster_url("w400"),
                "runtime_minutes": detail.runtime_minutes,
                "genres": detail.genres,
                "directors": detail.directors(),
                "cast": detail.top_cast(),
                "similar": detail.top_similar(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => usage(),
    }
    Ok(())
}

async fn print_page(client: &TmdbClient, criteria: &QueryCriteria) -> Result<()> {
    let page = client.fetch_page(criteria).await?;
    let items: Vec<_> = page
        .items
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "title": m.title,
                "year": m.year(),
                "rating": m.rating_label(),
                "poster": m.poster_url("w500"),
            })
        })
        .collect();
    let output = json!({
        "page": criteria.page,
        "total_pages": page.total_pages,
        "results": items,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
