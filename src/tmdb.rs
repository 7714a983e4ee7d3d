use crate::config::Config;
use crate::error::NetworkError;
use crate::models::{CastCredit, CrewCredit, Genre, MovieDetail, MovieSummary};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
/// Upstream refuses pages past this one.
pub const MAX_TOTAL_PAGES: u32 = 500;
pub const CLASSIC_CUTOFF: &str = "1990-12-31";
pub const CLASSIC_MIN_VOTES: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Trending,
    Newest,
    Classic,
    Search,
}

/// Everything needed to ask the catalog for one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCriteria {
    pub mode: QueryMode,
    pub search_text: Option<String>,
    pub genre_id: Option<String>,
    pub year: Option<String>,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoviePage {
    pub items: Vec<MovieSummary>,
    pub total_pages: u32,
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_genres(&self) -> Result<Vec<Genre>, NetworkError>;
    async fn fetch_page(&self, criteria: &QueryCriteria) -> Result<MoviePage, NetworkError>;
    async fn fetch_detail(&self, id: i64) -> Result<MovieDetail, NetworkError>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl TmdbClient {
    pub fn new(config: &Config) -> Result<Self, NetworkError> {
        let user_agent = format!("cinexplora/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: config.tmdb_base_url.trim_end_matches('/').to_string(),
            api_key: config.tmdb_api_key.clone(),
            language: config.language.clone(),
        })
    }

    async fn get_text(&self, path_and_query: &str) -> Result<String, NetworkError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            // The path is logged without the query so the api key stays out of errors.
            let path = path_and_query
                .split('?')
                .next()
                .unwrap_or(path_and_query)
                .to_string();
            return Err(NetworkError::Status {
                status: status.as_u16(),
                path,
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn fetch_genres(&self) -> Result<Vec<Genre>, NetworkError> {
        #[derive(Deserialize)]
        struct GenreList {
            #[serde(default)]
            genres: Vec<Genre>,
        }

        let path = format!(
            "/genre/movie/list?api_key={}&language={}",
            self.api_key, self.language
        );
        let list: GenreList = serde_json::from_str(&self.get_text(&path).await?)?;
        Ok(list.genres)
    }

    async fn fetch_page(&self, criteria: &QueryCriteria) -> Result<MoviePage, NetworkError> {
        let path = listing_path(
            criteria,
            &self.api_key,
            &self.language,
            current_year(),
        );
        debug!(mode = ?criteria.mode, page = criteria.page, "Fetching catalog page");
        parse_listing(&self.get_text(&path).await?)
    }

    async fn fetch_detail(&self, id: i64) -> Result<MovieDetail, NetworkError> {
        let path = format!(
            "/movie/{id}?api_key={}&language={}&append_to_response=credits,similar",
            self.api_key, self.language
        );
        parse_detail(&self.get_text(&path).await?)
    }
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Local::now().year()
}

/// Path and query for a listing request. The mode picks the endpoint; genre and
/// year filters ride along whatever the mode. A user year replaces the year the
/// "newest" mode implies.
pub fn listing_path(criteria: &QueryCriteria, api_key: &str, language: &str, this_year: i32) -> String {
    let page = criteria.page.max(1);
    let user_year = criteria.year.as_deref().filter(|y| !y.is_empty());
    let search_text = criteria
        .search_text
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());

    let mut path = match (criteria.mode, search_text) {
        (QueryMode::Search, Some(q)) => format!(
            "/search/movie?api_key={api_key}&language={language}&query={}&page={page}",
            urlencoding::encode(q)
        ),
        (QueryMode::Newest, _) => {
            let mut p = format!(
                "/discover/movie?api_key={api_key}&language={language}&sort_by=release_date.desc&page={page}"
            );
            if user_year.is_none() {
                p.push_str(&format!("&year={this_year}"));
            }
            p
        }
        (QueryMode::Classic, _) => format!(
            "/discover/movie?api_key={api_key}&language={language}&sort_by=vote_average.desc&vote_count.gte={CLASSIC_MIN_VOTES}&page={page}&primary_release_date.lte={CLASSIC_CUTOFF}"
        ),
        // Trending, or a search with nothing to search for.
        _ => format!("/trending/movie/week?api_key={api_key}&language={language}&page={page}"),
    };

    if let Some(genre) = criteria.genre_id.as_deref().filter(|g| !g.is_empty()) {
        path.push_str(&format!("&with_genres={}", urlencoding::encode(genre)));
    }
    if let Some(year) = user_year {
        path.push_str(&format!("&year={}", urlencoding::encode(year)));
    }
    path
}

pub fn clamp_total_pages(raw: Option<u32>) -> u32 {
    raw.unwrap_or(1).clamp(1, MAX_TOTAL_PAGES)
}

pub fn parse_listing(body: &str) -> Result<MoviePage, NetworkError> {
    #[derive(Deserialize)]
    struct Listing {
        #[serde(default)]
        results: Option<Vec<MovieSummary>>,
        #[serde(default)]
        total_pages: Option<u32>,
    }

    let listing: Listing = serde_json::from_str(body)?;
    Ok(MoviePage {
        items: listing.results.unwrap_or_default(),
        total_pages: clamp_total_pages(listing.total_pages),
    })
}

pub fn parse_detail(body: &str) -> Result<MovieDetail, NetworkError> {
    #[derive(Deserialize)]
    struct Credits {
        #[serde(default)]
        cast: Vec<CastCredit>,
        #[serde(default)]
        crew: Vec<CrewCredit>,
    }
    #[derive(Deserialize)]
    struct Similar {
        #[serde(default)]
        results: Vec<MovieSummary>,
    }
    #[derive(Deserialize)]
    struct DetailAppended {
        #[serde(flatten)]
        summary: MovieSummary,
        runtime: Option<u32>,
        #[serde(default)]
        genres: Vec<Genre>,
        credits: Option<Credits>,
        similar: Option<Similar>,
    }

    let raw: DetailAppended = serde_json::from_str(body)?;
    let (cast, crew) = raw
        .credits
        .map(|c| (c.cast, c.crew))
        .unwrap_or_default();
    Ok(MovieDetail {
        summary: raw.summary,
        runtime_minutes: raw.runtime.filter(|r| *r > 0),
        genres: raw.genres,
        cast,
        crew,
        similar: raw.similar.map(|s| s.results).unwrap_or_default(),
    })
}
