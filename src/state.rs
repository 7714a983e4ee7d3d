//! The session's single source of truth.
//!
//! `AppState` is hydrated once from the store, then mutated only through the
//! methods below. Every mutation of user data is flushed to the store right
//! away; a failed write is logged and the in-memory change is kept.

use crate::error::{AppError, Result};
use crate::models::{Collection, Genre, MovieSummary, Theme, UsageCounters, COLLECTION_PALETTE};
use crate::store::{self, KeyValueStore};
use crate::tmdb::{clamp_total_pages, MoviePage, QueryCriteria, QueryMode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Discover,
    Search,
    Watchlist,
    Collections,
}

impl View {
    /// Views backed by a paginated catalog listing.
    pub fn is_listing(self) -> bool {
        matches!(self, View::Discover | View::Search)
    }
}

impl FromStr for View {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "discover" => Ok(View::Discover),
            "search" => Ok(View::Search),
            "watchlist" => Ok(View::Watchlist),
            "collections" => Ok(View::Collections),
            _ => Err(anyhow::anyhow!(
                "view must be one of discover, search, watchlist, collections"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscoverFilter {
    #[default]
    Trending,
    Newest,
    Classic,
}

impl DiscoverFilter {
    pub fn mode(self) -> QueryMode {
        match self {
            DiscoverFilter::Trending => QueryMode::Trending,
            DiscoverFilter::Newest => QueryMode::Newest,
            DiscoverFilter::Classic => QueryMode::Classic,
        }
    }
}

impl FromStr for DiscoverFilter {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "trending" => Ok(DiscoverFilter::Trending),
            "new" | "newest" => Ok(DiscoverFilter::Newest),
            "classic" => Ok(DiscoverFilter::Classic),
            _ => Err(anyhow::anyhow!("filter must be trending, new or classic")),
        }
    }
}

pub struct AppState {
    store: Arc<dyn KeyValueStore>,
    current_page: u32,
    total_pages: u32,
    pager_active: bool,
    view: View,
    filter: DiscoverFilter,
    search_query: String,
    genre: String,
    year: String,
    movies: Vec<MovieSummary>,
    genres: Vec<Genre>,
    favorites: Vec<MovieSummary>,
    watchlist: Vec<MovieSummary>,
    collections: Vec<Collection>,
    counters: UsageCounters,
    theme: Theme,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("view", &self.view)
            .field("filter", &self.filter)
            .field("search_query", &self.search_query)
            .field("page", &(self.current_page, self.total_pages))
            .field("favorites", &self.favorites.len())
            .field("watchlist", &self.watchlist.len())
            .field("collections", &self.collections.len())
            .finish()
    }
}

impl AppState {
    /// Reads every persisted key; anything missing or corrupt starts empty.
    pub fn hydrate(store: Arc<dyn KeyValueStore>) -> Self {
        let favorites = dedupe_by_id(store::load(store.as_ref(), store::FAVORITES));
        let watchlist = dedupe_by_id(store::load(store.as_ref(), store::WATCHLIST));
        let mut collections: Vec<Collection> = store::load(store.as_ref(), store::COLLECTIONS);
        for c in &mut collections {
            c.movies = dedupe_by_id(std::mem::take(&mut c.movies));
        }
        let counters = UsageCounters {
            movies_discovered: store::load(store.as_ref(), store::MOVIES_DISCOVERED),
            favorites_count: favorites.len() as u64,
        };
        let theme = store::load(store.as_ref(), store::THEME);
        info!(
            "Loaded {} favorites, {} watchlist entries, {} collections",
            favorites.len(),
            watchlist.len(),
            collections.len()
        );
        Self {
            store,
            current_page: 1,
            total_pages: 1,
            pager_active: true,
            view: View::Discover,
            filter: DiscoverFilter::default(),
            search_query: String::new(),
            genre: String::new(),
            year: String::new(),
            movies: Vec::new(),
            genres: Vec::new(),
            favorites,
            watchlist,
            collections,
            counters,
            theme,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn filter(&self) -> DiscoverFilter {
        self.filter
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn movies(&self) -> &[MovieSummary] {
        &self.movies
    }

    pub fn genres(&self) -> &[Genre] {
        &self.genres
    }

    pub fn favorites(&self) -> &[MovieSummary] {
        &self.favorites
    }

    pub fn watchlist(&self) -> &[MovieSummary] {
        &self.watchlist
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn counters(&self) -> UsageCounters {
        self.counters
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn pager_active(&self) -> bool {
        self.pager_active
    }

    /// `(current_page, total_pages)`; always `1 <= current <= total`.
    pub fn page_bounds(&self) -> (u32, u32) {
        (self.current_page, self.total_pages)
    }

    pub fn is_favorite(&self, id: i64) -> bool {
        self.favorites.iter().any(|m| m.id == id)
    }

    pub fn is_in_watchlist(&self, id: i64) -> bool {
        self.watchlist.iter().any(|m| m.id == id)
    }

    pub fn collection(&self, id: i64) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Looks a movie up in everything the session currently holds.
    pub fn find_movie(&self, id: i64) -> Option<&MovieSummary> {
        self.movies
            .iter()
            .chain(&self.favorites)
            .chain(&self.watchlist)
            .chain(self.collections.iter().flat_map(|c| &c.movies))
            .find(|m| m.id == id)
    }

    /// Listing query for the current view, filter and page.
    pub fn criteria(&self) -> QueryCriteria {
        let searching = self.view == View::Search && !self.search_query.is_empty();
        QueryCriteria {
            mode: if searching {
                QueryMode::Search
            } else {
                self.filter.mode()
            },
            search_text: searching.then(|| self.search_query.clone()),
            genre_id: non_empty(&self.genre),
            year: non_empty(&self.year),
            page: self.current_page,
        }
    }

    pub fn set_view(&mut self, view: View) {
        if self.view != view {
            debug!(from = ?self.view, to = ?view, "Switching view");
        }
        self.view = view;
        self.restart_paging();
        self.pager_active = view.is_listing();
    }

    /// Only meaningful on the discover view; returns whether it was applied.
    pub fn set_filter(&mut self, filter: DiscoverFilter) -> bool {
        if self.view != View::Discover {
            debug!(view = ?self.view, "Ignoring filter change outside discover");
            return false;
        }
        self.filter = filter;
        self.restart_paging();
        true
    }

    /// Trims and stores the query. A non-empty query enters the search view;
    /// an empty one sends a search view back to discover. Returns whether the
    /// resulting view needs a fresh listing.
    pub fn set_search_query(&mut self, text: &str) -> bool {
        self.search_query = text.trim().to_string();
        self.restart_paging();
        if !self.search_query.is_empty() {
            self.set_view(View::Search);
            return true;
        }
        if self.view == View::Search {
            self.set_view(View::Discover);
        }
        self.view.is_listing()
    }

    /// Empty means no constraint. Returns whether a listing is on screen.
    pub fn set_genre(&mut self, genre_id: &str) -> bool {
        self.genre = genre_id.trim().to_string();
        self.restart_paging();
        self.view.is_listing()
    }

    pub fn set_year(&mut self, year: &str) -> bool {
        self.year = year.trim().to_string();
        self.restart_paging();
        self.view.is_listing()
    }

    pub fn set_genres(&mut self, genres: Vec<Genre>) {
        self.genres = genres;
    }

    /// Out-of-range requests leave the cursor untouched.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        if page < 1 || page > self.total_pages {
            debug!(page, total = self.total_pages, "Rejecting page out of range");
            return false;
        }
        self.current_page = page;
        true
    }

    /// Stores a loaded page. When the requested page lies past the reported
    /// total, the cursor moves to the last valid page, the items are dropped
    /// and `false` is returned so the caller can fetch that page instead.
    pub fn apply_page(&mut self, page: MoviePage) -> bool {
        self.total_pages = clamp_total_pages(Some(page.total_pages));
        if self.current_page > self.total_pages {
            debug!(
                requested = self.current_page,
                total = self.total_pages,
                "Loaded page lies past the listing's end"
            );
            self.current_page = self.total_pages;
            return false;
        }
        self.current_page = self.current_page.max(1);
        self.movies = page.items;
        true
    }

    /// Returns the new membership.
    pub fn toggle_favorite(&mut self, movie: &MovieSummary) -> bool {
        let member = toggle_membership(&mut self.favorites, movie);
        self.counters.favorites_count = self.favorites.len() as u64;
        self.persist(store::FAVORITES, &self.favorites);
        self.persist(store::FAVORITES_COUNT, &self.counters.favorites_count);
        member
    }

    pub fn toggle_watchlist(&mut self, movie: &MovieSummary) -> bool {
        let member = toggle_membership(&mut self.watchlist, movie);
        self.persist(store::WATCHLIST, &self.watchlist);
        member
    }

    pub fn create_collection(
        &mut self,
        name: &str,
        description: &str,
        created_at: DateTime<Utc>,
    ) -> Result<&Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Please give your collection a name"));
        }
        let mut id = created_at.timestamp_millis();
        while self.collections.iter().any(|c| c.id == id) {
            id += 1;
        }
        let color = COLLECTION_PALETTE[id.rem_euclid(COLLECTION_PALETTE.len() as i64) as usize];
        self.collections.push(Collection {
            id,
            name: name.to_string(),
            description: description.trim().to_string(),
            color_token: color.to_string(),
            movies: Vec::new(),
            created_at,
        });
        self.persist(store::COLLECTIONS, &self.collections);
        let idx = self.collections.len() - 1;
        Ok(&self.collections[idx])
    }

    pub fn delete_collection(&mut self, id: i64) -> Result<Collection> {
        let idx = self.collection_index(id)?;
        let removed = self.collections.remove(idx);
        self.persist(store::COLLECTIONS, &self.collections);
        Ok(removed)
    }

    /// Returns false when the movie was already in the collection.
    pub fn add_to_collection(&mut self, id: i64, movie: &MovieSummary) -> Result<bool> {
        let idx = self.collection_index(id)?;
        if self.collections[idx].contains(movie.id) {
            return Ok(false);
        }
        self.collections[idx].movies.push(movie.clone());
        self.persist(store::COLLECTIONS, &self.collections);
        Ok(true)
    }

    pub fn remove_from_collection(&mut self, id: i64, movie_id: i64) -> Result<bool> {
        let idx = self.collection_index(id)?;
        let movies = &mut self.collections[idx].movies;
        let before = movies.len();
        movies.retain(|m| m.id != movie_id);
        if movies.len() == before {
            return Ok(false);
        }
        self.persist(store::COLLECTIONS, &self.collections);
        Ok(true)
    }

    /// Counts what was actually loaded, not what the catalog has.
    pub fn record_discovery(&mut self, count: usize) {
        self.counters.movies_discovered += count as u64;
        self.persist(store::MOVIES_DISCOVERED, &self.counters.movies_discovered);
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.persist(store::THEME, &self.theme);
        self.theme
    }

    // New criteria describe a different listing; its page count is unknown
    // until it loads.
    fn restart_paging(&mut self) {
        self.current_page = 1;
        self.total_pages = 1;
    }

    fn collection_index(&self, id: i64) -> Result<usize> {
        self.collections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| AppError::validation(format!("No collection with id {id}")))
    }

    fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = store::save(self.store.as_ref(), key, value) {
            error!("{}", e);
        }
    }
}

fn toggle_membership(list: &mut Vec<MovieSummary>, movie: &MovieSummary) -> bool {
    match list.iter().position(|m| m.id == movie.id) {
        Some(idx) => {
            list.remove(idx);
            false
        }
        None => {
            list.push(movie.clone());
            true
        }
    }
}

fn dedupe_by_id(movies: Vec<MovieSummary>) -> Vec<MovieSummary> {
    let mut seen = std::collections::HashSet::new();
    movies.into_iter().filter(|m| seen.insert(m.id)).collect()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn movie(id: i64, title: &str) -> MovieSummary {
        MovieSummary {
            id,
            title: title.to_string(),
            release_date: None,
            rating: Some(7.5),
            overview: String::new(),
            poster_path: None,
        }
    }

    fn fresh() -> (Arc<MemoryStore>, AppState) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::hydrate(store.clone());
        (store, state)
    }

    #[test]
    fn favorite_toggle_round_trips_membership_and_storage() {
        let (store, mut state) = fresh();
        let m = movie(42, "Heat");

        assert!(state.toggle_favorite(&m));
        assert_eq!(state.favorites(), &[m.clone()]);
        let stored: Vec<MovieSummary> = store::load(&*store, store::FAVORITES);
        assert_eq!(stored, vec![m.clone()]);
        assert_eq!(store.raw(store::FAVORITES_COUNT).as_deref(), Some("1"));

        assert!(!state.toggle_favorite(&m));
        assert!(state.favorites().is_empty());
        assert_eq!(store.raw(store::FAVORITES).as_deref(), Some("[]"));
        assert_eq!(state.counters().favorites_count, 0);
    }

    #[test]
    fn watchlist_toggle_is_keyed_by_id() {
        let (_store, mut state) = fresh();
        assert!(state.toggle_watchlist(&movie(1, "A")));
        // Same id with a different title still counts as the same movie.
        assert!(!state.toggle_watchlist(&movie(1, "A (re-release)")));
        assert!(!state.is_in_watchlist(1));
    }

    #[test]
    fn go_to_page_rejects_out_of_range() {
        let (_store, mut state) = fresh();
        state.apply_page(MoviePage {
            items: vec![movie(1, "A")],
            total_pages: 3,
        });
        assert!(!state.go_to_page(0));
        assert!(!state.go_to_page(4));
        assert_eq!(state.page_bounds(), (1, 3));
        assert!(state.go_to_page(3));
        assert_eq!(state.page_bounds(), (3, 3));
    }

    #[test]
    fn applied_page_never_reports_more_than_500_pages() {
        let (_store, mut state) = fresh();
        state.apply_page(MoviePage {
            items: vec![],
            total_pages: 90_000,
        });
        assert_eq!(state.page_bounds(), (1, 500));
    }

    #[test]
    fn changing_criteria_forgets_the_previous_page_count() {
        let (_store, mut state) = fresh();
        state.apply_page(MoviePage {
            items: vec![movie(1, "A")],
            total_pages: 500,
        });
        assert!(state.set_search_query("Amelie"));
        assert_eq!(state.page_bounds(), (1, 1));
        assert!(!state.go_to_page(300));

        state.apply_page(MoviePage {
            items: vec![movie(2, "B")],
            total_pages: 2,
        });
        assert!(state.set_genre("35"));
        assert_eq!(state.page_bounds(), (1, 1));
        state.apply_page(MoviePage {
            items: vec![],
            total_pages: 9,
        });
        assert!(state.set_year("2001"));
        assert_eq!(state.page_bounds(), (1, 1));
    }

    #[test]
    fn page_past_the_reported_end_is_not_stored() {
        let (_store, mut state) = fresh();
        assert!(state.apply_page(MoviePage {
            items: vec![movie(1, "A")],
            total_pages: 5,
        }));
        assert!(state.go_to_page(5));
        assert!(!state.apply_page(MoviePage {
            items: vec![],
            total_pages: 2,
        }));
        assert_eq!(state.page_bounds(), (2, 2));
        assert_eq!(state.movies(), &[movie(1, "A")]);
    }

    #[test]
    fn blank_collection_name_is_rejected_without_mutation() {
        let (store, mut state) = fresh();
        let err = state
            .create_collection("   \t", "whatever", Utc::now())
            .expect_err("blank name");
        assert!(err.is_validation());
        assert!(state.collections().is_empty());
        assert!(store.raw(store::COLLECTIONS).is_none());
    }

    #[test]
    fn collections_get_unique_ids_and_dedupe_movies() {
        let (store, mut state) = fresh();
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let first = state.create_collection(" Rainy days ", "", at).expect("create").id;
        let second = state.create_collection("Noir", "Black & white", at).expect("create").id;
        assert_ne!(first, second);
        assert_eq!(state.collection(first).map(|c| c.name.as_str()), Some("Rainy days"));

        let m = movie(9, "Amélie");
        assert!(state.add_to_collection(first, &m).expect("add"));
        assert!(!state.add_to_collection(first, &m).expect("add again"));
        assert_eq!(state.collection(first).map(|c| c.movies.len()), Some(1));

        assert!(state.remove_from_collection(first, 9).expect("remove"));
        assert!(!state.remove_from_collection(first, 9).expect("remove again"));

        state.delete_collection(second).expect("delete");
        assert!(state.delete_collection(second).is_err());
        let stored: Vec<Collection> = store::load(&*store, store::COLLECTIONS);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first);
    }

    #[test]
    fn filter_only_applies_on_discover() {
        let (_store, mut state) = fresh();
        state.set_view(View::Watchlist);
        assert!(!state.pager_active());
        assert!(!state.set_filter(DiscoverFilter::Classic));
        assert_eq!(state.filter(), DiscoverFilter::Trending);
        state.set_view(View::Discover);
        assert!(state.set_filter(DiscoverFilter::Classic));
        assert_eq!(state.criteria().mode, QueryMode::Classic);
    }

    #[test]
    fn search_query_switches_between_search_and_discover() {
        let (_store, mut state) = fresh();
        assert!(state.set_search_query("  Amélie "));
        assert_eq!(state.view(), View::Search);
        let c = state.criteria();
        assert_eq!(c.mode, QueryMode::Search);
        assert_eq!(c.search_text.as_deref(), Some("Amélie"));

        assert!(state.set_search_query(""));
        assert_eq!(state.view(), View::Discover);
        assert_eq!(state.criteria().mode, QueryMode::Trending);

        state.set_view(View::Collections);
        assert!(!state.set_search_query(""));
        assert_eq!(state.view(), View::Collections);
    }

    #[test]
    fn discovery_counter_accumulates_and_persists() {
        let (store, mut state) = fresh();
        state.record_discovery(20);
        state.record_discovery(3);
        assert_eq!(state.counters().movies_discovered, 23);
        assert_eq!(store.raw(store::MOVIES_DISCOVERED).as_deref(), Some("23"));
    }

    #[test]
    fn hydrate_survives_corrupt_entries_and_duplicates() {
        let store = MemoryStore::new()
            .with_raw(store::FAVORITES, r#"[{"id":1,"title":"A"},{"id":1,"title":"A"}]"#)
            .with_raw(store::WATCHLIST, "not json")
            .with_raw(store::COLLECTIONS, r#"{"wrong":"shape"}"#)
            .with_raw(store::MOVIES_DISCOVERED, "120")
            .with_raw(store::THEME, "\"dark\"");
        let state = AppState::hydrate(Arc::new(store));
        assert_eq!(state.favorites().len(), 1);
        assert!(state.watchlist().is_empty());
        assert!(state.collections().is_empty());
        assert_eq!(state.counters().movies_discovered, 120);
        assert_eq!(state.counters().favorites_count, 1);
        assert_eq!(state.theme(), Theme::Dark);
    }

    #[test]
    fn theme_toggle_persists() {
        let (store, mut state) = fresh();
        assert_eq!(state.toggle_theme(), Theme::Dark);
        assert_eq!(store.raw(store::THEME).as_deref(), Some("\"dark\""));
    }
}
