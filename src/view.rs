//! View controller: turns user intents into state mutations and fetch effects,
//! drops stale catalog responses, and derives the view model handed to the
//! renderer. Nothing here performs I/O; the session runtime executes the
//! returned [`Effect`]s.

use crate::config::Timings;
use crate::debounce::Debouncer;
use crate::error::{AppError, NetworkError};
use crate::models::{
    Collection, Genre, MovieDetail, MovieSummary, Theme, UsageCounters, NO_OVERVIEW,
};
use crate::notify::{Notification, Notifier, Severity};
use crate::state::{AppState, DiscoverFilter, View};
use crate::tmdb::{MoviePage, QueryCriteria};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn};

const LOAD_FAILED: &str = "Could not load movies. Please try again.";

/// Work the runtime must carry out on the controller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchPage {
        generation: u64,
        criteria: QueryCriteria,
    },
    FetchDetail {
        generation: u64,
        id: i64,
    },
    Render,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Navigate(View),
    SelectFilter(DiscoverFilter),
    /// Raw search box input; debounced before it reaches the state.
    SearchInput(String),
    ClearSearch,
    SetGenre(String),
    SetYear(String),
    NextPage,
    PreviousPage,
    GoToPage(u32),
    Retry,
    ToggleFavorite(i64),
    ToggleWatchlist(i64),
    OpenDetail(i64),
    CloseDetail,
    CreateCollection { name: String, description: String },
    AddToCollection { collection_id: i64, movie_id: i64 },
    RemoveFromCollection { collection_id: i64, movie_id: i64 },
    DeleteCollection(i64),
    ToggleTheme,
}

/// Monotonic request counter; only the most recently issued id is current.
#[derive(Debug, Default)]
pub struct Generation {
    latest: u64,
}

impl Generation {
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest
    }

    /// Makes every outstanding request stale.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ListingStatus {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
enum DetailStatus {
    Closed,
    Loading(i64),
    Open(Box<MovieDetail>),
}

pub struct ViewController {
    state: AppState,
    notifier: Notifier,
    search: Debouncer<String>,
    listing_gen: Generation,
    detail_gen: Generation,
    listing: ListingStatus,
    detail: DetailStatus,
}

impl ViewController {
    pub fn new(state: AppState, timings: Timings) -> Self {
        Self {
            state,
            notifier: Notifier::new(timings.notification_ttl),
            search: Debouncer::new(timings.search_debounce),
            listing_gen: Generation::default(),
            detail_gen: Generation::default(),
            listing: ListingStatus::Loading,
            detail: DetailStatus::Closed,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifier.take_new()
    }

    pub fn expire_notifications(&mut self, now: Instant) {
        self.notifier.prune(now);
    }

    /// Earliest moment `tick` has work: a debounced search or an expiring
    /// notification.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.search.deadline(), self.notifier.next_expiry()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// First listing of the session.
    pub fn start(&mut self) -> Vec<Effect> {
        let view = self.state.view();
        self.navigate(view)
    }

    pub fn set_genres(&mut self, genres: Vec<Genre>) {
        self.state.set_genres(genres);
    }

    pub fn handle(&mut self, intent: Intent, now: Instant) -> Vec<Effect> {
        match intent {
            Intent::Navigate(view) => self.navigate(view),
            Intent::SelectFilter(filter) => self.select_filter(filter),
            Intent::SearchInput(text) => {
                self.search.push(text, now);
                Vec::new()
            }
            Intent::ClearSearch => self.clear_search(),
            Intent::SetGenre(id) => {
                let listing = self.state.set_genre(&id);
                self.refresh_if(listing)
            }
            Intent::SetYear(year) => {
                let listing = self.state.set_year(&year);
                self.refresh_if(listing)
            }
            Intent::NextPage => {
                let (current, _) = self.state.page_bounds();
                self.go_to_page(current.saturating_add(1))
            }
            Intent::PreviousPage => {
                let (current, _) = self.state.page_bounds();
                self.go_to_page(current.saturating_sub(1))
            }
            Intent::GoToPage(page) => self.go_to_page(page),
            Intent::Retry => {
                let listing = self.state.view().is_listing();
                self.refresh_if(listing)
            }
            Intent::ToggleFavorite(id) => self.toggle_favorite(id, now),
            Intent::ToggleWatchlist(id) => self.toggle_watchlist(id, now),
            Intent::OpenDetail(id) => self.open_detail(id),
            Intent::CloseDetail => {
                self.detail_gen.invalidate();
                self.detail = DetailStatus::Closed;
                vec![Effect::Render]
            }
            Intent::CreateCollection { name, description } => {
                self.create_collection(&name, &description, now)
            }
            Intent::AddToCollection {
                collection_id,
                movie_id,
            } => self.add_to_collection(collection_id, movie_id, now),
            Intent::RemoveFromCollection {
                collection_id,
                movie_id,
            } => {
                let result = self.state.remove_from_collection(collection_id, movie_id);
                let result = result
                    .map(|removed| removed.then(|| "Removed from collection".to_string()));
                self.report(result, now)
            }
            Intent::DeleteCollection(id) => {
                let result = self.state.delete_collection(id);
                self.report(
                    result.map(|c| Some(format!("Collection \"{}\" deleted", c.name))),
                    now,
                )
            }
            Intent::ToggleTheme => {
                let theme = self.state.toggle_theme();
                debug!(?theme, "Theme changed");
                vec![Effect::Render]
            }
        }
    }

    /// Applies the debounced search once its quiet period is over.
    pub fn flush_search(&mut self, now: Instant) -> Vec<Effect> {
        match self.search.fire_if_due(now) {
            Some(text) => self.apply_search(&text),
            None => Vec::new(),
        }
    }

    pub fn on_page_loaded(
        &mut self,
        generation: u64,
        result: Result<MoviePage, NetworkError>,
        now: Instant,
    ) -> Vec<Effect> {
        if !self.listing_gen.is_current(generation) {
            debug!(generation, "Discarding stale listing response");
            return Vec::new();
        }
        match result {
            Ok(page) => {
                let loaded = page.items.len();
                if !self.state.apply_page(page) {
                    // Ask for the last page that exists.
                    return self.refresh_if(true);
                }
                self.state.record_discovery(loaded);
                self.listing = ListingStatus::Loaded;
                debug!(generation, loaded, "Listing loaded");
            }
            Err(e) => {
                warn!("Failed to load movies: {}", e);
                self.listing = ListingStatus::Failed(LOAD_FAILED.to_string());
                self.notifier.notify(LOAD_FAILED, Severity::Error, now);
            }
        }
        vec![Effect::Render]
    }

    pub fn on_detail_loaded(
        &mut self,
        generation: u64,
        result: Result<MovieDetail, NetworkError>,
        now: Instant,
    ) -> Vec<Effect> {
        if !self.detail_gen.is_current(generation) {
            debug!(generation, "Discarding stale detail response");
            return Vec::new();
        }
        match result {
            Ok(detail) => self.detail = DetailStatus::Open(Box::new(detail)),
            Err(e) => {
                warn!("Failed to load movie details: {}", e);
                self.detail = DetailStatus::Closed;
                self.notifier
                    .notify("Could not load movie details", Severity::Error, now);
            }
        }
        vec![Effect::Render]
    }

    fn navigate(&mut self, view: View) -> Vec<Effect> {
        self.state.set_view(view);
        if view.is_listing() {
            return self.refresh_if(true);
        }
        // Whatever is in flight belongs to a listing that is no longer shown.
        self.listing_gen.invalidate();
        vec![Effect::Render]
    }

    fn select_filter(&mut self, filter: DiscoverFilter) -> Vec<Effect> {
        if self.state.view() == View::Search {
            self.search.cancel();
            self.state.set_search_query("");
        }
        let applied = self.state.set_filter(filter);
        self.refresh_if(applied)
    }

    fn clear_search(&mut self) -> Vec<Effect> {
        self.search.cancel();
        self.apply_search("")
    }

    fn apply_search(&mut self, text: &str) -> Vec<Effect> {
        let listing = self.state.set_search_query(text);
        if !self.state.search_query().is_empty() {
            info!("Searching for '{}'", self.state.search_query());
        }
        self.refresh_if(listing)
    }

    fn go_to_page(&mut self, page: u32) -> Vec<Effect> {
        if !self.state.pager_active() {
            return Vec::new();
        }
        let moved = self.state.go_to_page(page);
        self.refresh_if(moved)
    }

    fn refresh_if(&mut self, needed: bool) -> Vec<Effect> {
        if !needed {
            return Vec::new();
        }
        let generation = self.listing_gen.issue();
        self.listing = ListingStatus::Loading;
        vec![
            Effect::FetchPage {
                generation,
                criteria: self.state.criteria(),
            },
            Effect::Render,
        ]
    }

    fn toggle_favorite(&mut self, id: i64, now: Instant) -> Vec<Effect> {
        let Some(movie) = self.lookup(id, now) else {
            return vec![Effect::Render];
        };
        let message = if self.state.toggle_favorite(&movie) {
            (format!("\"{}\" added to favorites", movie.title), Severity::Success)
        } else {
            (format!("\"{}\" removed from favorites", movie.title), Severity::Info)
        };
        self.notifier.notify(message.0, message.1, now);
        vec![Effect::Render]
    }

    fn toggle_watchlist(&mut self, id: i64, now: Instant) -> Vec<Effect> {
        let Some(movie) = self.lookup(id, now) else {
            return vec![Effect::Render];
        };
        let message = if self.state.toggle_watchlist(&movie) {
            (format!("\"{}\" added to your watchlist", movie.title), Severity::Success)
        } else {
            (format!("\"{}\" removed from your watchlist", movie.title), Severity::Info)
        };
        self.notifier.notify(message.0, message.1, now);
        vec![Effect::Render]
    }

    fn open_detail(&mut self, id: i64) -> Vec<Effect> {
        let generation = self.detail_gen.issue();
        self.detail = DetailStatus::Loading(id);
        vec![Effect::FetchDetail { generation, id }, Effect::Render]
    }

    fn create_collection(&mut self, name: &str, description: &str, now: Instant) -> Vec<Effect> {
        let result = self
            .state
            .create_collection(name, description, Utc::now())
            .map(|c| Some(format!("Collection \"{}\" created", c.name)));
        self.report(result, now)
    }

    fn add_to_collection(&mut self, collection_id: i64, movie_id: i64, now: Instant) -> Vec<Effect> {
        let Some(movie) = self.lookup(movie_id, now) else {
            return vec![Effect::Render];
        };
        let result = self
            .state
            .add_to_collection(collection_id, &movie)
            .map(|added| {
                Some(if added {
                    format!("\"{}\" added to the collection", movie.title)
                } else {
                    format!("\"{}\" is already in that collection", movie.title)
                })
            });
        self.report(result, now)
    }

    /// Turns an operation outcome into feedback: success text or the error.
    fn report(&mut self, result: Result<Option<String>, AppError>, now: Instant) -> Vec<Effect> {
        match result {
            Ok(Some(msg)) => {
                self.notifier.notify(msg, Severity::Success, now);
            }
            Ok(None) => {}
            Err(e) => {
                self.notifier.notify(e.to_string(), Severity::Error, now);
            }
        }
        vec![Effect::Render]
    }

    fn lookup(&mut self, id: i64, now: Instant) -> Option<MovieSummary> {
        let found = match &self.detail {
            DetailStatus::Open(d) if d.summary.id == id => Some(d.summary.clone()),
            DetailStatus::Open(d) => d.similar.iter().find(|m| m.id == id).cloned(),
            _ => None,
        }
        .or_else(|| self.state.find_movie(id).cloned());
        if found.is_none() {
            self.notifier
                .notify(format!("No movie with id {id} on screen"), Severity::Error, now);
        }
        found
    }

    pub fn view_model(&self) -> ViewModel {
        let state = &self.state;
        let view = state.view();
        let (current, total) = state.page_bounds();
        let pager = (view.is_listing() && state.pager_active()).then(|| Pager::new(current, total));

        let content = match view {
            View::Discover | View::Search => match &self.listing {
                ListingStatus::Loading => Content::Loading,
                ListingStatus::Failed(message) => Content::Failed {
                    message: message.clone(),
                },
                ListingStatus::Loaded => self.cards(state.movies()),
            },
            View::Watchlist => self.cards(state.watchlist()),
            View::Collections => {
                Content::Collections(state.collections().iter().map(CollectionCard::from).collect())
            }
        };

        let detail = match &self.detail {
            DetailStatus::Closed => None,
            DetailStatus::Loading(id) => Some(DetailPanel::Loading(*id)),
            DetailStatus::Open(d) => Some(DetailPanel::Open(Box::new(self.detail_model(d)))),
        };

        ViewModel {
            view,
            filter: state.filter(),
            search_query: state.search_query().to_string(),
            genre: state.genre().to_string(),
            year: state.year().to_string(),
            pager,
            content,
            detail,
            counters: state.counters(),
            theme: state.theme(),
        }
    }

    fn cards(&self, movies: &[MovieSummary]) -> Content {
        if movies.is_empty() {
            return Content::Empty;
        }
        Content::Movies(movies.iter().map(|m| self.card(m)).collect())
    }

    fn card(&self, m: &MovieSummary) -> MovieCard {
        MovieCard {
            id: m.id,
            title: m.title.clone(),
            year_label: m.year().map_or_else(|| "N/A".to_string(), |y| y.to_string()),
            rating_label: m.rating_label(),
            overview: if m.overview.trim().is_empty() {
                NO_OVERVIEW.to_string()
            } else {
                m.overview.clone()
            },
            poster_url: m.poster_url("w500"),
            is_favorite: self.state.is_favorite(m.id),
            in_watchlist: self.state.is_in_watchlist(m.id),
        }
    }

    fn detail_model(&self, d: &MovieDetail) -> DetailModel {
        DetailModel {
            card: self.card(&d.summary),
            poster_url: d.summary.poster_url("w400"),
            runtime_label: d
                .runtime_minutes
                .map_or_else(|| "N/A".to_string(), |r| format!("{r} min")),
            genres: d.genres.iter().map(|g| g.name.clone()).collect(),
            directors: d.directors().into_iter().map(str::to_string).collect(),
            cast: d
                .top_cast()
                .iter()
                .map(|c| (c.name.clone(), c.character.clone()))
                .collect(),
            similar: d
                .top_similar()
                .iter()
                .map(|m| (m.id, m.title.clone()))
                .collect(),
        }
    }
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub view: View,
    pub filter: DiscoverFilter,
    pub search_query: String,
    pub genre: String,
    pub year: String,
    pub pager: Option<Pager>,
    pub content: Content,
    pub detail: Option<DetailPanel>,
    pub counters: UsageCounters,
    pub theme: Theme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub current: u32,
    pub total: u32,
    pub prev_enabled: bool,
    pub next_enabled: bool,
}

impl Pager {
    pub fn new(current: u32, total: u32) -> Self {
        Self {
            current,
            total,
            prev_enabled: current != 1,
            next_enabled: current != total,
        }
    }

    pub fn label(&self) -> String {
        format!("Page {} of {}", self.current, self.total)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Loading,
    Failed { message: String },
    /// Nothing matched; distinct from loading and from failure.
    Empty,
    Movies(Vec<MovieCard>),
    Collections(Vec<CollectionCard>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieCard {
    pub id: i64,
    pub title: String,
    pub year_label: String,
    pub rating_label: String,
    pub overview: String,
    pub poster_url: String,
    pub is_favorite: bool,
    pub in_watchlist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCard {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub color_token: String,
    pub movies: Vec<(i64, String)>,
}

impl From<&Collection> for CollectionCard {
    fn from(c: &Collection) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            description: c.description.clone(),
            color_token: c.color_token.clone(),
            movies: c.movies.iter().map(|m| (m.id, m.title.clone())).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailPanel {
    Loading(i64),
    Open(Box<DetailModel>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailModel {
    pub card: MovieCard,
    pub poster_url: String,
    pub runtime_label: String,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub cast: Vec<(String, String)>,
    pub similar: Vec<(i64, String)>,
}
