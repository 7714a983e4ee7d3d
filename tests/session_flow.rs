use cinexplora::app::{Completion, Session};
use cinexplora::config::Timings;
use cinexplora::error::NetworkError;
use cinexplora::models::{CastCredit, CrewCredit, Genre, MovieDetail, MovieSummary};
use cinexplora::state::{AppState, View};
use cinexplora::store::{JsonFileStore, KeyValueStore, MemoryStore};
use cinexplora::tmdb::{CatalogApi, MoviePage, QueryCriteria, QueryMode};
use cinexplora::view::{Content, DetailPanel, Intent, ViewController};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;

const PER_PAGE: i64 = 3;

struct FakeCatalog {
    total_pages: u32,
    calls: Mutex<Vec<QueryCriteria>>,
    first_page_gate: Mutex<Option<oneshot::Receiver<()>>>,
    failing: AtomicBool,
}

impl FakeCatalog {
    fn new(total_pages: u32) -> Arc<Self> {
        Arc::new(Self {
            total_pages,
            calls: Mutex::new(Vec::new()),
            first_page_gate: Mutex::new(None),
            failing: AtomicBool::new(false),
        })
    }

    /// The next page-1 request waits until the returned sender fires.
    fn hold_first_page(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.first_page_gate.lock().unwrap() = Some(rx);
        tx
    }

    fn calls(&self) -> Vec<QueryCriteria> {
        self.calls.lock().unwrap().clone()
    }
}

fn movie(id: i64) -> MovieSummary {
    MovieSummary {
        id,
        title: format!("Movie {id}"),
        release_date: None,
        rating: Some(7.5),
        overview: String::new(),
        poster_path: None,
    }
}

#[async_trait::async_trait]
impl CatalogApi for FakeCatalog {
    async fn fetch_genres(&self) -> Result<Vec<Genre>, NetworkError> {
        Ok(vec![
            Genre {
                id: 35,
                name: "Comedy".to_string(),
            },
            Genre {
                id: 18,
                name: "Drama".to_string(),
            },
        ])
    }

    async fn fetch_page(&self, criteria: &QueryCriteria) -> Result<MoviePage, NetworkError> {
        self.calls.lock().unwrap().push(criteria.clone());
        if criteria.page == 1 {
            let gate = self.first_page_gate.lock().unwrap().take();
            if let Some(rx) = gate {
                let _ = rx.await;
            }
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(NetworkError::Status {
                status: 503,
                path: "/discover/movie".to_string(),
                body: String::new(),
            });
        }
        let base = criteria.page as i64 * 100;
        Ok(MoviePage {
            items: (base..base + PER_PAGE).map(movie).collect(),
            total_pages: self.total_pages,
        })
    }

    async fn fetch_detail(&self, id: i64) -> Result<MovieDetail, NetworkError> {
        Ok(MovieDetail {
            summary: movie(id),
            runtime_minutes: Some(122),
            genres: vec![Genre {
                id: 35,
                name: "Comedy".to_string(),
            }],
            cast: vec![CastCredit {
                name: "Audrey Tautou".to_string(),
                character: "Amélie Poulain".to_string(),
                profile_path: None,
            }],
            crew: vec![CrewCredit {
                name: "Jean-Pierre Jeunet".to_string(),
                job: Some("Director".to_string()),
            }],
            similar: vec![movie(9001)],
        })
    }
}

fn session_with(
    store: Arc<dyn KeyValueStore>,
    catalog: Arc<FakeCatalog>,
) -> (Session, UnboundedReceiver<Completion>) {
    let controller = ViewController::new(AppState::hydrate(store), Timings::default());
    Session::new(controller, catalog)
}

async fn next_completion(rx: &mut UnboundedReceiver<Completion>) -> Completion {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("completion in time")
        .expect("channel open")
}

async fn started(
    store: Arc<dyn KeyValueStore>,
    catalog: Arc<FakeCatalog>,
) -> (Session, UnboundedReceiver<Completion>) {
    let (mut session, mut rx) = session_with(store, catalog);
    assert!(session.start().await);
    let done = next_completion(&mut rx).await;
    assert!(session.apply(done, Instant::now()));
    (session, rx)
}

fn movie_ids(session: &Session) -> Vec<i64> {
    session
        .controller()
        .state()
        .movies()
        .iter()
        .map(|m| m.id)
        .collect()
}

#[tokio::test]
async fn start_loads_genres_and_first_trending_page() {
    let catalog = FakeCatalog::new(4);
    let (session, _rx) = started(Arc::new(MemoryStore::new()), catalog.clone()).await;

    assert_eq!(session.controller().state().genres().len(), 2);
    assert_eq!(movie_ids(&session), vec![100, 101, 102]);
    let calls = catalog.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].mode, QueryMode::Trending);
    let vm = session.controller().view_model();
    assert_eq!(vm.pager.map(|p| p.label()), Some("Page 1 of 4".to_string()));
    assert_eq!(vm.counters.movies_discovered, 3);
}

#[tokio::test]
async fn library_views_do_not_hit_the_catalog() {
    let catalog = FakeCatalog::new(4);
    let (mut session, _rx) = started(Arc::new(MemoryStore::new()), catalog.clone()).await;

    session.handle(Intent::Navigate(View::Watchlist), Instant::now());
    session.handle(Intent::Navigate(View::Collections), Instant::now());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(catalog.calls().len(), 1);
    assert!(session.controller().view_model().pager.is_none());
}

#[tokio::test]
async fn late_first_page_does_not_replace_second_page() {
    let catalog = FakeCatalog::new(5);
    let (mut session, mut rx) = started(Arc::new(MemoryStore::new()), catalog.clone()).await;

    let release = catalog.hold_first_page();
    session.handle(Intent::Retry, Instant::now());
    session.handle(Intent::NextPage, Instant::now());

    let second = next_completion(&mut rx).await;
    assert!(session.apply(second, Instant::now()));
    assert_eq!(movie_ids(&session), vec![200, 201, 202]);

    release.send(()).expect("gate open");
    let stale = next_completion(&mut rx).await;
    assert!(!session.apply(stale, Instant::now()));
    assert_eq!(movie_ids(&session), vec![200, 201, 202]);
    assert_eq!(session.controller().state().page_bounds(), (2, 5));
}

#[tokio::test]
async fn debounced_search_fires_once_and_paging_keeps_query() {
    let catalog = FakeCatalog::new(3);
    let (mut session, mut rx) = started(Arc::new(MemoryStore::new()), catalog.clone()).await;

    let t0 = Instant::now();
    session.handle(Intent::SearchInput("Am".into()), t0);
    session.handle(Intent::SearchInput("Amél".into()), t0 + Duration::from_millis(100));
    session.handle(Intent::SearchInput("Amélie".into()), t0 + Duration::from_millis(200));
    assert!(!session.tick(t0 + Duration::from_millis(600)));
    assert!(session.tick(t0 + Duration::from_millis(700)));
    let done = next_completion(&mut rx).await;
    session.apply(done, Instant::now());

    session.handle(Intent::NextPage, Instant::now());
    let done = next_completion(&mut rx).await;
    session.apply(done, Instant::now());

    let searches: Vec<QueryCriteria> = catalog
        .calls()
        .into_iter()
        .filter(|c| c.mode == QueryMode::Search)
        .collect();
    assert_eq!(searches.len(), 2);
    assert_eq!(searches[0].search_text.as_deref(), Some("Amélie"));
    assert_eq!(searches[1].search_text.as_deref(), Some("Amélie"));
    assert_eq!(searches[1].page, 2);
    assert_eq!(session.controller().state().view(), View::Search);
}

#[tokio::test]
async fn failed_listing_offers_retry() {
    let catalog = FakeCatalog::new(2);
    let (mut session, mut rx) = started(Arc::new(MemoryStore::new()), catalog.clone()).await;

    catalog.failing.store(true, Ordering::SeqCst);
    session.handle(Intent::SetGenre("18".into()), Instant::now());
    let done = next_completion(&mut rx).await;
    session.apply(done, Instant::now());
    assert!(matches!(
        session.controller().view_model().content,
        Content::Failed { .. }
    ));

    catalog.failing.store(false, Ordering::SeqCst);
    session.handle(Intent::Retry, Instant::now());
    let done = next_completion(&mut rx).await;
    session.apply(done, Instant::now());
    assert!(matches!(
        session.controller().view_model().content,
        Content::Movies(_)
    ));
    assert_eq!(catalog.calls().last().and_then(|c| c.genre_id.clone()), Some("18".to_string()));
}

#[tokio::test]
async fn detail_overlay_opens_with_credits() {
    let catalog = FakeCatalog::new(1);
    let (mut session, mut rx) = started(Arc::new(MemoryStore::new()), catalog).await;

    session.handle(Intent::OpenDetail(101), Instant::now());
    let done = next_completion(&mut rx).await;
    assert!(session.apply(done, Instant::now()));
    let Some(DetailPanel::Open(detail)) = session.controller().view_model().detail else {
        panic!("detail overlay should be open");
    };
    assert_eq!(detail.card.id, 101);
    assert_eq!(detail.runtime_label, "122 min");
    assert_eq!(detail.directors, vec!["Jean-Pierre Jeunet".to_string()]);
    assert_eq!(detail.similar, vec![(9001, "Movie 9001".to_string())]);
}

#[tokio::test]
async fn library_survives_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = FakeCatalog::new(2);
    {
        let store: Arc<dyn KeyValueStore> =
            Arc::new(JsonFileStore::open(dir.path()).expect("open store"));
        let (mut session, _rx) = started(store, catalog.clone()).await;
        let now = Instant::now();
        session.handle(Intent::ToggleFavorite(100), now);
        session.handle(Intent::ToggleWatchlist(101), now);
        session.handle(
            Intent::CreateCollection {
                name: "Comfort".into(),
                description: "rainy sundays".into(),
            },
            now,
        );
        let cid = session.controller().state().collections()[0].id;
        session.handle(
            Intent::AddToCollection {
                collection_id: cid,
                movie_id: 102,
            },
            now,
        );
        session.handle(Intent::ToggleTheme, now);
    }

    let store: Arc<dyn KeyValueStore> =
        Arc::new(JsonFileStore::open(dir.path()).expect("reopen store"));
    let state = AppState::hydrate(store);
    assert!(state.is_favorite(100));
    assert!(state.is_in_watchlist(101));
    assert_eq!(state.collections().len(), 1);
    assert!(state.collections()[0].contains(102));
    assert_eq!(state.counters().favorites_count, 1);
    assert_eq!(state.counters().movies_discovered, 3);
    assert_eq!(state.theme(), cinexplora::models::Theme::Dark);
}

#[tokio::test]
async fn notifications_expire_without_a_pending_search() {
    let catalog = FakeCatalog::new(1);
    let (mut session, _rx) = started(Arc::new(MemoryStore::new()), catalog).await;

    let t0 = Instant::now();
    let ttl = Timings::default().notification_ttl;
    for i in 0..3u32 {
        let at = t0 + Duration::from_secs(10) * i;
        session.handle(Intent::ToggleFavorite(100), at);
        assert_eq!(session.controller().next_deadline(), Some(at + ttl));
        session.tick(at + ttl);
        assert_eq!(session.controller().next_deadline(), None);
    }
    assert_eq!(session.controller_mut().take_notifications().len(), 0);
}
