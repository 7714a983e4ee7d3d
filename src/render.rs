//! Plain-text rendering of view models for the terminal shell.

use crate::models::Genre;
use crate::notify::{Notification, Severity};
use crate::state::{DiscoverFilter, View};
use crate::view::{Content, DetailModel, DetailPanel, MovieCard, ViewModel};
use std::fmt::Write;

pub const OLDEST_YEAR: i32 = 1950;
const OVERVIEW_WIDTH: usize = 140;

pub fn frame(vm: &ViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== cinexplora [{}] == {} discovered | {} favorites | theme: {:?}",
        view_label(vm.view),
        vm.counters.movies_discovered,
        vm.counters.favorites_count,
        vm.theme
    );
    if vm.view.is_listing() {
        let _ = writeln!(out, "{}", criteria_line(vm));
    }

    match &vm.content {
        Content::Loading => out.push_str("Loading movies...\n"),
        Content::Failed { message } => {
            let _ = writeln!(out, "{message} Type `retry` to try again.");
        }
        Content::Empty => out.push_str(match vm.view {
            View::Watchlist => "Your watchlist is empty.\n",
            _ => "No movies found.\n",
        }),
        Content::Movies(cards) => {
            for card in cards {
                out.push_str(&movie_line(card));
            }
        }
        Content::Collections(cards) if cards.is_empty() => {
            out.push_str("No collections yet. Create one with `new <name>`.\n");
        }
        Content::Collections(cards) => {
            for c in cards {
                let _ = writeln!(
                    out,
                    "[{}] {} ({} movies, {})",
                    c.id,
                    c.name,
                    c.movies.len(),
                    c.color_token
                );
                if !c.description.is_empty() {
                    let _ = writeln!(out, "    {}", c.description);
                }
                for (id, title) in &c.movies {
                    let _ = writeln!(out, "    - [{id}] {title}");
                }
            }
        }
    }

    if let Some(pager) = &vm.pager {
        let _ = writeln!(
            out,
            "{} {} {}",
            if pager.prev_enabled { "< prev" } else { "      " },
            pager.label(),
            if pager.next_enabled { "next >" } else { "" }
        );
    }

    match &vm.detail {
        None => {}
        Some(DetailPanel::Loading(id)) => {
            let _ = writeln!(out, "Loading details for {id}...");
        }
        Some(DetailPanel::Open(d)) => out.push_str(&detail(d)),
    }
    out
}

fn view_label(view: View) -> &'static str {
    match view {
        View::Discover => "discover",
        View::Search => "search",
        View::Watchlist => "watchlist",
        View::Collections => "collections",
    }
}

fn criteria_line(vm: &ViewModel) -> String {
    let mut parts = Vec::new();
    if vm.view == View::Search && !vm.search_query.is_empty() {
        parts.push(format!("search \"{}\"", vm.search_query));
    } else {
        parts.push(format!(
            "filter {}",
            match vm.filter {
                DiscoverFilter::Trending => "trending",
                DiscoverFilter::Newest => "new",
                DiscoverFilter::Classic => "classic",
            }
        ));
    }
    if !vm.genre.is_empty() {
        parts.push(format!("genre {}", vm.genre));
    }
    if !vm.year.is_empty() {
        parts.push(format!("year {}", vm.year));
    }
    parts.join(" | ")
}

fn movie_line(card: &MovieCard) -> String {
    let marks = format!(
        "{}{}",
        if card.is_favorite { "♥" } else { " " },
        if card.in_watchlist { "+" } else { " " }
    );
    format!(
        "{marks} [{}] {} ({}) ★ {}\n    {}\n",
        card.id,
        card.title,
        card.year_label,
        card.rating_label,
        truncate(&card.overview, OVERVIEW_WIDTH)
    )
}

fn detail(d: &DetailModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "---- {} ({}) ----", d.card.title, d.card.year_label);
    let _ = writeln!(
        out,
        "Rating {} | {} | {}",
        d.card.rating_label,
        d.runtime_label,
        if d.genres.is_empty() {
            "N/A".to_string()
        } else {
            d.genres.join(", ")
        }
    );
    if !d.directors.is_empty() {
        let _ = writeln!(out, "Directed by {}", d.directors.join(", "));
    }
    let _ = writeln!(out, "{}", d.card.overview);
    let _ = writeln!(out, "Poster: {}", d.poster_url);
    if !d.cast.is_empty() {
        let cast: Vec<String> = d
            .cast
            .iter()
            .map(|(name, role)| {
                if role.is_empty() {
                    name.clone()
                } else {
                    format!("{name} as {role}")
                }
            })
            .collect();
        let _ = writeln!(out, "Cast: {}", cast.join(", "));
    }
    if !d.similar.is_empty() {
        let similar: Vec<String> = d
            .similar
            .iter()
            .map(|(id, title)| format!("{title} [{id}]"))
            .collect();
        let _ = writeln!(out, "Similar: {}", similar.join(", "));
    }
    out
}

pub fn notification(n: &Notification) -> String {
    let tag = match n.severity {
        Severity::Info => "i",
        Severity::Success => "ok",
        Severity::Error => "!",
    };
    format!("({tag}) {}", n.message)
}

pub fn genres(genres: &[Genre], this_year: i32) -> String {
    let mut out = String::from("Genres:\n");
    if genres.is_empty() {
        out.push_str("  (not loaded)\n");
    }
    for g in genres {
        let _ = writeln!(out, "  {:>6}  {}", g.id, g.name);
    }
    let years = year_options(this_year);
    if let (Some(first), Some(last)) = (years.first(), years.last()) {
        let _ = writeln!(out, "Years: {first} down to {last}");
    }
    out
}

/// Selectable release years, newest first.
pub fn year_options(this_year: i32) -> Vec<i32> {
    (OLDEST_YEAR..=this_year).rev().collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
