use crate::state::{DiscoverFilter, View};
use crate::view::Intent;
use anyhow::{anyhow, bail, Context, Result};

pub const HELP: &str = "\
Commands:
  discover | watchlist | collections     switch view
  filter <trending|new|classic>          discover filter
  search <text>                          search titles (clear with `clear`)
  genre [id]  year [yyyy]                narrow the listing; no argument resets
  genres                                 list genres and selectable years
  next | prev | page <n> | retry         paging
  fav <id> | watch <id>                  toggle favorite / watchlist
  detail <id> | close                    detail overlay
  new <name> [| description]             create a collection
  add <collection> <movie>               add a movie to a collection
  remove <collection> <movie>            remove a movie from a collection
  drop <collection>                      delete a collection
  theme | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    Help,
    Genres,
    Quit,
}

impl From<Intent> for Command {
    fn from(intent: Intent) -> Self {
        Command::Intent(intent)
    }
}

/// Parses one shell line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let command: Command = match word.to_ascii_lowercase().as_str() {
        "discover" | "watchlist" | "collections" => {
            Intent::Navigate(word.parse::<View>()?).into()
        }
        "filter" => Intent::SelectFilter(rest.parse::<DiscoverFilter>()?).into(),
        "search" | "s" => {
            if rest.is_empty() {
                bail!("Usage: search <text>");
            }
            Intent::SearchInput(rest.to_string()).into()
        }
        "clear" => Intent::ClearSearch.into(),
        "genre" => Intent::SetGenre(rest.to_string()).into(),
        "year" => {
            if !rest.is_empty() {
                rest.parse::<i32>()
                    .with_context(|| format!("Invalid year '{rest}'"))?;
            }
            Intent::SetYear(rest.to_string()).into()
        }
        "genres" => Command::Genres,
        "next" | "n" => Intent::NextPage.into(),
        "prev" | "p" => Intent::PreviousPage.into(),
        "page" => Intent::GoToPage(number(rest, "page")?).into(),
        "retry" => Intent::Retry.into(),
        "fav" => Intent::ToggleFavorite(number(rest, "movie id")?).into(),
        "watch" => Intent::ToggleWatchlist(number(rest, "movie id")?).into(),
        "detail" | "d" => Intent::OpenDetail(number(rest, "movie id")?).into(),
        "close" => Intent::CloseDetail.into(),
        "new" => {
            let (name, description) = match rest.split_once('|') {
                Some((n, d)) => (n.trim(), d.trim()),
                None => (rest, ""),
            };
            Intent::CreateCollection {
                name: name.to_string(),
                description: description.to_string(),
            }
            .into()
        }
        "add" | "remove" => {
            let (collection_id, movie_id) = pair(rest)?;
            let intent = if word.eq_ignore_ascii_case("add") {
                Intent::AddToCollection {
                    collection_id,
                    movie_id,
                }
            } else {
                Intent::RemoveFromCollection {
                    collection_id,
                    movie_id,
                }
            };
            intent.into()
        }
        "drop" => Intent::DeleteCollection(number(rest, "collection id")?).into(),
        "theme" => Intent::ToggleTheme.into(),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("Unknown command '{other}'. Type `help` for a list."),
    };
    Ok(Some(command))
}

fn number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    if raw.is_empty() {
        bail!("Missing {what}");
    }
    raw.parse()
        .map_err(|_| anyhow!("Invalid {what} '{raw}'"))
}

fn pair(raw: &str) -> Result<(i64, i64)> {
    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => Ok((number(a, "collection id")?, number(b, "movie id")?)),
        _ => bail!("Expected <collection-id> <movie-id>"),
    }
}
