use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
pub const POSTER_PLACEHOLDER: &str =
    "https://via.placeholder.com/300x450/f0e8f8/e8a0b8?text=No+Image";
pub const NO_OVERVIEW: &str = "No description available.";

/// Palette tokens a new collection picks its accent color from.
pub const COLLECTION_PALETTE: [&str; 5] = [
    "primary-pink",
    "lavender",
    "deep-pink",
    "deep-lavender",
    "gold",
];

/// One movie as it appears in listings. Field names follow the catalog API so
/// persisted entries and API payloads share one encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, with = "lenient_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(rename = "vote_average", default)]
    pub rating: Option<f32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl MovieSummary {
    pub fn year(&self) -> Option<i32> {
        self.release_date.map(|d| d.year())
    }

    /// Rating with one decimal, or "N/A" when the catalog has no votes.
    pub fn rating_label(&self) -> String {
        match self.rating {
            Some(r) if r > 0.0 => format!("{:.1}", r.clamp(0.0, 10.0)),
            _ => "N/A".to_string(),
        }
    }

    pub fn poster_url(&self, size: &str) -> String {
        image_url(self.poster_path.as_deref(), size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastCredit {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub character: String,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewCredit {
    pub name: String,
    #[serde(default)]
    pub job: Option<String>,
}

/// Full record shown in the detail overlay. Never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieDetail {
    pub summary: MovieSummary,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<Genre>,
    pub cast: Vec<CastCredit>,
    pub crew: Vec<CrewCredit>,
    pub similar: Vec<MovieSummary>,
}

impl MovieDetail {
    pub const TOP_CAST: usize = 6;
    pub const TOP_SIMILAR: usize = 6;

    pub fn directors(&self) -> Vec<&str> {
        self.crew
            .iter()
            .filter(|c| c.job.as_deref() == Some("Director"))
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn top_cast(&self) -> &[CastCredit] {
        &self.cast[..self.cast.len().min(Self::TOP_CAST)]
    }

    pub fn top_similar(&self) -> &[MovieSummary] {
        &self.similar[..self.similar.len().min(Self::TOP_SIMILAR)]
    }
}

/// A user-curated, named group of movies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "color", default = "default_color_token")]
    pub color_token: String,
    #[serde(default)]
    pub movies: Vec<MovieSummary>,
    #[serde(rename = "created", default)]
    pub created_at: DateTime<Utc>,
}

impl Collection {
    pub fn contains(&self, movie_id: i64) -> bool {
        self.movies.iter().any(|m| m.id == movie_id)
    }
}

fn default_color_token() -> String {
    COLLECTION_PALETTE[0].to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Display-only counters persisted next to the collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounters {
    pub movies_discovered: u64,
    pub favorites_count: u64,
}

pub fn image_url(path: Option<&str>, size: &str) -> String {
    match path.filter(|p| !p.is_empty()) {
        Some(p) => format!("{IMAGE_BASE}/{size}{p}"),
        None => POSTER_PLACEHOLDER.to_string(),
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    // The catalog sends "" for unknown dates.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| NaiveDate::parse_from_str(s, FORMAT).ok()))
    }
}
