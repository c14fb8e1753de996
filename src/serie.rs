//! Series record model and its raw CSV row form.

use crate::field::{parse_integer, Field, FieldValue, CAST_SEPARATOR};
use crate::score::Score;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One series in the catalog.
///
/// # Invariants
///
/// - `id` is unique across the store and never changes after creation
/// - `end_year == 0` means the series is still running
/// - `rating == 0` means general audience
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Serie {
    pub id: u64,
    pub title: String,

    /// Display order within the catalog.
    pub order: i64,

    pub premiere_year: i64,

    /// Year the series ended, `0` while still running.
    pub end_year: i64,

    pub episodes: i64,

    /// Content-rating code (age), `0` for general audience.
    pub rating: i64,

    /// Review score, e.g. the IMDb rating.
    pub score: Score,

    /// Reference link.
    pub link: String,

    pub popularity: Score,

    pub cast: Vec<String>,
}

impl Serie {
    /// Creates a record with every field at its default.
    pub fn empty(id: u64) -> Self {
        Serie {
            id,
            title: String::new(),
            order: 0,
            premiere_year: 0,
            end_year: 0,
            episodes: 0,
            rating: 0,
            score: Score::ZERO,
            link: String::new(),
            popularity: Score::ZERO,
            cast: Vec::new(),
        }
    }

    /// Returns the typed value of a field.
    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::Id => FieldValue::Integer(i64::try_from(self.id).unwrap_or(i64::MAX)),
            Field::Title => FieldValue::Text(self.title.clone()),
            Field::Order => FieldValue::Integer(self.order),
            Field::PremiereYear => FieldValue::Integer(self.premiere_year),
            Field::EndYear => FieldValue::Integer(self.end_year),
            Field::Episodes => FieldValue::Integer(self.episodes),
            Field::Rating => FieldValue::Integer(self.rating),
            Field::Score => FieldValue::Decimal(self.score),
            Field::Link => FieldValue::Text(self.link.clone()),
            Field::Popularity => FieldValue::Decimal(self.popularity),
            Field::Cast => FieldValue::List(self.cast.clone()),
        }
    }

    /// Overwrites a field with a value already coerced by
    /// [`FieldValue::coerce`]. The id is fixed and never written here.
    ///
    /// Returns `false` if the value's kind does not fit the field.
    pub fn set(&mut self, field: Field, value: FieldValue) -> bool {
        match (field, value) {
            (Field::Id, _) => return false,
            (Field::Title, FieldValue::Text(v)) => self.title = v,
            (Field::Order, FieldValue::Integer(v)) => self.order = v,
            (Field::PremiereYear, FieldValue::Integer(v)) => self.premiere_year = v,
            (Field::EndYear, FieldValue::Integer(v)) => self.end_year = v,
            (Field::Episodes, FieldValue::Integer(v)) => self.episodes = v,
            (Field::Rating, FieldValue::Integer(v)) => self.rating = v,
            (Field::Score, FieldValue::Decimal(v)) => self.score = v,
            (Field::Link, FieldValue::Text(v)) => self.link = v,
            (Field::Popularity, FieldValue::Decimal(v)) => self.popularity = v,
            (Field::Cast, FieldValue::List(v)) => self.cast = v,
            _ => return false,
        }
        true
    }

    /// Returns `true` if the series has not ended.
    pub fn is_running(&self) -> bool {
        self.end_year == 0
    }

    /// Renders the record as CSV cells in [`Field::ALL`] order.
    pub fn to_csv_row(&self) -> [String; 11] {
        [
            self.id.to_string(),
            self.title.clone(),
            self.order.to_string(),
            self.premiere_year.to_string(),
            self.end_year.to_string(),
            self.episodes.to_string(),
            self.rating.to_string(),
            self.score.to_string(),
            self.link.clone(),
            self.popularity.to_string(),
            self.cast.join(CAST_SEPARATOR),
        ]
    }
}

/// Raw record as read from CSV.
///
/// Every column is optional so that missing columns and empty cells can be
/// coerced to defaults instead of failing the load. Legacy Portuguese headers
/// are accepted as aliases.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SerieRow {
    pub id: Option<String>,

    #[serde(alias = "titulo", alias = "nome")]
    pub title: Option<String>,

    #[serde(alias = "ordem")]
    pub order: Option<String>,

    #[serde(alias = "ano_estreia")]
    pub premiere_year: Option<String>,

    #[serde(alias = "ano_encerramento")]
    pub end_year: Option<String>,

    #[serde(alias = "episodios")]
    pub episodes: Option<String>,

    #[serde(alias = "classificacao_indicativa")]
    pub rating: Option<String>,

    #[serde(alias = "nota_imdb")]
    pub score: Option<String>,

    pub link: Option<String>,

    #[serde(alias = "popularidade")]
    pub popularity: Option<String>,

    #[serde(alias = "atores")]
    pub cast: Option<String>,
}

impl SerieRow {
    /// Converts the raw row into a record.
    ///
    /// Returns an error message if the id is missing or a non-empty cell
    /// cannot be parsed as its column's type.
    pub fn parse(&self) -> std::result::Result<Serie, String> {
        let id_cell = cell(&self.id).ok_or_else(|| "missing id".to_string())?;
        let id = parse_integer(id_cell)
            .filter(|id| *id >= 0)
            .ok_or_else(|| format!("invalid id '{}'", id_cell))? as u64;

        Ok(Serie {
            id,
            title: text(&self.title).to_string(),
            order: integer(&self.order, Field::Order)?,
            premiere_year: integer(&self.premiere_year, Field::PremiereYear)?,
            end_year: integer(&self.end_year, Field::EndYear)?,
            episodes: integer(&self.episodes, Field::Episodes)?,
            rating: self.parse_rating()?,
            score: decimal(&self.score, Field::Score)?,
            link: text(&self.link).to_string(),
            popularity: decimal(&self.popularity, Field::Popularity)?,
            cast: text(&self.cast)
                .split(CAST_SEPARATOR)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        })
    }

    /// Rating codes may be the general-audience label instead of a number.
    fn parse_rating(&self) -> std::result::Result<i64, String> {
        match cell(&self.rating) {
            Some(label) if label.eq_ignore_ascii_case("livre") || label.eq_ignore_ascii_case("l") => {
                Ok(0)
            }
            _ => integer(&self.rating, Field::Rating),
        }
    }
}

/// Returns the trimmed text cell. `NaN` is kept as text here; only numeric
/// columns read it as missing.
fn text(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or_default()
}

/// Returns the trimmed numeric cell, treating empty and `NaN` cells as missing.
fn cell(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
}

fn integer(value: &Option<String>, field: Field) -> std::result::Result<i64, String> {
    match cell(value) {
        None => Ok(0),
        Some(s) => parse_integer(s).ok_or_else(|| format!("invalid {} '{}'", field, s)),
    }
}

fn decimal(value: &Option<String>, field: Field) -> std::result::Result<Score, String> {
    match cell(value) {
        None => Ok(Score::ZERO),
        Some(s) => Score::from_str(s).map_err(|_| format!("invalid {} '{}'", field, s)),
    }
}
