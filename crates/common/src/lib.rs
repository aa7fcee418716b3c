use serde::{Deserialize, Serialize};
use time::{Date, Month};

pub const DEFAULT_RELEASE_YEAR: &str = "1900";
pub const DEFAULT_TRACK_NUMBER: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: u64,
    pub artist_id: u64,
    pub name: String,
    pub release_date: Date,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    pub album_id: u64,
    pub name: String,
    pub track_number: u32,
    pub filepath: String,
}

/// One scanned file, normalized. Produced by the scanner and consumed once
/// by the reconciler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRecord {
    pub title: String,
    pub track_number: u32,
    pub filepath: String,
    pub album: Option<AlbumDraft>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlbumDraft {
    pub name: String,
    pub artist: Option<String>,
    pub release_year: String,
}

/// Matching key for artist, album and track names. Every lookup and cache
/// entry goes through here; stored rows keep their original casing.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Year from a free-form date tag. The first run of four or more digits
/// wins ("12/05/2001", "May 12, 2001", "20010512"); without one, the first
/// shorter run is used.
pub fn parse_year(text: &str) -> Option<i32> {
    let runs: Vec<&str> = text
        .split(|ch: char| !ch.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect();
    let run = runs
        .iter()
        .find(|run| run.len() >= 4)
        .or_else(|| runs.first())?;
    run[..run.len().min(4)].parse().ok()
}

pub fn release_date_for_year(year: i32) -> Option<Date> {
    Date::from_calendar_date(year, Month::January, 1).ok()
}

pub fn is_year_boundary(date: Date) -> bool {
    date.month() == Month::January && date.day() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_name_ignores_case_only() {
        assert_eq!(fold_name("Daft Punk"), fold_name("daft punk"));
        assert_eq!(fold_name("DAFT PUNK"), "daft punk");
        assert_ne!(fold_name("Daft Punk "), fold_name("Daft Punk"));
    }

    #[test]
    fn parse_year_takes_leading_digits() {
        assert_eq!(parse_year("2001"), Some(2001));
        assert_eq!(parse_year("2001-05-12"), Some(2001));
        assert_eq!(parse_year("c. 1999"), Some(1999));
        assert_eq!(parse_year("12/05/2001"), Some(2001));
        assert_eq!(parse_year("May 12, 2001"), Some(2001));
        assert_eq!(parse_year("05-2001"), Some(2001));
        assert_eq!(parse_year("20010512"), Some(2001));
        assert_eq!(parse_year("'99"), Some(99));
        assert_eq!(parse_year("unknown"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn release_date_is_first_of_january() {
        let date = release_date_for_year(2001).unwrap();
        assert_eq!(date.year(), 2001);
        assert!(is_year_boundary(date));

        let mid_year = Date::from_calendar_date(2001, Month::May, 12).unwrap();
        assert!(!is_year_boundary(mid_year));
    }

    #[test]
    fn default_year_parses() {
        let year = parse_year(DEFAULT_RELEASE_YEAR).unwrap();
        assert_eq!(release_date_for_year(year).unwrap().year(), 1900);
    }
}
