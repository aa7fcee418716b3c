use std::fs;
use std::path::{Path, PathBuf};

use common::{AlbumDraft, TrackRecord, DEFAULT_RELEASE_YEAR, DEFAULT_TRACK_NUMBER};
use metadata::{MetadataError, TagBag, TagField};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Source of tag bags. The scanner only needs this one call, so tests can
/// stand in for lofty.
pub trait TagReader {
    fn read_tags(&self, path: &Path) -> Result<TagBag, MetadataError>;
}

impl<R: TagReader + ?Sized> TagReader for &R {
    fn read_tags(&self, path: &Path) -> Result<TagBag, MetadataError> {
        (**self).read_tags(path)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<TagBag, MetadataError> {
        metadata::read_tags(path)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanWarning {
    MissingArtist,
    MissingAlbum,
    MissingDate,
}

impl std::fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanWarning::MissingArtist => f.write_str("no artist tag"),
            ScanWarning::MissingAlbum => f.write_str("no album tag, track will not be stored"),
            ScanWarning::MissingDate => {
                write!(f, "no date tag, release year defaults to {}", DEFAULT_RELEASE_YEAR)
            }
        }
    }
}

/// Why a directory entry produced no record.
#[derive(Debug)]
pub enum ScanSkip {
    Unreadable(MetadataError),
    Path(std::io::Error),
    TrackNumber(String),
    NonUtf8Path(PathBuf),
}

impl std::fmt::Display for ScanSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanSkip::Unreadable(err) => write!(f, "unreadable: {}", err),
            ScanSkip::Path(err) => write!(f, "cannot resolve path: {}", err),
            ScanSkip::TrackNumber(value) => write!(f, "bad track number {:?}", value),
            ScanSkip::NonUtf8Path(path) => write!(f, "path is not valid UTF-8: {:?}", path),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedFile {
    pub record: TrackRecord,
    pub warnings: Vec<ScanWarning>,
}

/// Lazy walk over a music root. Every call to [`scan`] starts a fresh walk
/// and re-reads tags; the iterator itself cannot be rewound.
pub struct Scan<R> {
    entries: walkdir::IntoIter,
    reader: R,
}

pub fn scan<R: TagReader>(root: &Path, reader: R) -> Scan<R> {
    let entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    Scan { entries, reader }
}

impl<R: TagReader> Iterator for Scan<R> {
    type Item = TrackRecord;

    fn next(&mut self) -> Option<TrackRecord> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping entry: {}", err);
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            match scan_file(&self.reader, entry.path()) {
                Ok(scanned) => {
                    if !scanned.warnings.is_empty() {
                        let joined: Vec<String> =
                            scanned.warnings.iter().map(|w| w.to_string()).collect();
                        warn!("{}: {}", scanned.record.filepath, joined.join("; "));
                    }
                    return Some(scanned.record);
                }
                Err(skip) => {
                    debug!("Skipping {:?}: {}", entry.path(), skip);
                }
            }
        }
    }
}

pub(crate) fn scan_file<R: TagReader>(reader: &R, path: &Path) -> Result<ScannedFile, ScanSkip> {
    let tags = reader.read_tags(path).map_err(ScanSkip::Unreadable)?;
    let filepath = fs::canonicalize(path).map_err(ScanSkip::Path)?;
    build_record(&tags, &filepath)
}

/// Turns a tag bag into a record. Missing artist, album or date only add
/// warnings; an unparseable track number or a non-UTF-8 path rejects the
/// file.
pub(crate) fn build_record(tags: &TagBag, filepath: &Path) -> Result<ScannedFile, ScanSkip> {
    let path_text = filepath
        .to_str()
        .ok_or_else(|| ScanSkip::NonUtf8Path(filepath.to_path_buf()))?;
    let mut warnings = Vec::new();

    let artist = tags
        .first(TagField::AlbumArtist)
        .or_else(|| tags.first(TagField::Artist))
        .map(|name| name.to_string());
    if artist.is_none() {
        warnings.push(ScanWarning::MissingArtist);
    }

    let album = match tags.first(TagField::Album) {
        Some(name) => {
            let release_year = match tags.first(TagField::Date) {
                Some(date) => date.to_string(),
                None => {
                    warnings.push(ScanWarning::MissingDate);
                    DEFAULT_RELEASE_YEAR.to_string()
                }
            };
            Some(AlbumDraft {
                name: name.to_string(),
                artist,
                release_year,
            })
        }
        None => {
            warnings.push(ScanWarning::MissingAlbum);
            None
        }
    };

    let title = match tags.first(TagField::Title) {
        Some(title) => title.to_string(),
        None => file_name(filepath, path_text),
    };

    let track_number = match tags.first(TagField::TrackNumber) {
        Some(text) => parse_track_number(text)
            .ok_or_else(|| ScanSkip::TrackNumber(text.to_string()))?,
        None => DEFAULT_TRACK_NUMBER,
    };

    Ok(ScannedFile {
        record: TrackRecord {
            title,
            track_number,
            filepath: path_text.to_string(),
            album,
        },
        warnings,
    })
}

// "7" and "7/12" both mean track 7; zero is not a track number.
fn parse_track_number(text: &str) -> Option<u32> {
    let head = text.split('/').next().unwrap_or(text).trim();
    match head.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(number) => Some(number),
    }
}

fn file_name(path: &Path, path_text: &str) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path_text)
        .to_string()
}
