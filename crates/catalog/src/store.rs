use common::{fold_name, is_year_boundary, Album, Artist, Track};
use redb::{ReadableTable, TableDefinition, WriteTransaction};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::CatalogError;

const KEY_SEP: char = '\x1f';

pub(crate) const ARTISTS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("artists");
pub(crate) const ARTISTS_BY_NAME_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("artists_by_name");
pub(crate) const ALBUMS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("albums");
pub(crate) const ALBUMS_BY_NAME_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("albums_by_name");
pub(crate) const TRACKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("tracks");
pub(crate) const TRACKS_BY_NAME_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("tracks_by_name");
pub(crate) const SEQUENCES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequences");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artist,
    Album,
    Track,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Artist, EntityKind::Album, EntityKind::Track];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Track => "track",
        }
    }

    pub(crate) fn rows_table(self) -> TableDefinition<'static, u64, &'static [u8]> {
        match self {
            EntityKind::Artist => ARTISTS_TABLE,
            EntityKind::Album => ALBUMS_TABLE,
            EntityKind::Track => TRACKS_TABLE,
        }
    }

    pub(crate) fn names_table(self) -> TableDefinition<'static, &'static str, u64> {
        match self {
            EntityKind::Artist => ARTISTS_BY_NAME_TABLE,
            EntityKind::Album => ALBUMS_BY_NAME_TABLE,
            EntityKind::Track => TRACKS_BY_NAME_TABLE,
        }
    }

    pub(crate) fn sequence_key(self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Track => "tracks",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field values for a row about to be inserted; the store assigns the id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NewRow {
    Artist {
        name: String,
    },
    Album {
        artist_id: u64,
        name: String,
        release_date: Date,
    },
    Track {
        album_id: u64,
        name: String,
        track_number: u32,
        filepath: String,
    },
}

impl NewRow {
    pub fn kind(&self) -> EntityKind {
        match self {
            NewRow::Artist { .. } => EntityKind::Artist,
            NewRow::Album { .. } => EntityKind::Album,
            NewRow::Track { .. } => EntityKind::Track,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NewRow::Artist { name } | NewRow::Album { name, .. } | NewRow::Track { name, .. } => {
                name.as_str()
            }
        }
    }
}

/// The two operations the reconciler needs from storage.
pub trait CatalogStore {
    /// Case-insensitive exact match; the lowest id wins when several rows
    /// share a folded name.
    fn find_id_by_name(&self, kind: EntityKind, name: &str) -> Result<Option<u64>, CatalogError>;

    /// Inserts a row and returns its generated id. Parent rows must exist.
    fn insert(&mut self, row: NewRow) -> Result<u64, CatalogError>;
}

/// One write transaction over the catalog. Nothing is visible to readers
/// until [`CatalogSession::commit`]; dropping the session discards it.
pub struct CatalogSession {
    txn: WriteTransaction,
}

impl CatalogSession {
    pub(crate) fn new(txn: WriteTransaction) -> Self {
        Self { txn }
    }

    pub fn commit(self) -> Result<(), CatalogError> {
        self.txn.commit()?;
        Ok(())
    }

    fn contains(&self, kind: EntityKind, id: u64) -> Result<bool, CatalogError> {
        let table = self.txn.open_table(kind.rows_table())?;
        let found = table.get(id)?.is_some();
        Ok(found)
    }

    fn peek_id(&self, kind: EntityKind) -> Result<u64, CatalogError> {
        let table = self.txn.open_table(SEQUENCES_TABLE)?;
        let last = table
            .get(kind.sequence_key())?
            .map(|value| value.value())
            .unwrap_or(0);
        Ok(last + 1)
    }

    // Bumped last; a failed insert leaves the id unclaimed.
    fn claim_id(&self, kind: EntityKind, id: u64) -> Result<(), CatalogError> {
        let mut table = self.txn.open_table(SEQUENCES_TABLE)?;
        table.insert(kind.sequence_key(), id)?;
        Ok(())
    }

    fn check(&self, row: &NewRow) -> Result<(), CatalogError> {
        if row.name().trim().is_empty() {
            return Err(CatalogError::EmptyName(row.kind()));
        }
        match row {
            NewRow::Artist { .. } => {}
            NewRow::Album {
                artist_id,
                release_date,
                ..
            } => {
                if !is_year_boundary(*release_date) {
                    return Err(CatalogError::InvalidReleaseDate(*release_date));
                }
                if !self.contains(EntityKind::Artist, *artist_id)? {
                    return Err(CatalogError::MissingArtist(*artist_id));
                }
            }
            NewRow::Track {
                album_id,
                track_number,
                filepath,
                ..
            } => {
                if *track_number == 0 {
                    return Err(CatalogError::InvalidTrackNumber(*track_number));
                }
                if filepath.trim().is_empty() {
                    return Err(CatalogError::EmptyFilepath);
                }
                if !self.contains(EntityKind::Album, *album_id)? {
                    return Err(CatalogError::MissingAlbum(*album_id));
                }
            }
        }
        Ok(())
    }
}

impl CatalogStore for CatalogSession {
    fn find_id_by_name(&self, kind: EntityKind, name: &str) -> Result<Option<u64>, CatalogError> {
        let table = self.txn.open_table(kind.names_table())?;
        let prefix = prefix_key(&fold_name(name));
        let mut end = prefix.clone();
        end.push('\u{10ffff}');

        // Names may themselves contain the separator, so only keys whose
        // remainder is a bare id belong to this exact name.
        for entry in table.range(prefix.as_str()..end.as_str())? {
            let (key, id) = entry?;
            if is_id_suffix(&key.value()[prefix.len()..]) {
                return Ok(Some(id.value()));
            }
        }
        Ok(None)
    }

    fn insert(&mut self, row: NewRow) -> Result<u64, CatalogError> {
        self.check(&row)?;
        let kind = row.kind();
        let id = self.peek_id(kind)?;

        let (name, bytes) = match row {
            NewRow::Artist { name } => {
                let artist = Artist {
                    id,
                    name,
                    picture: None,
                };
                let bytes = encode_value(&artist)?;
                (artist.name, bytes)
            }
            NewRow::Album {
                artist_id,
                name,
                release_date,
            } => {
                let album = Album {
                    id,
                    artist_id,
                    name,
                    release_date,
                    picture: None,
                };
                let bytes = encode_value(&album)?;
                (album.name, bytes)
            }
            NewRow::Track {
                album_id,
                name,
                track_number,
                filepath,
            } => {
                let track = Track {
                    id,
                    album_id,
                    name,
                    track_number,
                    filepath,
                };
                let bytes = encode_value(&track)?;
                (track.name, bytes)
            }
        };

        {
            let mut rows = self.txn.open_table(kind.rows_table())?;
            rows.insert(id, bytes.as_slice())?;
        }
        {
            let mut names = self.txn.open_table(kind.names_table())?;
            let key = name_key(&name, id);
            names.insert(key.as_str(), id)?;
        }
        self.claim_id(kind, id)?;

        Ok(id)
    }
}

pub(crate) fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, CatalogError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, CatalogError> {
    Ok(bincode::deserialize(bytes)?)
}

const ID_WIDTH: usize = 20;

// Zero-padded ids keep the by-name index in ascending id order per name.
fn name_key(name: &str, id: u64) -> String {
    let mut out = prefix_key(&fold_name(name));
    out.push_str(&format!("{:0width$}", id, width = ID_WIDTH));
    out
}

fn is_id_suffix(rest: &str) -> bool {
    rest.len() == ID_WIDTH && rest.bytes().all(|b| b.is_ascii_digit())
}

fn prefix_key(prefix: &str) -> String {
    let mut out = String::new();
    out.push_str(prefix);
    out.push(KEY_SEP);
    out
}

#[cfg(test)]
mod tests {
    use time::Month;

    use super::*;
    use crate::test_support::temp_catalog;

    fn jan_first(year: i32) -> Date {
        Date::from_calendar_date(year, Month::January, 1).unwrap()
    }

    fn artist(name: &str) -> NewRow {
        NewRow::Artist {
            name: name.to_string(),
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        assert_eq!(session.insert(artist("A")).unwrap(), 1);
        assert_eq!(session.insert(artist("B")).unwrap(), 2);
        session.commit().unwrap();

        let mut session = catalog.begin().unwrap();
        assert_eq!(session.insert(artist("C")).unwrap(), 3);
        session.commit().unwrap();
        assert_eq!(catalog.stats().unwrap().artists, 3);
    }

    #[test]
    fn lookup_ignores_case_and_prefers_lowest_id() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        let first = session.insert(artist("Daft Punk")).unwrap();
        let second = session.insert(artist("DAFT PUNK")).unwrap();
        let other = session.insert(artist("Daft Punk Tribute")).unwrap();
        assert!(first < second);

        assert_eq!(
            session.find_id_by_name(EntityKind::Artist, "daft punk").unwrap(),
            Some(first)
        );
        assert_eq!(
            session
                .find_id_by_name(EntityKind::Artist, "daft punk tribute")
                .unwrap(),
            Some(other)
        );
        assert_eq!(session.find_id_by_name(EntityKind::Artist, "daft").unwrap(), None);
        assert_eq!(session.find_id_by_name(EntityKind::Album, "daft punk").unwrap(), None);
    }

    #[test]
    fn album_requires_existing_artist() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        let err = session
            .insert(NewRow::Album {
                artist_id: 42,
                name: "B".to_string(),
                release_date: jan_first(2001),
            })
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingArtist(42)));
        assert_eq!(session.find_id_by_name(EntityKind::Album, "B").unwrap(), None);
    }

    #[test]
    fn album_release_date_must_be_year_boundary() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        let artist_id = session.insert(artist("A")).unwrap();
        let mid_year = Date::from_calendar_date(2001, Month::May, 12).unwrap();

        let err = session
            .insert(NewRow::Album {
                artist_id,
                name: "B".to_string(),
                release_date: mid_year,
            })
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidReleaseDate(_)));

        let album_id = session
            .insert(NewRow::Album {
                artist_id,
                name: "B".to_string(),
                release_date: jan_first(2001),
            })
            .unwrap();
        assert_eq!(album_id, 1);
    }

    #[test]
    fn track_requires_existing_album() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        let err = session
            .insert(NewRow::Track {
                album_id: 7,
                name: "T1".to_string(),
                track_number: 1,
                filepath: "/music/t1.mp3".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingAlbum(7)));
    }

    #[test]
    fn rejects_blank_fields() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        assert!(matches!(
            session.insert(artist("  ")).unwrap_err(),
            CatalogError::EmptyName(EntityKind::Artist)
        ));

        let artist_id = session.insert(artist("A")).unwrap();
        let album_id = session
            .insert(NewRow::Album {
                artist_id,
                name: "B".to_string(),
                release_date: jan_first(1900),
            })
            .unwrap();
        let track = |track_number: u32, filepath: &str| NewRow::Track {
            album_id,
            name: "T".to_string(),
            track_number,
            filepath: filepath.to_string(),
        };
        assert!(matches!(
            session.insert(track(0, "/music/t.mp3")).unwrap_err(),
            CatalogError::InvalidTrackNumber(0)
        ));
        assert!(matches!(
            session.insert(track(1, "")).unwrap_err(),
            CatalogError::EmptyFilepath
        ));
        // rejected rows must not consume ids
        assert_eq!(session.peek_id(EntityKind::Track).unwrap(), 1);
    }

    #[test]
    fn separator_in_name_does_not_match_shorter_name() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        let joined = session.insert(artist("AC\x1fDC")).unwrap();

        assert_eq!(session.find_id_by_name(EntityKind::Artist, "AC").unwrap(), None);
        let plain = session.insert(artist("AC")).unwrap();
        assert_ne!(plain, joined);
        assert_eq!(
            session.find_id_by_name(EntityKind::Artist, "ac").unwrap(),
            Some(plain)
        );
        assert_eq!(
            session.find_id_by_name(EntityKind::Artist, "ac\x1fdc").unwrap(),
            Some(joined)
        );
    }

    #[test]
    fn stats_match_stored_rows_after_rejections() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        let artist_id = session.insert(artist("A")).unwrap();
        session.insert(artist("")).unwrap_err();
        session
            .insert(NewRow::Album {
                artist_id: 99,
                name: "B".to_string(),
                release_date: jan_first(2001),
            })
            .unwrap_err();
        let album_id = session
            .insert(NewRow::Album {
                artist_id,
                name: "B".to_string(),
                release_date: jan_first(2001),
            })
            .unwrap();
        assert_eq!(album_id, 1);
        session.commit().unwrap();

        let stats = catalog.stats().unwrap();
        assert_eq!(stats.artists, catalog.list_artists().unwrap().len());
        assert_eq!(stats.albums, catalog.list_albums().unwrap().len());
        assert_eq!(stats.tracks, 0);
    }

    #[test]
    fn dropped_session_writes_nothing() {
        let (_dir, catalog) = temp_catalog();
        {
            let mut session = catalog.begin().unwrap();
            session.insert(artist("A")).unwrap();
        }
        assert!(catalog.list_artists().unwrap().is_empty());
        assert_eq!(catalog.stats().unwrap().artists, 0);
    }

    #[test]
    fn committed_rows_keep_original_casing() {
        let (_dir, catalog) = temp_catalog();
        let mut session = catalog.begin().unwrap();
        let artist_id = session.insert(artist("Daft Punk")).unwrap();
        session
            .insert(NewRow::Album {
                artist_id,
                name: "Discovery".to_string(),
                release_date: jan_first(2001),
            })
            .unwrap();
        session.commit().unwrap();

        let artists = catalog.list_artists().unwrap();
        assert_eq!(
            artists,
            vec![Artist {
                id: 1,
                name: "Daft Punk".to_string(),
                picture: None,
            }]
        );
        let albums = catalog.list_albums().unwrap();
        assert_eq!(albums[0].artist_id, 1);
        assert_eq!(albums[0].release_date, jan_first(2001));
    }

    #[test]
    fn name_keys_sort_by_id() {
        let low = name_key("A", 9);
        let high = name_key("a", 10);
        assert!(low < high);
        assert!(high.starts_with("a\x1f"));
        assert!(high.ends_with("00000000000000000010"));
    }
}
