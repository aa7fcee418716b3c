use common::{parse_year, release_date_for_year, AlbumDraft, TrackRecord};
use tracing::{debug, warn};

use crate::cache::EntityCache;
use crate::store::{CatalogStore, EntityKind, NewRow};
use crate::CatalogError;

/// Result of one resolution step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(u64),
    /// Preconditions were not met (no name, no parent id); nothing written.
    Skipped,
    /// The store returned an error; logged and treated as unresolved.
    Failed,
}

impl Resolution {
    pub fn id(self) -> Option<u64> {
        match self {
            Resolution::Resolved(id) => Some(id),
            Resolution::Skipped | Resolution::Failed => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    pub artist: Resolution,
    pub album: Resolution,
    pub track: Resolution,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityTally {
    pub created: usize,
    pub reused: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for EntityTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created / {} reused / {} skipped / {} failed",
            self.created, self.reused, self.skipped, self.failed
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub records: usize,
    pub artists: EntityTally,
    pub albums: EntityTally,
    pub tracks: EntityTally,
}

impl IngestReport {
    fn tally_mut(&mut self, kind: EntityKind) -> &mut EntityTally {
        match kind {
            EntityKind::Artist => &mut self.artists,
            EntityKind::Album => &mut self.albums,
            EntityKind::Track => &mut self.tracks,
        }
    }
}

/// Maps track records onto artist, album and track rows, in that order,
/// reusing whatever already exists under the same folded name. A child row
/// is only written once its parent id is known.
pub struct Reconciler<'s, S: CatalogStore> {
    store: &'s mut S,
    cache: EntityCache,
    report: IngestReport,
}

impl<'s, S: CatalogStore> Reconciler<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            cache: EntityCache::new(),
            report: IngestReport::default(),
        }
    }

    pub fn run<I: IntoIterator<Item = TrackRecord>>(&mut self, records: I) {
        for record in records {
            self.reconcile(&record);
        }
    }

    pub fn reconcile(&mut self, record: &TrackRecord) -> RecordOutcome {
        self.report.records += 1;
        let album = record.album.as_ref();

        let artist = self.resolve_artist(album);
        let album_step = self.resolve_album(album, artist);
        let track = self.resolve_track(record);

        RecordOutcome {
            artist,
            album: album_step,
            track,
        }
    }

    #[cfg(test)]
    fn cache(&self) -> &EntityCache {
        &self.cache
    }

    #[cfg(test)]
    fn report(&self) -> &IngestReport {
        &self.report
    }

    pub fn into_report(self) -> IngestReport {
        self.report
    }

    fn resolve_artist(&mut self, album: Option<&AlbumDraft>) -> Resolution {
        let name = match album.and_then(|album| album.artist.as_deref()) {
            Some(name) => name,
            None => return self.skip(EntityKind::Artist),
        };
        self.find_or_create(EntityKind::Artist, name, |_| {
            Ok(Some(NewRow::Artist {
                name: name.to_string(),
            }))
        })
    }

    // An existing album is reused as is, whatever artist or year it carries.
    fn resolve_album(&mut self, album: Option<&AlbumDraft>, artist: Resolution) -> Resolution {
        let album = match album {
            Some(album) => album,
            None => return self.skip(EntityKind::Album),
        };
        self.find_or_create(EntityKind::Album, &album.name, |_| {
            let artist_id = match artist.id() {
                Some(id) => id,
                None => {
                    debug!("Album {:?} has no resolved artist; not stored", album.name);
                    return Ok(None);
                }
            };
            let release_date = parse_year(&album.release_year)
                .and_then(release_date_for_year)
                .ok_or_else(|| CatalogError::InvalidYear(album.release_year.clone()))?;
            Ok(Some(NewRow::Album {
                artist_id,
                name: album.name.clone(),
                release_date,
            }))
        })
    }

    // Titles are the track identity: a second file with a known title maps
    // onto the existing row and its own path is not recorded.
    fn resolve_track(&mut self, record: &TrackRecord) -> Resolution {
        let album = match record.album.as_ref() {
            Some(album) => album,
            None => return self.skip(EntityKind::Track),
        };
        self.find_or_create(EntityKind::Track, &record.title, |this| {
            let album_id = match this.find_existing(EntityKind::Album, &album.name)? {
                Some(id) => id,
                None => {
                    debug!(
                        "Track {:?} dropped: album {:?} unresolved",
                        record.title, album.name
                    );
                    return Ok(None);
                }
            };
            Ok(Some(NewRow::Track {
                album_id,
                name: record.title.clone(),
                track_number: record.track_number,
                filepath: record.filepath.clone(),
            }))
        })
    }

    fn find_or_create<F>(&mut self, kind: EntityKind, name: &str, build: F) -> Resolution
    where
        F: FnOnce(&mut Self) -> Result<Option<NewRow>, CatalogError>,
    {
        match self.try_find_or_create(kind, name, build) {
            Ok(Some((id, true))) => {
                self.report.tally_mut(kind).created += 1;
                Resolution::Resolved(id)
            }
            Ok(Some((id, false))) => {
                self.report.tally_mut(kind).reused += 1;
                Resolution::Resolved(id)
            }
            Ok(None) => {
                self.report.tally_mut(kind).skipped += 1;
                Resolution::Skipped
            }
            Err(err) => {
                warn!("Failed to resolve {} {:?}: {}", kind, name, err);
                self.report.tally_mut(kind).failed += 1;
                Resolution::Failed
            }
        }
    }

    fn try_find_or_create<F>(
        &mut self,
        kind: EntityKind,
        name: &str,
        build: F,
    ) -> Result<Option<(u64, bool)>, CatalogError>
    where
        F: FnOnce(&mut Self) -> Result<Option<NewRow>, CatalogError>,
    {
        if let Some(id) = self.find_existing(kind, name)? {
            return Ok(Some((id, false)));
        }
        let row = match build(self)? {
            Some(row) => row,
            None => return Ok(None),
        };
        let id = self.store.insert(row)?;
        self.cache.remember(kind, name, id);
        debug!("Created {} {:?} ({})", kind, name, id);
        Ok(Some((id, true)))
    }

    /// Cache first, then the store; store hits are cached.
    fn find_existing(&mut self, kind: EntityKind, name: &str) -> Result<Option<u64>, CatalogError> {
        if let Some(id) = self.cache.get(kind, name) {
            return Ok(Some(id));
        }
        let found = self.store.find_id_by_name(kind, name)?;
        if let Some(id) = found {
            self.cache.remember(kind, name, id);
        }
        Ok(found)
    }

    fn skip(&mut self, kind: EntityKind) -> Resolution {
        self.report.tally_mut(kind).skipped += 1;
        Resolution::Skipped
    }
}
