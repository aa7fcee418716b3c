mod cache;
mod reconciler;
mod scanner;
mod store;

#[cfg(test)]
mod test_support;

use std::fs;
use std::path::{Path, PathBuf};

use common::{Album, Artist, Track};
use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition,
    TableError, TransactionError,
};
use serde::Deserialize;
use tracing::{info, warn};

pub use cache::EntityCache;
pub use reconciler::{EntityTally, IngestReport, Reconciler, RecordOutcome, Resolution};
pub use scanner::{scan, LoftyTagReader, Scan, ScanSkip, ScanWarning, ScannedFile, TagReader};
pub use store::{CatalogSession, CatalogStore, EntityKind, NewRow};

use store::{decode_value, ALBUMS_TABLE, ARTISTS_TABLE, SEQUENCES_TABLE, TRACKS_TABLE};

/// Handle on the catalog database file. Writes go through a
/// [`CatalogSession`] obtained from [`Catalog::begin`].
pub struct Catalog {
    path: PathBuf,
    db: Database,
}

impl Catalog {
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let db = open_or_create_db(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            db,
        })
    }

    /// Creates any missing table. Safe to call on every start.
    pub fn init_tables(&self) -> Result<(), CatalogError> {
        let write_txn = self.db.begin_write()?;
        for kind in EntityKind::ALL {
            let _ = write_txn.open_table(kind.rows_table())?;
            let _ = write_txn.open_table(kind.names_table())?;
        }
        let _ = write_txn.open_table(SEQUENCES_TABLE)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn begin(&self) -> Result<CatalogSession, CatalogError> {
        let write_txn = self.db.begin_write()?;
        Ok(CatalogSession::new(write_txn))
    }

    pub fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(SEQUENCES_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(CatalogStats::default()),
            Err(err) => return Err(err.into()),
        };
        let mut stats = CatalogStats::default();
        for kind in EntityKind::ALL {
            let count = match table.get(kind.sequence_key())? {
                Some(value) => value.value() as usize,
                None => 0,
            };
            match kind {
                EntityKind::Artist => stats.artists = count,
                EntityKind::Album => stats.albums = count,
                EntityKind::Track => stats.tracks = count,
            }
        }
        Ok(stats)
    }

    pub fn list_artists(&self) -> Result<Vec<Artist>, CatalogError> {
        self.list_rows(ARTISTS_TABLE)
    }

    pub fn list_albums(&self) -> Result<Vec<Album>, CatalogError> {
        self.list_rows(ALBUMS_TABLE)
    }

    pub fn list_tracks(&self) -> Result<Vec<Track>, CatalogError> {
        self.list_rows(TRACKS_TABLE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn list_rows<T: for<'de> Deserialize<'de>>(
        &self,
        definition: TableDefinition<'static, u64, &'static [u8]>,
    ) -> Result<Vec<T>, CatalogError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(definition) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut items = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            items.push(decode_value(entry.1.value())?);
        }
        Ok(items)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
}

/// Scans `root` and reconciles every record into the catalog inside one
/// session. The session is committed whatever the per-record outcomes were;
/// only store-level failures to begin or commit are returned.
pub fn ingest<R: TagReader>(
    catalog: &Catalog,
    root: &Path,
    reader: R,
) -> Result<IngestReport, CatalogError> {
    if !root.is_dir() {
        warn!("Music root {:?} is not a readable directory", root);
    }
    info!("Scanning {:?}", root);

    let mut session = catalog.begin()?;
    let report = {
        let mut reconciler = Reconciler::new(&mut session);
        reconciler.run(scan(root, reader));
        reconciler.into_report()
    };
    session.commit()?;

    info!(
        "Scan finished: {} records; artists {}, albums {}, tracks {}",
        report.records, report.artists, report.albums, report.tracks
    );
    Ok(report)
}

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    EmptyName(EntityKind),
    MissingArtist(u64),
    MissingAlbum(u64),
    InvalidReleaseDate(time::Date),
    InvalidTrackNumber(u32),
    EmptyFilepath,
    InvalidYear(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(err) => write!(f, "io error: {}", err),
            CatalogError::Redb(err) => write!(f, "db error: {}", err),
            CatalogError::Bincode(err) => write!(f, "bincode error: {}", err),
            CatalogError::EmptyName(kind) => write!(f, "{} name must not be empty", kind),
            CatalogError::MissingArtist(id) => write!(f, "artist {} does not exist", id),
            CatalogError::MissingAlbum(id) => write!(f, "album {} does not exist", id),
            CatalogError::InvalidReleaseDate(date) => {
                write!(f, "release date {} is not the first of January", date)
            }
            CatalogError::InvalidTrackNumber(number) => {
                write!(f, "track number {} is out of range", number)
            }
            CatalogError::EmptyFilepath => write!(f, "track filepath must not be empty"),
            CatalogError::InvalidYear(value) => write!(f, "no year in date tag {:?}", value),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err)
    }
}

impl From<redb::Error> for CatalogError {
    fn from(err: redb::Error) -> Self {
        CatalogError::Redb(err)
    }
}

impl From<DatabaseError> for CatalogError {
    fn from(err: DatabaseError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<TableError> for CatalogError {
    fn from(err: TableError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<TransactionError> for CatalogError {
    fn from(err: TransactionError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<StorageError> for CatalogError {
    fn from(err: StorageError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<CommitError> for CatalogError {
    fn from(err: CommitError) -> Self {
        CatalogError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for CatalogError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        CatalogError::Bincode(err)
    }
}

fn open_or_create_db(path: &Path) -> Result<Database, CatalogError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}
