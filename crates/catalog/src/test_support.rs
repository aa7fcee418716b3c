use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use metadata::{MetadataError, TagBag, TagField};
use tempfile::TempDir;

use crate::{Catalog, TagReader};

/// Tag bags keyed by file name. Files are created empty on disk so the
/// walker sees them; anything not registered reads as a non-audio file.
#[derive(Default)]
pub(crate) struct FakeTags {
    bags: HashMap<String, TagBag>,
}

impl FakeTags {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn file(mut self, root: &Path, relpath: &str, tags: TagBag) -> Self {
        let path = touch(root, relpath);
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.bags.insert(name, tags);
        self
    }

    pub(crate) fn junk(self, root: &Path, relpath: &str) -> Self {
        touch(root, relpath);
        self
    }
}

impl TagReader for FakeTags {
    fn read_tags(&self, path: &Path) -> Result<TagBag, MetadataError> {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.bags.get(&name).cloned().ok_or_else(|| {
            MetadataError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "not an audio file",
            ))
        })
    }
}

fn touch(root: &Path, relpath: &str) -> std::path::PathBuf {
    let path = root.join(relpath);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, b"").unwrap();
    path
}

pub(crate) fn album_tags(
    artist: &str,
    album: &str,
    date: Option<&str>,
    title: &str,
    tracknumber: &str,
) -> TagBag {
    let tags = TagBag::new()
        .with(TagField::Artist, artist)
        .with(TagField::Album, album)
        .with(TagField::Title, title)
        .with(TagField::TrackNumber, tracknumber);
    match date {
        Some(date) => tags.with(TagField::Date, date),
        None => tags,
    }
}

pub(crate) fn temp_catalog() -> (TempDir, Catalog) {
    let dir = TempDir::new().unwrap();
    let catalog = Catalog::open(&dir.path().join("catalog.redb")).unwrap();
    catalog.init_tables().unwrap();
    (dir, catalog)
}
