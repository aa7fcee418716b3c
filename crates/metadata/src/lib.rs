use std::collections::BTreeMap;
use std::path::Path;

use lofty::error::LoftyError;
use lofty::prelude::{ItemKey, TaggedFileExt};

/// The tag fields the catalog cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagField {
    Artist,
    AlbumArtist,
    Album,
    Date,
    Title,
    TrackNumber,
}

impl TagField {
    pub const ALL: [TagField; 6] = [
        TagField::Artist,
        TagField::AlbumArtist,
        TagField::Album,
        TagField::Date,
        TagField::Title,
        TagField::TrackNumber,
    ];
}

/// Read-only view of the fields a file exposes. Blank values are dropped on
/// the way in, so a field is either absent or has at least one non-empty
/// value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagBag {
    fields: BTreeMap<TagField, Vec<String>>,
}

impl TagBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: TagField, value: impl Into<String>) -> Self {
        self.push(field, value.into());
        self
    }

    pub fn first(&self, field: TagField) -> Option<&str> {
        self.fields
            .get(&field)
            .and_then(|values| values.first())
            .map(|value| value.as_str())
    }

    fn contains(&self, field: TagField) -> bool {
        self.fields.contains_key(&field)
    }

    fn push(&mut self, field: TagField, value: String) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }
        let value = if trimmed.len() == value.len() {
            value
        } else {
            trimmed.to_string()
        };
        self.fields.entry(field).or_default().push(value);
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Reads the primary tag of an audio file. A recognised file without any
/// tag yields an empty bag; anything lofty cannot parse is an error.
pub fn read_tags(path: &Path) -> Result<TagBag, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;
    let mut bag = TagBag::new();

    let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(tag) => tag,
        None => return Ok(bag),
    };

    for field in TagField::ALL {
        for key in item_keys(field) {
            for value in tag.get_strings(&key) {
                bag.push(field, value.to_string());
            }
            if bag.contains(field) {
                break;
            }
        }
    }

    Ok(bag)
}

// Fallback keys are only consulted when the earlier ones produced nothing.
fn item_keys(field: TagField) -> Vec<ItemKey> {
    match field {
        TagField::Artist => vec![ItemKey::TrackArtist],
        TagField::AlbumArtist => vec![ItemKey::AlbumArtist],
        TagField::Album => vec![ItemKey::AlbumTitle],
        TagField::Date => vec![ItemKey::RecordingDate, ItemKey::Year],
        TagField::Title => vec![ItemKey::TrackTitle],
        TagField::TrackNumber => vec![ItemKey::TrackNumber],
    }
}
