use std::collections::HashMap;

use common::fold_name;

use crate::store::EntityKind;

/// Folded name to id, per entity kind, for the lifetime of one run. Only
/// successful resolutions are remembered; a miss is looked up again the
/// next time the name comes round.
#[derive(Debug, Default)]
pub struct EntityCache {
    artists: HashMap<String, u64>,
    albums: HashMap<String, u64>,
    tracks: HashMap<String, u64>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: EntityKind, name: &str) -> Option<u64> {
        self.map(kind).get(&fold_name(name)).copied()
    }

    /// Keeps the first id seen for a folded name.
    pub fn remember(&mut self, kind: EntityKind, name: &str, id: u64) -> u64 {
        *self.map_mut(kind).entry(fold_name(name)).or_insert(id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self, kind: EntityKind) -> usize {
        self.map(kind).len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.artists.is_empty() && self.albums.is_empty() && self.tracks.is_empty()
    }

    fn map(&self, kind: EntityKind) -> &HashMap<String, u64> {
        match kind {
            EntityKind::Artist => &self.artists,
            EntityKind::Album => &self.albums,
            EntityKind::Track => &self.tracks,
        }
    }

    fn map_mut(&mut self, kind: EntityKind) -> &mut HashMap<String, u64> {
        match kind {
            EntityKind::Artist => &mut self.artists,
            EntityKind::Album => &mut self.albums,
            EntityKind::Track => &mut self.tracks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        let mut cache = EntityCache::new();
        cache.remember(EntityKind::Artist, "Daft Punk", 3);

        assert_eq!(cache.get(EntityKind::Artist, "daft punk"), Some(3));
        assert_eq!(cache.get(EntityKind::Artist, "DAFT PUNK"), Some(3));
        assert_eq!(cache.get(EntityKind::Artist, "Daft"), None);
    }

    #[test]
    fn kinds_are_independent() {
        let mut cache = EntityCache::new();
        cache.remember(EntityKind::Album, "Homework", 1);

        assert_eq!(cache.get(EntityKind::Album, "homework"), Some(1));
        assert_eq!(cache.get(EntityKind::Artist, "homework"), None);
        assert_eq!(cache.get(EntityKind::Track, "homework"), None);
        assert_eq!(cache.len(EntityKind::Album), 1);
        assert_eq!(cache.len(EntityKind::Track), 0);
    }

    #[test]
    fn first_id_wins() {
        let mut cache = EntityCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.remember(EntityKind::Track, "Intro", 4), 4);
        assert_eq!(cache.remember(EntityKind::Track, "INTRO", 9), 4);
        assert_eq!(cache.get(EntityKind::Track, "intro"), Some(4));
        assert!(!cache.is_empty());
    }
}
