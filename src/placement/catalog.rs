// src/placement/catalog.rs
//! Data-driven footprint catalog + loader.

use bevy::asset::{io::Reader, AssetLoader, LoadContext};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::core::{Footprint, FootprintId, OccupantTags};

// ---------- Public plugin to register asset+loader ----------

pub struct CatalogAssetPlugin;

impl Plugin for CatalogAssetPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<Catalog>()
            .register_asset_loader(CatalogLoader);
    }
}

// ---------- Entry definition (data form) ----------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Unique human-readable name (used for lookup and in events).
    pub name: String,

    /// Space the object occupies once placed.
    pub footprint: Footprint,

    /// Tags the committed instance carries in the occupancy map.
    #[serde(default = "default_tags")]
    pub tags: OccupantTags,
}

fn default_tags() -> OccupantTags {
    OccupantTags::STRUCTURE
}

impl CatalogEntry {
    pub fn id(&self) -> FootprintId {
        FootprintId(self.name.clone())
    }
}

// ---------- Runtime catalog asset ----------

#[derive(Asset, TypePath, Clone, Debug, Default)]
pub struct Catalog {
    /// Ordered list; insertion order is the cycling order.
    entries: Vec<CatalogEntry>,
    /// Name → index for quick lookups.
    name_to_index: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogLoadError> {
        let mut name_to_index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if entry.footprint.volumes.iter().any(|v| v.half_extents.min_element() <= 0.0) {
                return Err(CatalogLoadError::EmptyVolume { name: entry.name.clone() });
            }
            if let Some(prev) = name_to_index.insert(entry.name.clone(), i) {
                return Err(CatalogLoadError::DuplicateName {
                    name: entry.name.clone(),
                    first: prev,
                    second: i,
                });
            }
        }
        Ok(Self { entries, name_to_index })
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, index: usize) -> Option<&CatalogEntry> { self.entries.get(index) }

    pub fn index_of(&self, name: &str) -> Option<usize> { self.name_to_index.get(name).copied() }

    pub fn entries(&self) -> &[CatalogEntry] { &self.entries }

    /// Step `direction` entries from `index`, wrapping at both ends.
    pub fn wrap(&self, index: usize, direction: i32) -> usize {
        let len = self.entries.len() as i64;
        if len == 0 {
            return 0;
        }
        (index as i64 + direction as i64).rem_euclid(len) as usize
    }
}

// ---------- Asset loader for `.catalog.ron` ----------

#[derive(Default)]
pub struct CatalogLoader;

impl AssetLoader for CatalogLoader {
    type Asset = Catalog;
    type Settings = ();
    type Error = CatalogLoadError;

    fn extensions(&self) -> &[&str] {
        &["catalog.ron"]
    }

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        Catalog::from_ron_bytes(&bytes)
    }
}

impl Catalog {
    pub fn from_ron_bytes(bytes: &[u8]) -> Result<Self, CatalogLoadError> {
        let entries: Vec<CatalogEntry> =
            ron::de::from_bytes(bytes).map_err(|e| CatalogLoadError::Ron(e.to_string()))?;
        Self::from_entries(entries)
    }
}

// ---------- Loader errors ----------

#[derive(thiserror::Error, Debug)]
pub enum CatalogLoadError {
    #[error("I/O while reading catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
    #[error("Duplicate catalog name '{name}' (first idx {first}, second idx {second})")]
    DuplicateName { name: String, first: usize, second: usize },
    #[error("Catalog entry '{name}' has a volume with non-positive half extents")]
    EmptyVolume { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        (
            name: "wall",
            footprint: (volumes: [(half_extents: (2.0, 1.0, 0.25))]),
        ),
        (
            name: "tower",
            footprint: (volumes: [
                (offset: (0.0, 2.0, 0.0), half_extents: (1.0, 2.0, 1.0)),
            ]),
            tags: (8),
        ),
    ]"#;

    #[test]
    fn parses_entries_in_order() {
        let cat = Catalog::from_ron_bytes(CATALOG.as_bytes()).unwrap();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.index_of("tower"), Some(1));
        assert_eq!(cat.get(0).unwrap().tags, OccupantTags::STRUCTURE);
        assert_eq!(cat.get(1).unwrap().tags, OccupantTags::TOWER);
        assert_eq!(cat.get(1).unwrap().footprint.volumes[0].offset, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let src = r#"[
            (name: "a", footprint: (volumes: [])),
            (name: "a", footprint: (volumes: [])),
        ]"#;
        let err = Catalog::from_ron_bytes(src.as_bytes()).unwrap_err();
        assert!(matches!(err, CatalogLoadError::DuplicateName { first: 0, second: 1, .. }));
    }

    #[test]
    fn wrap_cycles_both_ways() {
        let src = r#"[
            (name: "a", footprint: (volumes: [])),
            (name: "b", footprint: (volumes: [])),
            (name: "c", footprint: (volumes: [])),
        ]"#;
        let cat = Catalog::from_ron_bytes(src.as_bytes()).unwrap();
        assert_eq!(cat.wrap(2, 1), 0);
        assert_eq!(cat.wrap(0, -1), 2);
        assert_eq!(cat.wrap(1, 7), 2);
    }
}
