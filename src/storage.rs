//! Storage module for saving and loading flashcard collections.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{now_ms, Collection, Timestamp};

const BACKUP_VERSION: u32 = 1;

/// Handles collection persistence, one JSON file per collection.
pub struct CollectionStorage {
    collections_dir: PathBuf,
}

impl CollectionStorage {
    pub fn new(collections_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&collections_dir).with_context(|| {
            format!("Failed to create collections directory: {:?}", collections_dir)
        })?;

        Ok(Self { collections_dir })
    }

    /// Get default storage location.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flashdeck")
            .join("collections")
    }

    fn collection_path(&self, collection_id: &str) -> Result<PathBuf> {
        if !is_plain_id(collection_id) {
            bail!("Invalid collection id: {:?}", collection_id);
        }
        Ok(self.collections_dir.join(format!("{}.json", collection_id)))
    }

    /// Save a collection to disk.
    pub fn save(&self, collection: &Collection) -> Result<PathBuf> {
        let path = self.collection_path(&collection.id)?;
        let json = serde_json::to_string_pretty(collection)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write collection file: {:?}", path))?;
        info!(collection = %collection.id, cards = collection.cards.len(), "saved collection");
        Ok(path)
    }

    /// Load a collection from disk.
    pub fn load(&self, collection_id: &str) -> Result<Option<Collection>> {
        let path = self.collection_path(collection_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read collection file: {:?}", path))?;
        let collection: Collection = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse collection file: {:?}", path))?;
        Ok(Some(collection))
    }

    /// Delete a collection file.
    pub fn delete(&self, collection_id: &str) -> Result<bool> {
        let path = self.collection_path(collection_id)?;
        if path.exists() {
            fs::remove_file(&path)?;
            info!(collection = collection_id, "deleted collection");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// List all available collections, sorted by name.
    pub fn list(&self) -> Result<Vec<CollectionInfo>> {
        let mut collections = Vec::new();

        for entry in fs::read_dir(&self.collections_dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|json| Ok(serde_json::from_str::<Collection>(&json)?));

            match parsed {
                Ok(collection) => collections.push(CollectionInfo::from(&collection)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable collection")
                }
            }
        }

        collections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(collections)
    }

    /// Find a collection by case-insensitive name.
    pub fn find_by_name(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let wanted = name.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .find(|c| c.name.to_lowercase() == wanted))
    }

    /// Load a collection named either by id or by name.
    pub fn resolve(&self, id_or_name: &str) -> Result<Option<Collection>> {
        if is_plain_id(id_or_name) {
            if let Some(collection) = self.load(id_or_name)? {
                return Ok(Some(collection));
            }
        }
        match self.find_by_name(id_or_name)? {
            Some(info) => self.load(&info.id),
            None => Ok(None),
        }
    }

    /// Check if a collection with the given name already exists.
    pub fn name_exists(&self, name: &str) -> bool {
        matches!(self.find_by_name(name), Ok(Some(_)))
    }
}

/// An id must name a single file inside the collections directory.
fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && Path::new(id).file_name() == Some(OsStr::new(id))
}

/// Summary info for a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
    pub topic: String,
    pub card_count: usize,
    pub times_played: u32,
}

impl From<&Collection> for CollectionInfo {
    fn from(collection: &Collection) -> Self {
        Self {
            id: collection.id.clone(),
            name: collection.name.clone(),
            topic: collection.topic.clone(),
            card_count: collection.cards.len(),
            times_played: collection.times_played,
        }
    }
}

/// Backup format containing all collections.
#[derive(Debug, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub created_at: Timestamp,
    pub collections: Vec<Collection>,
}

impl CollectionStorage {
    /// Export all collections to a backup file.
    pub fn export_backup(&self, path: &Path) -> Result<usize> {
        let mut collections = Vec::new();
        for info in self.list()? {
            if let Some(collection) = self.load(&info.id)? {
                collections.push(collection);
            }
        }

        let backup = Backup {
            version: BACKUP_VERSION,
            created_at: now_ms(),
            collections,
        };

        let json = serde_json::to_string_pretty(&backup)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write backup file: {:?}", path))?;

        info!(path = %path.display(), collections = backup.collections.len(), "exported backup");
        Ok(backup.collections.len())
    }

    /// Import collections from a backup file.
    /// Returns (imported_count, skipped_count); collections whose id already exists are skipped.
    pub fn import_backup(&self, path: &Path) -> Result<(usize, usize)> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read backup file: {:?}", path))?;
        let backup: Backup = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse backup file: {:?}", path))?;

        if let Some(bad) = backup.collections.iter().find(|c| !is_plain_id(&c.id)) {
            bail!("Backup contains an invalid collection id: {:?}", bad.id);
        }

        let existing_ids: HashSet<String> = self.list()?.into_iter().map(|c| c.id).collect();

        let mut imported = 0;
        let mut skipped = 0;

        for collection in backup.collections {
            if existing_ids.contains(&collection.id) {
                skipped += 1;
            } else {
                self.save(&collection)?;
                imported += 1;
            }
        }

        info!(imported, skipped, "imported backup");
        Ok((imported, skipped))
    }

    /// Get default backup path.
    pub fn default_backup_path() -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!("flashdeck_backup_{}.json", timestamp))
    }
}
