use std::collections::BTreeMap;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FaceError, Result};
use crate::identity::{Identity, VisualizedIdentity};
use crate::storage::{FaceRecord, ModelStorage};

/// Learned identities (durable) plus the identities seen this session.
///
/// `session` is the single owner of every visualized identity; lookups by
/// uuid go straight to it. Both maps are ordered by uuid so scans are
/// deterministic.
pub struct IdentityStore {
    learned: BTreeMap<Uuid, Identity>,
    session: BTreeMap<Uuid, VisualizedIdentity>,
    dimension: usize,
    storage: Box<dyn ModelStorage>,
}

impl IdentityStore {
    /// Empty store; call [`IdentityStore::load`] to pull in the persisted model.
    pub fn new(storage: Box<dyn ModelStorage>, dimension: usize) -> Self {
        Self {
            learned: BTreeMap::new(),
            session: BTreeMap::new(),
            dimension,
            storage,
        }
    }

    /// Replaces `learned` with the persisted set. A missing medium loads as
    /// empty; an unreadable one is an error and leaves `learned` untouched.
    pub fn load(&mut self) -> Result<usize> {
        let records = self.storage.load_records()?.unwrap_or_default();

        let mut learned = BTreeMap::new();
        for record in records {
            if record.embedding.len() != self.dimension {
                return Err(FaceError::Persistence {
                    path: self.storage.location(),
                    reason: format!(
                        "identity {} has a {}-d embedding, expected {}",
                        record.uuid,
                        record.embedding.len(),
                        self.dimension
                    ),
                });
            }
            debug!("loaded {} ({} samples)", record.name, record.samples);
            let identity = Identity::from(record);
            learned.insert(identity.uuid, identity);
        }

        info!("Model face count: {}", learned.len());
        self.learned = learned;
        Ok(self.learned.len())
    }

    /// Startup load: an unreadable model is set aside and the store starts
    /// empty instead of failing. Returns the number of learned identities.
    pub fn load_or_empty(&mut self) -> usize {
        match self.load() {
            Ok(count) => count,
            Err(e) => {
                warn!("Starting with an empty model: {}", e);
                self.learned.clear();
                match self.storage.quarantine() {
                    Ok(Some(moved)) => warn!("Unreadable model kept at {}", moved.display()),
                    Ok(None) => {}
                    Err(e) => warn!("Could not move unreadable model aside: {}", e),
                }
                0
            }
        }
    }

    /// Writes `learned` in full to the medium.
    pub fn save(&self) -> Result<()> {
        let records: Vec<FaceRecord> = self.learned.values().map(FaceRecord::from).collect();
        self.storage.save_records(&records)?;
        debug!("saved {} learned faces", records.len());
        Ok(())
    }

    /// Inserts or overwrites the learned entry with the same uuid.
    pub fn upsert_learned(&mut self, identity: Identity) {
        self.learned.insert(identity.uuid, identity);
    }

    pub fn remove_learned(&mut self, uuid: Uuid) -> Option<Identity> {
        self.learned.remove(&uuid)
    }

    pub fn learned(&self) -> impl Iterator<Item = &Identity> {
        self.learned.values()
    }

    pub fn learned_len(&self) -> usize {
        self.learned.len()
    }

    pub fn get_learned(&self, uuid: Uuid) -> Option<&Identity> {
        self.learned.get(&uuid)
    }

    pub fn session(&self) -> impl Iterator<Item = &VisualizedIdentity> {
        self.session.values()
    }

    pub fn session_len(&self) -> usize {
        self.session.len()
    }

    pub fn in_session(&self, uuid: Uuid) -> bool {
        self.session.contains_key(&uuid)
    }

    /// Adds (or replaces) a session identity.
    pub fn insert_session(&mut self, viz: VisualizedIdentity) {
        self.session.insert(viz.uuid(), viz);
    }

    pub fn remove_session(&mut self, uuid: Uuid) -> Option<VisualizedIdentity> {
        self.session.remove(&uuid)
    }

    pub fn get_by_uuid(&self, uuid: Uuid) -> Result<&VisualizedIdentity> {
        self.session.get(&uuid).ok_or(FaceError::NotFound(uuid))
    }

    pub fn get_by_uuid_mut(&mut self, uuid: Uuid) -> Result<&mut VisualizedIdentity> {
        self.session.get_mut(&uuid).ok_or(FaceError::NotFound(uuid))
    }

    /// Copies a session identity into `learned`.
    pub fn learn_from_session(&mut self, uuid: Uuid) -> Result<()> {
        let identity = self.get_by_uuid(uuid)?.identity.clone();
        self.upsert_learned(identity);
        Ok(())
    }

    /// Finds a labeled identity other than `exclude` carrying `name`,
    /// looking at the session first and then at the learned set.
    pub fn find_by_name(&self, name: &str, exclude: Uuid) -> Option<Uuid> {
        self.session
            .values()
            .map(|v| &v.identity)
            .chain(self.learned.values())
            .find(|id| id.uuid != exclude && id.is_labeled() && id.name == name)
            .map(|id| id.uuid)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
