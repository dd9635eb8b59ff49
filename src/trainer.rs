use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::identity::{l2_distance, Embedding};
use crate::store::IdentityStore;

/// Running sum of the embeddings seen during one training episode.
#[derive(Debug, Clone)]
struct Accumulator {
    sum: Embedding,
    count: u32,
}

/// What a training request did.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    /// An episode was opened.
    Started { uuid: Uuid },
    /// Stop requested while nothing was training.
    Idle,
    /// The episode ended without samples; the identity is unchanged.
    Empty { uuid: Uuid },
    /// The identity's embedding was replaced by the episode mean.
    Updated { uuid: Uuid, samples: u32, drift: f32 },
}

/// Training mode for at most one identity at a time.
#[derive(Debug, Default)]
pub struct Trainer {
    active: Option<(Uuid, Accumulator)>,
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity currently in training, if any.
    pub fn active(&self) -> Option<Uuid> {
        self.active.as_ref().map(|(uuid, _)| *uuid)
    }

    /// Samples gathered so far for `uuid`'s open episode (0 when not training it).
    pub fn pending_samples(&self, uuid: Uuid) -> u32 {
        match &self.active {
            Some((active, acc)) if *active == uuid => acc.count,
            _ => 0,
        }
    }

    /// Opens an episode for `uuid`. An episode already open for another
    /// identity is discarded.
    pub fn start(&mut self, store: &IdentityStore, uuid: Uuid) -> Result<()> {
        let viz = store.get_by_uuid(uuid)?;
        if let Some((previous, acc)) = self.active.take() {
            warn!(
                "training of {} abandoned with {} unsaved samples",
                previous, acc.count
            );
        }
        let sum = Embedding::zeros(viz.identity.embedding.len());
        self.active = Some((uuid, Accumulator { sum, count: 0 }));
        info!("Face training starts for {} ({})", viz.identity.name, uuid);
        Ok(())
    }

    /// Feeds one resolved face. Ignored unless `uuid` is in training and it
    /// was the only face in its frame. Returns whether the sample counted.
    pub fn observe(&mut self, uuid: Uuid, embedding: &Embedding, faces_in_frame: usize) -> bool {
        let Some((active, acc)) = self.active.as_mut() else {
            return false;
        };
        if *active != uuid {
            return false;
        }
        if faces_in_frame != 1 {
            debug!("skipping training sample: {} faces in frame", faces_in_frame);
            return false;
        }
        acc.sum += embedding;
        acc.count += 1;
        true
    }

    /// Closes the episode. With samples, the identity's embedding becomes the
    /// episode mean, its sample count grows, and it is written to `learned`
    /// and saved.
    ///
    /// The mean replaces the previous embedding outright instead of being
    /// blended with it by prior sample count.
    pub fn stop(&mut self, store: &mut IdentityStore) -> Result<TrainingOutcome> {
        let Some((uuid, acc)) = self.active.take() else {
            debug!("training stop ignored: not training");
            return Ok(TrainingOutcome::Idle);
        };

        if acc.count == 0 {
            info!("Face training stopped for {} without samples", uuid);
            return Ok(TrainingOutcome::Empty { uuid });
        }

        let mean = acc.sum / acc.count as f32;
        let viz = store.get_by_uuid_mut(uuid)?;
        let drift = l2_distance(&mean, &viz.identity.embedding);
        viz.identity.embedding = mean;
        viz.identity.sample_count += acc.count;
        info!(
            "Face training stopped for {}: {} samples, moved {:.3}",
            viz.identity.name, acc.count, drift
        );

        store.learn_from_session(uuid)?;
        store.save()?;
        Ok(TrainingOutcome::Updated {
            uuid,
            samples: acc.count,
            drift,
        })
    }
}
