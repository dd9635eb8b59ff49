use image::Rgb;
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::identity::{Embedding, UNKNOWN_NAME};
use crate::matcher::{MatchSource, Matcher};
use crate::merger;
use crate::notify::{Notice, Notifier};
use crate::palette::Palette;
use crate::store::IdentityStore;
use crate::trainer::{Trainer, TrainingOutcome};

/// One resolved face as reported back to the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceReport {
    pub uuid: Uuid,
    pub name: String,
    #[serde(rename = "color")]
    pub color_key: String,
    #[serde(skip)]
    pub color: Rgb<u8>,
    /// Stored sample count plus samples gathered by an open training episode.
    #[serde(rename = "samples")]
    pub sample_count: u32,
    pub distance: f32,
    #[serde(skip)]
    pub source: MatchSource,
}

/// Result of a label request.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelOutcome {
    /// `"Unknown"` is not a label.
    Ignored,
    Renamed { uuid: Uuid, name: String },
    /// The name already belonged to `into`; the labeled face was folded into it.
    Merged { absorbed: Uuid, into: Uuid, samples: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingMode {
    On,
    Off,
}

/// The face-learning core: owns the identity store, matcher, trainer and
/// palette. Every operation takes `&mut self`, so one owner serializes all
/// frame and operator events against the store.
pub struct FaceLearner {
    store: IdentityStore,
    matcher: Matcher,
    trainer: Trainer,
    palette: Palette,
    notifier: Box<dyn Notifier>,
}

impl FaceLearner {
    pub fn new(
        store: IdentityStore,
        matcher: Matcher,
        palette: Palette,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            matcher,
            trainer: Trainer::new(),
            palette,
            notifier,
        }
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    pub fn training(&self) -> Option<Uuid> {
        self.trainer.active()
    }

    /// Resolves a single embedding to an identity, creating one if needed.
    /// The embedding counts as a one-face frame, so it feeds open training.
    pub fn resolve(&mut self, embedding: &Embedding) -> Result<FaceReport> {
        self.resolve_in_frame(embedding, 1)
    }

    /// Resolves every face of one frame and feeds the training episode.
    /// Only frames with exactly one face contribute training samples.
    pub fn process_frame(&mut self, embeddings: &[Embedding]) -> Result<Vec<FaceReport>> {
        let faces = embeddings.len();
        let mut reports = Vec::with_capacity(faces);
        for embedding in embeddings {
            reports.push(self.resolve_in_frame(embedding, faces)?);
        }
        Ok(reports)
    }

    fn resolve_in_frame(&mut self, embedding: &Embedding, faces: usize) -> Result<FaceReport> {
        let res = self.matcher.resolve(&mut self.store, &self.palette, embedding)?;
        self.trainer.observe(res.uuid, embedding, faces);
        self.report(res.uuid, res.distance, res.source)
    }

    fn report(&self, uuid: Uuid, distance: f32, source: MatchSource) -> Result<FaceReport> {
        let viz = self.store.get_by_uuid(uuid)?;
        Ok(FaceReport {
            uuid,
            name: viz.identity.name.clone(),
            color_key: viz.color_key.clone(),
            color: viz.color,
            sample_count: viz.identity.sample_count + self.trainer.pending_samples(uuid),
            distance,
            source,
        })
    }

    /// Names an identity. A name already carried by another identity merges
    /// this one into it instead.
    pub fn label(&mut self, uuid: Uuid, name: &str) -> Result<LabelOutcome> {
        let name = name.trim();
        if name.is_empty() || name == UNKNOWN_NAME {
            return Ok(LabelOutcome::Ignored);
        }
        self.store.get_by_uuid(uuid)?;

        if let Some(owner) = self.store.find_by_name(name, uuid) {
            if self.trainer.active() == Some(uuid) {
                warn!("training of {} cancelled: merged into {}", uuid, name);
                self.trainer = Trainer::new();
            }
            let merged = merger::merge_into(&mut self.store, owner, uuid)?;
            self.notifier.notify(Notice::ModelUpdated);
            self.notifier
                .notify(Notice::Speak(format!("The face of {} has been merged.", merged.name)));
            return Ok(LabelOutcome::Merged {
                absorbed: uuid,
                into: owner,
                samples: merged.sample_count,
            });
        }

        self.store.get_by_uuid_mut(uuid)?.identity.name = name.to_string();
        self.store.learn_from_session(uuid)?;
        self.store.save()?;
        info!("Learned faces: {}", self.store.learned_len());
        self.notifier.notify(Notice::ModelUpdated);
        self.notifier
            .notify(Notice::Speak(format!("The face of {} has been labeled.", name)));
        Ok(LabelOutcome::Renamed {
            uuid,
            name: name.to_string(),
        })
    }

    /// Starts or stops training for `uuid`.
    pub fn train(&mut self, uuid: Uuid, mode: TrainingMode) -> Result<TrainingOutcome> {
        match mode {
            TrainingMode::On => {
                self.trainer.start(&self.store, uuid)?;
                Ok(TrainingOutcome::Started { uuid })
            }
            TrainingMode::Off => {
                self.store.get_by_uuid(uuid)?;
                if let Some(active) = self.trainer.active() {
                    if active != uuid {
                        warn!("stop requested for {} while training {}", uuid, active);
                    }
                }
                let outcome = self.trainer.stop(&mut self.store)?;
                if matches!(outcome, TrainingOutcome::Updated { .. }) {
                    self.notifier.notify(Notice::ModelUpdated);
                }
                Ok(outcome)
            }
        }
    }

    /// Replaces the color table used for identities seen from now on.
    pub fn set_palette(&mut self, colors: Vec<Rgb<u8>>, color_keys: Vec<String>) -> Result<()> {
        self.palette = Palette::new(colors, color_keys)?;
        info!("palette set to {} colors", self.palette.len());
        Ok(())
    }

    /// Retries writing the learned set after a failed save.
    pub fn save(&self) -> Result<()> {
        self.store.save()?;
        self.notifier.notify(Notice::ModelUpdated);
        Ok(())
    }
}
