use anyhow::Result;
use facelearn::notify::NullNotifier;
use facelearn::storage::{FileStorage, ModelStorage};
use facelearn::{
    Embedding, FaceLearner, IdentityStore, LabelOutcome, Matcher, Palette, TrainingMode,
    TrainingOutcome,
};
use std::path::Path;

const DIM: usize = 8;

fn open(model: &Path) -> Result<FaceLearner> {
    let mut store = IdentityStore::new(Box::new(FileStorage::new(model)), DIM);
    store.load_or_empty();
    Ok(FaceLearner::new(
        store,
        Matcher::new(0.48),
        Palette::default(),
        Box::new(NullNotifier),
    ))
}

fn near_origin(offset: f32) -> Embedding {
    let mut e = Embedding::zeros(DIM);
    e[0] = offset;
    e
}

#[test]
fn label_then_train_then_restart() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    let model = dir.path().join("model").join("learned_faces.bin");

    let mut learner = open(&model)?;
    let u1 = learner.resolve(&Embedding::zeros(DIM))?;
    assert_eq!(u1.name, "Unknown");
    assert_eq!(u1.sample_count, 0);

    learner.label(u1.uuid, "Alice")?;
    let learned = learner.store().get_learned(u1.uuid).expect("Alice is learned");
    assert_eq!(learned.name, "Alice");
    assert_eq!(learned.sample_count, 0);

    learner.train(u1.uuid, TrainingMode::On)?;
    for offset in [0.01, 0.02, 0.03] {
        let faces = learner.process_frame(&[near_origin(offset)])?;
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].uuid, u1.uuid);
    }
    let outcome = learner.train(u1.uuid, TrainingMode::Off)?;
    assert!(matches!(outcome, TrainingOutcome::Updated { samples: 3, .. }));
    assert_eq!(learner.store().get_learned(u1.uuid).unwrap().sample_count, 3);
    drop(learner);

    // A new process sees the same learned set.
    let mut learner = open(&model)?;
    let alice = learner.store().get_learned(u1.uuid).expect("persisted");
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.sample_count, 3);
    assert!((alice.embedding[0] - 0.02).abs() < 1e-6);

    let again = learner.resolve(&near_origin(0.05))?;
    assert_eq!(again.uuid, u1.uuid);
    assert_eq!(again.name, "Alice");
    Ok(())
}

#[test]
fn training_through_single_resolves() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let model = dir.path().join("learned_faces.bin");

    let mut learner = open(&model)?;
    let face = learner.resolve(&Embedding::zeros(DIM))?;
    learner.label(face.uuid, "Alice")?;

    learner.train(face.uuid, TrainingMode::On)?;
    for offset in [0.01, 0.02, 0.03] {
        assert_eq!(learner.resolve(&near_origin(offset))?.uuid, face.uuid);
    }
    let outcome = learner.train(face.uuid, TrainingMode::Off)?;
    assert!(matches!(outcome, TrainingOutcome::Updated { samples: 3, .. }));
    drop(learner);

    let learner = open(&model)?;
    let alice = learner.store().get_learned(face.uuid).expect("persisted");
    assert_eq!(alice.sample_count, 3);
    assert!((alice.embedding[0] - 0.02).abs() < 1e-6);
    Ok(())
}

#[test]
fn unreadable_model_starts_empty_and_is_kept() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    let model = dir.path().join("learned_faces.bin");
    std::fs::write(&model, [0xde, 0xad, 0xbe, 0xef, 0xff, 0xff])?;

    let mut learner = open(&model)?;
    assert_eq!(learner.store().learned_len(), 0);
    let corrupt = dir.path().join("learned_faces.bin.corrupt");
    assert_eq!(std::fs::read(&corrupt)?, [0xde, 0xad, 0xbe, 0xef, 0xff, 0xff]);

    // The next save writes a fresh model beside the quarantined one.
    let face = learner.resolve(&Embedding::zeros(DIM))?;
    learner.label(face.uuid, "Alice")?;
    drop(learner);

    let learner = open(&model)?;
    assert_eq!(learner.store().learned_len(), 1);
    assert!(corrupt.exists());
    Ok(())
}

#[test]
fn duplicate_unknown_is_merged_on_label() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let model = dir.path().join("learned_faces.bin");

    let mut learner = open(&model)?;
    let alice = learner.resolve(&Embedding::zeros(DIM))?;
    learner.label(alice.uuid, "Alice")?;

    // Same person from another angle, too far to match.
    let side = learner.resolve(&near_origin(1.0))?;
    assert_ne!(side.uuid, alice.uuid);

    let outcome = learner.label(side.uuid, "Alice")?;
    assert_eq!(
        outcome,
        LabelOutcome::Merged {
            absorbed: side.uuid,
            into: alice.uuid,
            samples: 2
        }
    );
    drop(learner);

    let records = FileStorage::new(&model).load_records()?.unwrap_or_default();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].uuid, alice.uuid);
    assert_eq!(records[0].samples, 2);
    assert!((records[0].embedding[0] - 0.5).abs() < 1e-6);
    Ok(())
}

#[test]
fn multi_face_frames_resolve_every_face() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut learner = open(&dir.path().join("faces.bin"))?;

    let faces = learner.process_frame(&[near_origin(0.0), near_origin(2.0), near_origin(4.0)])?;
    assert_eq!(faces.len(), 3);
    let keys: Vec<&str> = faces.iter().map(|f| f.color_key.as_str()).collect();
    assert_eq!(keys, vec!["#a6cee3", "#1f78b4", "#b2df8a"]);

    // The next frame converges on the same identities.
    let again = learner.process_frame(&[near_origin(4.1), near_origin(0.1)])?;
    assert_eq!(again[0].uuid, faces[2].uuid);
    assert_eq!(again[1].uuid, faces[0].uuid);
    assert!(again.iter().all(|f| f.distance <= 0.48));
    Ok(())
}

#[test]
fn wrong_dimension_fails_only_that_frame() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut learner = open(&dir.path().join("faces.bin"))?;

    assert!(learner.process_frame(&[Embedding::zeros(DIM + 1)]).is_err());
    let faces = learner.process_frame(&[Embedding::zeros(DIM)])?;
    assert_eq!(faces.len(), 1);
    assert_eq!(learner.store().session_len(), 1);
    Ok(())
}
