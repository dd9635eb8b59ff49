use log::debug;
use uuid::Uuid;

use crate::error::{FaceError, Result};
use crate::identity::{l2_distance, Embedding, Identity, VisualizedIdentity};
use crate::palette::Palette;
use crate::store::IdentityStore;

/// Distance reported for an identity minted because nothing matched.
/// Larger than any sensible tolerance.
pub const NEW_IDENTITY_DISTANCE: f32 = 999.0;

/// Where a resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Session,
    Learned,
    Created,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub uuid: Uuid,
    pub distance: f32,
    pub source: MatchSource,
}

/// Closest candidate within `tolerance`, if any. Candidates must come in a
/// fixed order; on an exact tie the first one wins.
pub fn best_match<'a, I>(candidates: I, probe: &Embedding, tolerance: f32) -> Option<(&'a Identity, f32)>
where
    I: IntoIterator<Item = &'a Identity>,
{
    candidates
        .into_iter()
        .map(|known| (known, l2_distance(&known.embedding, probe)))
        .filter(|(_, distance)| *distance <= tolerance)
        .fold(None, |acc, (known, distance)| match acc {
            Some((_, best)) if best <= distance => acc,
            _ => Some((known, distance)),
        })
}

/// Resolves embeddings to identities: session first, then learned, else new.
#[derive(Debug, Clone)]
pub struct Matcher {
    tolerance: f32,
}

impl Matcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn resolve(
        &self,
        store: &mut IdentityStore,
        palette: &Palette,
        probe: &Embedding,
    ) -> Result<Resolution> {
        if probe.len() != store.dimension() {
            return Err(FaceError::DimensionMismatch {
                expected: store.dimension(),
                got: probe.len(),
            });
        }

        if let Some((known, distance)) =
            best_match(store.session().map(|v| &v.identity), probe, self.tolerance)
        {
            debug!("session match {} ({}) at {:.3}", known.name, known.uuid, distance);
            return Ok(Resolution {
                uuid: known.uuid,
                distance,
                source: MatchSource::Session,
            });
        }

        let learned = best_match(
            store.learned().filter(|id| !store.in_session(id.uuid)),
            probe,
            self.tolerance,
        )
        .map(|(known, distance)| (known.clone(), distance));
        if let Some((known, distance)) = learned {
            debug!("learned match {} ({}) at {:.3}", known.name, known.uuid, distance);
            let uuid = known.uuid;
            let viz = visualize(known, store.session_len(), palette);
            store.insert_session(viz);
            return Ok(Resolution {
                uuid,
                distance,
                source: MatchSource::Learned,
            });
        }

        let fresh = Identity::unknown(probe.clone());
        let uuid = fresh.uuid;
        debug!("no match within {:.3}, created {}", self.tolerance, uuid);
        let viz = visualize(fresh, store.session_len(), palette);
        store.insert_session(viz);
        Ok(Resolution {
            uuid,
            distance: NEW_IDENTITY_DISTANCE,
            source: MatchSource::Created,
        })
    }
}

fn visualize(identity: Identity, ordinal: usize, palette: &Palette) -> VisualizedIdentity {
    let (color, color_key) = palette.assign(ordinal);
    VisualizedIdentity {
        identity,
        color,
        color_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use ndarray::array;

    fn store(dim: usize) -> IdentityStore {
        IdentityStore::new(Box::new(MemoryStorage::new()), dim)
    }

    fn named(name: &str, embedding: Embedding) -> Identity {
        let mut id = Identity::unknown(embedding);
        id.name = name.into();
        id
    }

    #[test]
    fn creates_new_identity_when_nothing_matches() {
        let mut store = store(2);
        let palette = Palette::default();
        let matcher = Matcher::new(0.5);

        let res = matcher.resolve(&mut store, &palette, &array![0.0, 0.0]).unwrap();
        assert_eq!(res.source, MatchSource::Created);
        assert_eq!(res.distance, NEW_IDENTITY_DISTANCE);

        let viz = store.get_by_uuid(res.uuid).unwrap();
        assert_eq!(viz.identity.name, "Unknown");
        assert_eq!(viz.identity.sample_count, 0);
        assert_eq!(viz.color_key, "#a6cee3");
        assert_eq!(store.session_len(), 1);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let mut store = store(2);
        let palette = Palette::default();
        let matcher = Matcher::new(0.5);
        let alice = named("Alice", array![0.0, 0.0]);
        store.upsert_learned(alice.clone());

        let res = matcher.resolve(&mut store, &palette, &array![0.5, 0.0]).unwrap();
        assert_eq!(res.uuid, alice.uuid);
        assert_eq!(res.distance, 0.5);

        let mut other = self::store(2);
        other.upsert_learned(alice.clone());
        let res = matcher
            .resolve(&mut other, &palette, &array![0.5 + 1e-4, 0.0])
            .unwrap();
        assert_ne!(res.uuid, alice.uuid);
        assert_eq!(res.source, MatchSource::Created);
    }

    #[test]
    fn picks_minimum_distance_among_learned() {
        let mut store = store(1);
        let palette = Palette::default();
        let matcher = Matcher::new(1.0);
        let far = named("Far", array![0.8]);
        let near = named("Near", array![0.3]);
        store.upsert_learned(far);
        store.upsert_learned(near.clone());

        let res = matcher.resolve(&mut store, &palette, &array![0.2]).unwrap();
        assert_eq!(res.uuid, near.uuid);
        assert_eq!(res.source, MatchSource::Learned);
        // Only the winner is materialized.
        assert_eq!(store.session_len(), 1);
    }

    #[test]
    fn session_wins_over_closer_learned() {
        let mut store = store(1);
        let palette = Palette::default();
        let matcher = Matcher::new(0.5);

        let first = matcher.resolve(&mut store, &palette, &array![0.0]).unwrap();
        let bob = named("Bob", array![0.4]);
        store.upsert_learned(bob.clone());

        // 0.35 is closer to Bob (0.05) but still within tolerance of the session face.
        let again = matcher.resolve(&mut store, &palette, &array![0.35]).unwrap();
        assert_eq!(again.uuid, first.uuid);
        assert_eq!(again.source, MatchSource::Session);
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut store = store(2);
        let palette = Palette::default();
        let matcher = Matcher::new(0.6);
        store.upsert_learned(named("A", array![0.0, 0.3]));
        store.upsert_learned(named("B", array![0.3, 0.0]));

        let probe = array![0.0, 0.0];
        let first = matcher.resolve(&mut store, &palette, &probe).unwrap();
        for _ in 0..5 {
            let again = matcher.resolve(&mut store, &palette, &probe).unwrap();
            assert_eq!(again.uuid, first.uuid);
            assert_eq!(again.distance, first.distance);
        }
    }

    #[test]
    fn exact_ties_prefer_first_candidate() {
        let a = named("A", array![1.0]);
        let b = named("B", array![-1.0]);
        let (winner, distance) = best_match([&a, &b], &array![0.0], 2.0).unwrap();
        assert_eq!(winner.uuid, a.uuid);
        assert_eq!(distance, 1.0);
        assert!(best_match([&a, &b], &array![0.0], 0.5).is_none());
    }

    #[test]
    fn colors_follow_session_ordinal() {
        let mut store = store(1);
        let palette = Palette::default();
        let matcher = Matcher::new(0.1);

        let keys: Vec<String> = (0..3)
            .map(|i| {
                let res = matcher.resolve(&mut store, &palette, &array![i as f32]).unwrap();
                store.get_by_uuid(res.uuid).unwrap().color_key.clone()
            })
            .collect();
        assert_eq!(keys, vec!["#a6cee3", "#1f78b4", "#b2df8a"]);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let mut store = store(3);
        let err = Matcher::new(0.5)
            .resolve(&mut store, &Palette::default(), &array![0.0])
            .unwrap_err();
        assert!(matches!(err, FaceError::DimensionMismatch { expected: 3, got: 1 }));
        assert_eq!(store.session_len(), 0);
    }
}
