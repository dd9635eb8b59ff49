use log::info;
use uuid::Uuid;

use crate::error::Result;
use crate::identity::Identity;
use crate::store::IdentityStore;

/// Folds `absorbed` into `original` by sample-count-weighted averaging.
///
/// Each side weighs at least one observation, its own embedding, so two
/// fresh identities average evenly. A labeled original with zero samples
/// still counts as one observation. The result keeps `original`'s uuid and name.
pub fn merge(original: &Identity, absorbed: &Identity) -> Identity {
    let n1 = original.sample_count.max(1);
    let n2 = absorbed.sample_count.max(1);
    let total = (n1 + n2) as f32;

    let embedding =
        &original.embedding * (n1 as f32 / total) + &absorbed.embedding * (n2 as f32 / total);

    Identity {
        uuid: original.uuid,
        name: original.name.clone(),
        embedding,
        sample_count: n1 + n2,
    }
}

/// Merges the session identity `absorbed` into `original`, drops the
/// absorbed one from the session and the learned set, and saves.
///
/// `original` may live in the session, in `learned`, or both; when it is
/// visible the session copy keeps its color.
pub fn merge_into(store: &mut IdentityStore, original: Uuid, absorbed: Uuid) -> Result<Identity> {
    let absorbed_identity = store.get_by_uuid(absorbed)?.identity.clone();
    let original_identity = match store.get_by_uuid(original) {
        Ok(viz) => viz.identity.clone(),
        Err(err) => store.get_learned(original).cloned().ok_or(err)?,
    };

    let merged = merge(&original_identity, &absorbed_identity);
    info!(
        "merged {} ({} samples) into {} ({} samples), now {} samples",
        absorbed_identity.uuid,
        absorbed_identity.sample_count,
        merged.name,
        original_identity.sample_count,
        merged.sample_count
    );

    store.remove_session(absorbed);
    store.remove_learned(absorbed);
    if let Ok(viz) = store.get_by_uuid_mut(original) {
        viz.identity = merged.clone();
    }
    store.upsert_learned(merged.clone());
    store.save()?;
    Ok(merged)
}
