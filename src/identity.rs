use std::hash::{Hash, Hasher};

use image::Rgb;
use ndarray::Array1;
use uuid::Uuid;

/// Name carried by an identity until an operator labels it.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Face embedding produced by the external extractor.
pub type Embedding = Array1<f32>;

/// One distinct face identity.
///
/// Equality and hashing only look at `uuid`.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uuid: Uuid,
    pub name: String,
    pub embedding: Embedding,
    pub sample_count: u32,
}

impl Identity {
    /// Fresh, unlabeled identity seeded with a single embedding.
    pub fn unknown(embedding: Embedding) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: UNKNOWN_NAME.to_string(),
            embedding,
            sample_count: 0,
        }
    }

    pub fn is_labeled(&self) -> bool {
        self.name != UNKNOWN_NAME
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

/// An identity decorated with its drawing color for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizedIdentity {
    pub identity: Identity,
    pub color: Rgb<u8>,
    pub color_key: String,
}

impl VisualizedIdentity {
    pub fn uuid(&self) -> Uuid {
        self.identity.uuid
    }
}

/// Euclidean (L2) distance between two embeddings of equal length.
pub fn l2_distance(a: &Embedding, b: &Embedding) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
