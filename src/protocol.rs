//! JSON messages exchanged with the front end, one object per line.

use image::Rgb;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{FaceReport, TrainingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<Color> for Rgb<u8> {
    fn from(c: Color) -> Self {
        Rgb([c.r, c.g, c.b])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    On,
    Off,
}

impl From<Mode> for TrainingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::On => TrainingMode::On,
            Mode::Off => TrainingMode::Off,
        }
    }
}

/// Messages sent by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// One frame's worth of embeddings, one per detected face.
    Frame { faces: Vec<Vec<f32>> },
    Labeled { uuid: Uuid, name: String },
    Palette {
        colors: Vec<Color>,
        colors_hex: Vec<String>,
    },
    Training { uuid: Uuid, mode: Mode },
}

/// Messages sent back to the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Annotated {
        frame_faces: Vec<FaceReport>,
        processing_time: String,
    },
    Processed,
    Error { message: String },
}
