//! Generation knobs: the named parameters passed opaquely to the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Image edge used when the configuration leaves width or height unset.
pub const DEFAULT_EDGE: u32 = 512;

/// Upper bound for `num_inference_steps`.
pub const MAX_INFERENCE_STEPS: u32 = 100;

/// Upper bound for `guidance_scale`.
pub const MAX_GUIDANCE_SCALE: f64 = 100.0;

/// Named generation parameters.
///
/// Known knobs are typed; anything else in `[proc_kwargs]` passes through
/// `extra` and is serialized flat next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knobs {
    #[serde(default = "default_edge")]
    pub width: u32,
    #[serde(default = "default_edge")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_edge() -> u32 {
    DEFAULT_EDGE
}

impl Default for Knobs {
    fn default() -> Self {
        Self {
            width: DEFAULT_EDGE,
            height: DEFAULT_EDGE,
            num_inference_steps: None,
            guidance_scale: None,
            strength: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Target orientation requested through `args.orientation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "landscape" => Some(Self::Landscape),
            "portrait" => Some(Self::Portrait),
            "square" => Some(Self::Square),
            _ => None,
        }
    }
}

impl Knobs {
    /// Swap or equalize width/height. Idempotent.
    pub fn apply_orientation(&mut self, orientation: Orientation) {
        match orientation {
            Orientation::Landscape if self.width < self.height => {
                std::mem::swap(&mut self.width, &mut self.height)
            }
            Orientation::Portrait if self.width > self.height => {
                std::mem::swap(&mut self.width, &mut self.height)
            }
            Orientation::Square => {
                let edge = self.width.min(self.height);
                self.width = edge;
                self.height = edge;
            }
            _ => {}
        }
    }
}
