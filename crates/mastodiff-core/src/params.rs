//! Free-form text → generation request.
//!
//! Requests carry inline directives of the form `args.<name> <value>` that
//! adjust generation knobs instead of contributing to the prompt, and an
//! optional `sep.negative` marker that splits off a negative prompt.

use crate::{
    config::{ImageGenConfig, PromptArgsConfig, PromptConfig},
    error::BotError,
    knobs::{Knobs, Orientation, MAX_GUIDANCE_SCALE, MAX_INFERENCE_STEPS},
    normalize,
};
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;
use tracing::{debug, info};

const DIRECTIVE_PREFIX: &str = "args.";
const IGNORE_DEFAULT_NEGATIVE: &str = "ignore_default_negative_prompt";
const NEGATIVE_SEPARATOR: &str = "sep.negative";

/// Prompt pair as sent to the pipeline and persisted next to each image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompts {
    pub positive: String,
    pub negative: Option<String>,
    /// Explicit negative prompt, or the configured default when none was
    /// given and suppression was not requested.
    pub negative_with_default: Option<String>,
}

/// A compiled, bounded generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompts: Prompts,
    pub knobs: Knobs,
    /// Always within `[1, max_image_count]`.
    pub target_count: u32,
}

/// Compiles normalized text into a [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct ParamCompiler {
    image_gen: ImageGenConfig,
    prompt: PromptConfig,
    prompt_args: PromptArgsConfig,
    default_knobs: Knobs,
}

impl ParamCompiler {
    pub fn new(
        image_gen: ImageGenConfig,
        prompt: PromptConfig,
        prompt_args: PromptArgsConfig,
        default_knobs: Knobs,
    ) -> Self {
        Self {
            image_gen,
            prompt,
            prompt_args,
            default_knobs,
        }
    }

    /// Normalize status HTML and compile it.
    pub fn compile_html(&self, html: &str) -> Result<GenerationRequest, BotError> {
        let text = normalize::extract_and_normalize(html);
        self.compile(&text)
    }

    /// Compile already-normalized text.
    pub fn compile(&self, text: &str) -> Result<GenerationRequest, BotError> {
        let mut knobs = self.default_knobs.clone();
        let mut target_count = self.image_gen.image_count;
        let mut ignore_default_negative = false;
        let mut pending: Option<&str> = None;
        let mut output = String::new();

        for token in text.split(' ').map(str::trim) {
            if let Some(name) = token.strip_prefix(DIRECTIVE_PREFIX) {
                if name == IGNORE_DEFAULT_NEGATIVE {
                    if self.prompt_args.allow_ignore_default_negative_prompt {
                        ignore_default_negative = true;
                    }
                } else {
                    pending = Some(name);
                }
                continue;
            }

            if let Some(name) = pending.take() {
                self.apply_directive(name, token, &mut knobs, &mut target_count)?;
                continue;
            }

            output.push(' ');
            output.push_str(token);
        }

        let target_count = target_count.clamp(1, self.image_gen.max_image_count.max(1));

        let content = output.trim();
        let (positive, negative) = match content.split_once(NEGATIVE_SEPARATOR) {
            Some((before, after)) => {
                let rest: Vec<&str> = after.split(NEGATIVE_SEPARATOR).collect();
                (before.trim().to_string(), Some(rest.join(" ").trim().to_string()))
            }
            None => (content.to_string(), None),
        };

        let negative_with_default = match (&negative, &self.prompt.default_negative_prompt) {
            (Some(explicit), _) => Some(explicit.clone()),
            (None, Some(default)) if !ignore_default_negative => Some(default.trim().to_string()),
            _ => None,
        };

        info!("text (after args): {positive}");
        info!("text negative (after args): {negative:?}");

        Ok(GenerationRequest {
            prompts: Prompts {
                positive,
                negative,
                negative_with_default,
            },
            knobs,
            target_count,
        })
    }

    fn apply_directive(
        &self,
        name: &str,
        value: &str,
        knobs: &mut Knobs,
        target_count: &mut u32,
    ) -> Result<(), BotError> {
        match name {
            "orientation" => {
                if let Some(orientation) = Orientation::parse(value) {
                    knobs.apply_orientation(orientation);
                }
            }
            "image_count" => {
                let count = parse_integer(name, value)?;
                if (1..=i128::from(self.image_gen.max_image_count)).contains(&count) {
                    *target_count = count as u32;
                } else {
                    debug!("args.image_count {count} out of range, keeping {target_count}");
                }
            }
            "num_inference_steps" => {
                let steps = parse_integer(name, value)?.clamp(0, i128::from(MAX_INFERENCE_STEPS));
                knobs.num_inference_steps = Some(steps as u32);
            }
            "guidance_scale" => {
                let scale = parse_float(name, value)?;
                knobs.guidance_scale =
                    Some(scale.clamp(-MAX_GUIDANCE_SCALE, MAX_GUIDANCE_SCALE));
            }
            "strength" => {
                let strength = match value.trim() {
                    "low" => 0.35,
                    "medium" => 0.65,
                    "high" => 0.8,
                    other => parse_float(name, other)?.clamp(0.0, 1.0),
                };
                knobs.strength = Some(strength);
            }
            other => debug!("ignoring unknown directive args.{other}"),
        }
        Ok(())
    }
}

fn invalid(name: &str, value: &str) -> BotError {
    BotError::InvalidDirective {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Integers too large for `i128` saturate, so they still reach the bound check.
fn parse_integer(name: &str, value: &str) -> Result<i128, BotError> {
    match value.trim().parse::<i128>() {
        Ok(parsed) => Ok(parsed),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i128::MAX),
            IntErrorKind::NegOverflow => Ok(i128::MIN),
            _ => Err(invalid(name, value)),
        },
    }
}

/// Infinities are accepted and clamped by the caller; NaN has no bound.
fn parse_float(name: &str, value: &str) -> Result<f64, BotError> {
    match value.trim().parse::<f64>() {
        Ok(parsed) if !parsed.is_nan() => Ok(parsed),
        _ => Err(invalid(name, value)),
    }
}
