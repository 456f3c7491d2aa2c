use super::grid;
use chrono::{Local, Utc};
use image::DynamicImage;
use mastodiff_core::{
    error::BotError,
    message::MediaAttachment,
    params::GenerationRequest,
    traits::{GenerationCall, ImagePipeline, SocialClient},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Sub-batch sizes for one request.
///
/// `remaining` starts at the target count and drops by the full batch size
/// after every call, including a short final one.
#[derive(Debug, Clone)]
pub struct SubBatches {
    remaining: i64,
    batch_size: i64,
}

impl SubBatches {
    pub fn new(target_count: u32, batch_size: u32) -> Self {
        Self {
            remaining: i64::from(target_count),
            batch_size: i64::from(batch_size.max(1)),
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }
}

impl Iterator for SubBatches {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining <= 0 {
            return None;
        }
        let size = self.batch_size.min(self.remaining) as u32;
        self.remaining -= self.batch_size;
        Some(size)
    }
}

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Saved PNG paths, in generation order.
    pub image_filenames: Vec<PathBuf>,
    /// Handles of the grid images that uploaded successfully.
    pub posted_media: Vec<MediaAttachment>,
    pub has_any_nsfw: bool,
    /// Wall-clock time of the generation loop.
    pub elapsed: Duration,
}

impl BatchResult {
    /// Elapsed seconds truncated to milliseconds, e.g. `12.345s`.
    pub fn time_took(&self) -> String {
        let millis = self.elapsed.as_millis();
        format!("{}.{:03}s", millis / 1000, millis % 1000)
    }
}

/// Runs one request against the pipeline in bounded sub-batches.
pub struct BatchRunner {
    pipeline: Arc<dyn ImagePipeline>,
    batch_size: u32,
    tile: (u32, u32),
    output_dir: PathBuf,
}

impl BatchRunner {
    pub fn new(
        pipeline: Arc<dyn ImagePipeline>,
        batch_size: u32,
        tile: (u32, u32),
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            batch_size,
            tile,
            output_dir: output_dir.into(),
        }
    }

    /// Generate, persist, tile and upload.
    ///
    /// A pipeline failure aborts the batch; images from earlier sub-batches
    /// stay on disk. Upload failures are logged per grid and skipped.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        client: &dyn SocialClient,
    ) -> Result<BatchResult, BotError> {
        std::fs::create_dir_all(&self.output_dir)?;

        let target = request.target_count;
        let now = Utc::now();
        let filename_root = format!(
            "{}_{}.{:06}",
            now.with_timezone(&Local).format("%Y-%m-%d"),
            now.timestamp(),
            now.timestamp_subsec_micros()
        );
        let prompts_json = serde_json::to_string(&request.prompts)?;

        let mut result = BatchResult::default();
        let mut images: Vec<DynamicImage> = Vec::with_capacity(target as usize);
        let start = Instant::now();

        for size in SubBatches::new(target, self.batch_size) {
            info!(
                "processing {} of {}, by {size}",
                images.len() + 1,
                target
            );
            let call = GenerationCall {
                prompts: vec![request.prompts.positive.clone(); size as usize],
                negative_prompts: request
                    .prompts
                    .negative_with_default
                    .as_ref()
                    .map(|negative| vec![negative.clone(); size as usize]),
                knobs: request.knobs.clone(),
            };
            let output = self.pipeline.generate(&call).await?;
            if output.images.len() != size as usize {
                warn!(
                    "pipeline returned {} image(s) for a sub-batch of {size}",
                    output.images.len()
                );
            }
            result.has_any_nsfw |= output.any_nsfw();

            for image in output.images {
                if images.len() >= target as usize {
                    break;
                }
                let index = images.len();
                let path = self.persist(&filename_root, index, &image, &prompts_json)?;
                result.image_filenames.push(path);
                images.push(image);
            }
        }
        result.elapsed = start.elapsed();

        let grids = if target == 1 {
            images
        } else {
            self.compose_grids(&images)
        };

        info!("uploading {} grid image(s)", grids.len());
        for grid_image in &grids {
            match self.upload(grid_image, client).await {
                Ok(media) => result.posted_media.push(media),
                Err(e) => error!("error on image upload: {e}"),
            }
        }

        Ok(result)
    }

    /// Compose consecutive chunks of one tile unit each.
    pub fn compose_grids(&self, images: &[DynamicImage]) -> Vec<DynamicImage> {
        let unit = (self.tile.0 * self.tile.1).max(1) as usize;
        images
            .chunks(unit)
            .map(|chunk| {
                let layout = grid::layout_for(chunk.len(), self.tile);
                DynamicImage::ImageRgba8(grid::compose(chunk, layout))
            })
            .collect()
    }

    fn persist(
        &self,
        filename_root: &str,
        index: usize,
        image: &DynamicImage,
        prompts_json: &str,
    ) -> Result<PathBuf, BotError> {
        let image_path = artifact_path(&self.output_dir, filename_root, index, "png");
        let text_path = artifact_path(&self.output_dir, filename_root, index, "txt");
        image
            .save(&image_path)
            .map_err(|e| BotError::Image(format!("saving {}: {e}", image_path.display())))?;
        std::fs::write(&text_path, prompts_json)?;
        Ok(image_path)
    }

    async fn upload(
        &self,
        image: &DynamicImage,
        client: &dyn SocialClient,
    ) -> Result<MediaAttachment, BotError> {
        let bytes = grid::encode_png(image)?;
        client.post_media(bytes, "image/png").await
    }
}

fn artifact_path(dir: &Path, root: &str, index: usize, ext: &str) -> PathBuf {
    dir.join(format!("{root}_{index}.{ext}"))
}
