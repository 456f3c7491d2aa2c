use super::grid::{compose, layout_for, GridLayout};
use super::*;
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use mastodiff_core::{
    error::BotError,
    knobs::Knobs,
    message::{Account, MediaAttachment, NewStatus, Status},
    params::{GenerationRequest, Prompts},
    traits::{GenerationCall, GenerationOutput, ImagePipeline, SocialClient},
};
use std::sync::{Arc, Mutex};

/// Pipeline that returns solid images and records every call.
#[derive(Default)]
struct ScriptedPipeline {
    calls: Mutex<Vec<GenerationCall>>,
    nsfw_on_call: Option<usize>,
    fail_on_call: Option<usize>,
}

#[async_trait]
impl ImagePipeline for ScriptedPipeline {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, call: &GenerationCall) -> Result<GenerationOutput, BotError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len() - 1
        };
        if self.fail_on_call == Some(n) {
            return Err(BotError::Pipeline("boom".into()));
        }
        let images = (0..call.prompts.len())
            .map(|_| DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 255]))))
            .collect::<Vec<_>>();
        let nsfw_flags = vec![self.nsfw_on_call == Some(n); images.len()];
        Ok(GenerationOutput { images, nsfw_flags })
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Client that accepts uploads, optionally failing the first N.
#[derive(Default)]
struct UploadClient {
    uploads: Mutex<Vec<Vec<u8>>>,
    fail_first: usize,
}

#[async_trait]
impl SocialClient for UploadClient {
    fn name(&self) -> &str {
        "upload"
    }

    async fn verify_credentials(&self) -> Result<Account, BotError> {
        Ok(Account::default())
    }

    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<Status>, BotError> {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        Ok(rx)
    }

    async fn post_status(&self, _status: &NewStatus) -> Result<Status, BotError> {
        Ok(Status::default())
    }

    async fn post_media(&self, bytes: Vec<u8>, mime: &str) -> Result<MediaAttachment, BotError> {
        assert_eq!(mime, "image/png");
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(bytes);
        if uploads.len() <= self.fail_first {
            return Err(BotError::Social("422 unprocessable".into()));
        }
        Ok(MediaAttachment {
            id: format!("m{}", uploads.len()),
            media_type: "image".into(),
            url: None,
        })
    }

    async fn delete_status(&self, _status_id: &str) -> Result<(), BotError> {
        Ok(())
    }

    async fn reblog(&self, _status_id: &str) -> Result<(), BotError> {
        Ok(())
    }
}

fn request(count: u32, negative: Option<&str>) -> GenerationRequest {
    GenerationRequest {
        prompts: Prompts {
            positive: "a cat".into(),
            negative: negative.map(String::from),
            negative_with_default: negative.map(String::from),
        },
        knobs: Knobs::default(),
        target_count: count,
    }
}

fn solid(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([1, 2, 3, 255])))
}

#[test]
fn test_sub_batches_decrement_by_batch_size() {
    let mut plan = SubBatches::new(5, 2);
    let mut remaining = vec![plan.remaining()];
    let mut sizes = Vec::new();
    while let Some(size) = plan.next() {
        sizes.push(size);
        remaining.push(plan.remaining());
    }
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(remaining, vec![5, 3, 1, -1]);
}

#[test]
fn test_sub_batches_even_split() {
    assert_eq!(SubBatches::new(4, 2).collect::<Vec<_>>(), vec![2, 2]);
    assert_eq!(SubBatches::new(1, 4).collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_layout_full_and_short_chunks() {
    assert_eq!(layout_for(4, (2, 2)), GridLayout { columns: 2, rows: 2 });
    // Short final chunk: 2 columns x 1 row, widened to the 4-cell square.
    assert_eq!(layout_for(2, (2, 2)), GridLayout { columns: 4, rows: 1 });
    // columns % len fallback.
    assert_eq!(layout_for(2, (3, 1)), GridLayout { columns: 1, rows: 1 });
    // columns % len == 0 falls back to one column per image.
    assert_eq!(layout_for(1, (2, 1)), GridLayout { columns: 1, rows: 1 });
}

#[test]
fn test_layout_tolerates_degenerate_tiles() {
    assert_eq!(layout_for(3, (0, 0)), GridLayout { columns: 1, rows: 3 });
    assert_eq!(layout_for(2, (2, 0)), GridLayout { columns: 2, rows: 1 });
    assert_eq!(
        layout_for(1, (u32::MAX, u32::MAX)),
        GridLayout { columns: 65_535 * 65_535, rows: 1 }
    );
}

#[test]
fn test_compose_uses_largest_cell_and_transparent_padding() {
    let images = vec![solid(4, 2), solid(2, 6), solid(3, 3)];
    let grid = compose(&images, GridLayout { columns: 2, rows: 2 });
    assert_eq!(grid.dimensions(), (8, 12));
    assert_eq!(grid.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    // Below the 4x2 first image, inside its 4x6 cell.
    assert_eq!(grid.get_pixel(0, 4), &Rgba([0, 0, 0, 0]));
    // Empty fourth cell.
    assert_eq!(grid.get_pixel(7, 11), &Rgba([0, 0, 0, 0]));
}

#[test]
fn test_compose_grows_rows_instead_of_clipping() {
    let images = vec![solid(2, 2), solid(2, 2)];
    let grid = compose(&images, GridLayout { columns: 1, rows: 1 });
    assert_eq!(grid.dimensions(), (2, 4));
}

#[tokio::test]
async fn test_run_issues_sub_batches_and_persists_every_image() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(ScriptedPipeline::default());
    let client = UploadClient::default();
    let runner = BatchRunner::new(pipeline.clone(), 2, (2, 2), dir.path());

    let result = runner.run(&request(5, Some("blurry")), &client).await.unwrap();

    let calls = pipeline.calls.lock().unwrap();
    let sizes: Vec<usize> = calls.iter().map(|c| c.prompts.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(calls[2].negative_prompts, Some(vec!["blurry".to_string()]));

    assert_eq!(result.image_filenames.len(), 5);
    for (idx, path) in result.image_filenames.iter().enumerate() {
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(&format!("_{idx}.png")), "{name}");
        let sidecar = std::fs::read_to_string(path.with_extension("txt")).unwrap();
        let prompts: serde_json::Value = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(prompts["positive"], "a cat");
        assert_eq!(prompts["negative_with_default"], "blurry");
    }
    // 5 images in 2x2 tiles: one full grid and one short grid.
    assert_eq!(result.posted_media.len(), 2);
    assert!(!result.has_any_nsfw);
}

#[tokio::test]
async fn test_single_image_is_posted_untiled() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(ScriptedPipeline::default());
    let client = UploadClient::default();
    let runner = BatchRunner::new(pipeline, 2, (2, 2), dir.path());

    let result = runner.run(&request(1, None), &client).await.unwrap();
    assert_eq!(result.posted_media.len(), 1);

    let uploads = client.uploads.lock().unwrap();
    let posted = image::load_from_memory(&uploads[0]).unwrap();
    assert_eq!(posted.dimensions(), (4, 4));
}

#[tokio::test]
async fn test_six_images_make_two_grids() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(ScriptedPipeline::default());
    let client = UploadClient::default();
    let runner = BatchRunner::new(pipeline, 3, (2, 2), dir.path());

    let result = runner.run(&request(6, None), &client).await.unwrap();
    assert_eq!(result.image_filenames.len(), 6);

    let uploads = client.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    let first = image::load_from_memory(&uploads[0]).unwrap();
    let second = image::load_from_memory(&uploads[1]).unwrap();
    assert_eq!(first.dimensions(), (8, 8));
    // Second chunk of 2 images laid out as 4 columns x 1 row.
    assert_eq!(second.dimensions(), (16, 4));
}

#[tokio::test]
async fn test_upload_failure_skips_that_grid_only() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(ScriptedPipeline::default());
    let client = UploadClient {
        fail_first: 1,
        ..Default::default()
    };
    let runner = BatchRunner::new(pipeline, 4, (2, 2), dir.path());

    let result = runner.run(&request(8, None), &client).await.unwrap();
    assert_eq!(client.uploads.lock().unwrap().len(), 2);
    assert_eq!(result.posted_media.len(), 1);
    assert_eq!(result.posted_media[0].id, "m2");
    assert_eq!(result.image_filenames.len(), 8);
}

#[tokio::test]
async fn test_nsfw_flag_from_any_sub_batch() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(ScriptedPipeline {
        nsfw_on_call: Some(1),
        ..Default::default()
    });
    let runner = BatchRunner::new(pipeline, 1, (2, 2), dir.path());
    let result = runner
        .run(&request(3, None), &UploadClient::default())
        .await
        .unwrap();
    assert!(result.has_any_nsfw);
}

#[tokio::test]
async fn test_pipeline_failure_keeps_earlier_images_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(ScriptedPipeline {
        fail_on_call: Some(1),
        ..Default::default()
    });
    let runner = BatchRunner::new(pipeline, 2, (2, 2), dir.path());

    let err = runner
        .run(&request(4, None), &UploadClient::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Pipeline(_)));

    let pngs = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
        .count();
    assert_eq!(pngs, 2);
}

#[test]
fn test_time_took_format() {
    let result = BatchResult {
        elapsed: std::time::Duration::from_millis(12_345),
        ..Default::default()
    };
    assert_eq!(result.time_took(), "12.345s");
}
