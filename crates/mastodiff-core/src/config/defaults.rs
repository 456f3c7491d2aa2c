//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Mastodon Diffuser Bot".to_string()
}

pub fn default_data_dir() -> String {
    "~/.mastodiff".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_output_dir() -> String {
    "~/.mastodiff/output".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_poll_interval() -> u64 {
    5
}

pub fn default_pipeline_base_url() -> String {
    "http://127.0.0.1:7860".to_string()
}

pub fn default_pipeline_timeout() -> u64 {
    600
}

pub fn default_image_count() -> u32 {
    1
}

pub fn default_max_image_count() -> u32 {
    4
}

pub fn default_max_batch_process() -> u32 {
    2
}

pub fn default_image_tile_xy() -> (u32, u32) {
    (2, 2)
}

pub fn default_diffuse_me_tag() -> String {
    "diffuse_me".to_string()
}

pub fn default_ask_tag() -> String {
    "ask".to_string()
}

pub fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_assistant_timeout() -> u64 {
    120
}

pub fn default_retry_delay() -> u64 {
    10
}

pub fn default_pastebin_base_url() -> String {
    "https://pastebin.com".to_string()
}

pub fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

pub fn default_processing_message() -> String {
    "processing...".to_string()
}

pub fn default_image_spoiler() -> String {
    "generated images".to_string()
}

pub fn default_nsfw_withheld() -> String {
    "Some images were flagged as NSFW, so none are attached.".to_string()
}

pub fn default_invalid_request() -> String {
    "Could not read that request:".to_string()
}

pub fn default_generation_failed() -> String {
    "Image generation failed. Please try again later.".to_string()
}

pub fn default_ask_timeout() -> String {
    "The assistant took too long to answer. Try a simpler question.".to_string()
}

pub fn default_ask_expired() -> String {
    "The assistant token has expired.".to_string()
}

pub fn default_ask_error() -> String {
    "Something went wrong. Please try again.".to_string()
}

pub fn default_paste_failed() -> String {
    "The answer is long but could not be uploaded.".to_string()
}
