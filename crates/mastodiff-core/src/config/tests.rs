use super::*;

#[test]
fn test_empty_config_uses_defaults() {
    let cfg: Config = toml::from_str("").unwrap();
    assert_eq!(cfg.image_gen.image_count, 1);
    assert_eq!(cfg.image_gen.max_image_count, 4);
    assert_eq!(cfg.image_gen.max_batch_process, 2);
    assert_eq!(cfg.image_gen.image_tile_xy, (2, 2));
    assert_eq!(cfg.handlers.diffuse_me.tag_name, "diffuse_me");
    assert!(cfg.handlers.diffuse_me.enabled);
    assert!(!cfg.handlers.ask.enabled);
    assert_eq!(cfg.proc_kwargs.width, 512);
    assert_eq!(cfg.paste.backend, PasteBackend::None);
    assert!(cfg.messages.listen_start.is_none());
}

#[test]
fn test_full_config_from_toml() {
    let toml_str = r#"
        [bot]
        output_dir = "/tmp/out"
        delete_processing_message = true
        no_image_on_any_nsfw = true

        [mastodon]
        endpoint_url = "https://example.social"
        access_token = "tok"

        [image_gen]
        image_count = 2
        max_image_count = 8
        max_batch_process = 3
        image_tile_xy = [3, 2]

        [prompt]
        default_negative_prompt = "lowres"

        [prompt_args]
        allow_ignore_default_negative_prompt = true

        [proc_kwargs]
        width = 640
        height = 832
        num_inference_steps = 30
        eta = 0.0

        [handlers.ask]
        enabled = true
        tag_name = "question"
        allow_self_request_only = true

        [paste]
        backend = "gist"

        [messages]
        listen_start = "listening"
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.bot.output_dir, "/tmp/out");
    assert!(cfg.bot.delete_processing_message);
    assert_eq!(cfg.mastodon.poll_interval_secs, 5);
    assert_eq!(cfg.image_gen.image_tile_xy, (3, 2));
    assert_eq!(cfg.prompt.default_negative_prompt.as_deref(), Some("lowres"));
    assert!(cfg.prompt_args.allow_ignore_default_negative_prompt);
    assert_eq!(cfg.proc_kwargs.height, 832);
    assert_eq!(cfg.proc_kwargs.num_inference_steps, Some(30));
    assert!(cfg.proc_kwargs.extra.contains_key("eta"));
    assert_eq!(cfg.handlers.ask.tag_name, "question");
    assert!(cfg.handlers.ask.allow_self_request_only);
    assert_eq!(cfg.handlers.diffuse_me.tag_name, "diffuse_me");
    assert_eq!(cfg.paste.backend, PasteBackend::Gist);
    assert_eq!(cfg.messages.listen_start.as_deref(), Some("listening"));
    assert_eq!(cfg.messages.processing, "processing...");
}

#[test]
fn test_handler_config_requires_tag_name() {
    let result: Result<HandlerConfig, _> = toml::from_str("enabled = true");
    assert!(result.is_err());
}

#[test]
fn test_load_missing_file_returns_defaults() {
    let cfg = load("/nonexistent/__mastodiff_config__.toml").unwrap();
    assert_eq!(cfg.image_gen.max_image_count, 4);
}

#[test]
fn test_load_rejects_zero_batch_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[image_gen]\nmax_batch_process = 0\n").unwrap();
    let err = load(path.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("max_batch_process"));
}

#[test]
fn test_load_rejects_malformed_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[image_gen\n").unwrap();
    let err = load(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, BotError::Config(_)));
}

#[test]
fn test_shellexpand_home() {
    if let Some(home) = std::env::var_os("HOME") {
        assert_eq!(
            shellexpand("~/out"),
            format!("{}/out", home.to_string_lossy())
        );
    }
    assert_eq!(shellexpand("/abs/out"), "/abs/out");
}

#[test]
fn test_example_config_parses() {
    let cfg: Config = toml::from_str(include_str!("../../../../config.example.toml")).unwrap();
    assert_eq!(cfg.proc_kwargs.height, 768);
    assert_eq!(cfg.proc_kwargs.guidance_scale, Some(7.5));
    assert_eq!(cfg.paste.backend, PasteBackend::None);
    assert!(cfg.handlers.ask.allow_self_request_only);
}
