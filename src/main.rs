use clap::{Arg, Command};
use log::info;
use std::path::PathBuf;

use vidscrub::{
    dependencies, EncodeConfig, FfmpegEngine, MuteSegment, Pipeline, ProgressOperation, Result,
    SettingsFile, StatusTracker, TranscodeEngine, VideoZoneSet,
};

fn build_cli() -> Command {
    Command::new("vidscrub")
        .about("Remediates objectionable audio/video segments in video files")
        .version("0.1.0")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Input video file to process")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output video file (optional, defaults to input_scrubbed.ext)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("zones")
                .short('z')
                .long("zones")
                .value_name("FILE")
                .help("Zone set JSON document (defaults to <input>.zones.json when present)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("detections")
                .short('d')
                .long("detections")
                .value_name("FILE")
                .help("Detected mute intervals as a JSON list of {start, end, label, confidence}")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (YAML/JSON)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("status-dir")
                .long("status-dir")
                .value_name("DIR")
                .help("Directory for the processing status document")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Compile and print the pass plan without invoking the engine")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Disable progress indicators")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Default output path: `<stem>_scrubbed.<ext>` next to the input.
fn default_output(input: &PathBuf) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| vidscrub::error::config_error("input", "Invalid filename"))?;
    let ext = input.extension().and_then(|s| s.to_str()).unwrap_or("mp4");

    let mut output = input.clone();
    output.set_file_name(format!("{}_scrubbed.{}", stem, ext));
    Ok(output)
}

/// Load detection events from JSON, revalidating upstream invariants.
async fn load_detections(path: &PathBuf) -> Result<Vec<MuteSegment>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| vidscrub::error::fs_error(e, path.clone()))?;
    let raw: Vec<MuteSegment> = serde_json::from_str(&contents).map_err(|e| {
        vidscrub::error::validation_error(
            "detections",
            format!("Failed to parse detections JSON: {}", e),
        )
    })?;

    raw.into_iter()
        .map(|d| MuteSegment::new(d.start, d.end, d.label, d.confidence))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let app = build_cli();
    let matches = app.get_matches();

    // Initialize logging
    if matches.get_flag("verbose") {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let input = matches.get_one::<PathBuf>("input").unwrap().clone();
    if !input.is_file() {
        return Err(vidscrub::error::config_error(
            "input",
            format!("Input file does not exist: {}", input.display()),
        ));
    }

    let output = match matches.get_one::<PathBuf>("output") {
        Some(output) => output.clone(),
        None => default_output(&input)?,
    };

    // Load config file if specified or from default locations
    let settings = if let Some(config_path) = matches.get_one::<PathBuf>("config") {
        SettingsFile::load(config_path).await?
    } else {
        SettingsFile::load_from_default_locations()
            .await
            .unwrap_or_default()
    };
    let encode_config = settings.apply_to_builder(EncodeConfig::builder())?.build()?;

    let show_progress = !matches.get_flag("no-progress");
    let progress = ProgressOperation::new(show_progress);

    // Validate system dependencies before processing
    progress
        .with_spinner("Validating system dependencies", |_pb| {
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current()
                    .block_on(async { dependencies::validate_dependencies().await })
            })
        })
        .await?;

    // Zone set: explicit path, the conventional sibling document, or empty
    let zone_path = matches.get_one::<PathBuf>("zones").cloned().or_else(|| {
        let conventional = VideoZoneSet::default_zone_path(&input);
        conventional.exists().then_some(conventional)
    });
    let zone_set = match zone_path {
        Some(ref path) => {
            info!("Loading zone set from {}", path.display());
            VideoZoneSet::load(path).await?
        }
        None => VideoZoneSet::new(
            input.to_string_lossy().into_owned(),
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ),
    };

    let detections = match matches.get_one::<PathBuf>("detections") {
        Some(path) => {
            let detections = load_detections(path).await?;
            info!("Loaded {} detection events", detections.len());
            detections
        }
        None => Vec::new(),
    };

    if matches.get_flag("dry-run") {
        let engine = FfmpegEngine::new();
        let duration = engine.probe_duration(&input).await?;
        let padded = vidscrub::pad_segments(
            detections,
            encode_config.mute_padding_before,
            encode_config.mute_padding_after,
        );
        let plan = vidscrub::compile(&zone_set, &padded, duration)?;
        if plan.is_clean() {
            println!("Clean: source would be copied directly");
        } else {
            println!("{} pass(es) planned:", plan.passes.len());
            for (i, pass) in plan.passes.iter().enumerate() {
                println!("  {}. {}", i + 1, pass.describe(&plan.counts));
            }
        }
        return Ok(());
    }

    let status_dir = matches
        .get_one::<PathBuf>("status-dir")
        .cloned()
        .unwrap_or_else(|| settings.resolved_status_dir());
    let status = StatusTracker::open(&status_dir)?;

    let mut pipeline = Pipeline::new(Box::new(FfmpegEngine::new()), status, encode_config);

    let result = progress
        .with_spinner(&format!("Processing {}", input.display()), |_pb| {
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async {
                    pipeline
                        .process(&input, &output, &zone_set, detections.clone())
                        .await
                })
            })
        })
        .await;

    if result.success {
        if result.skipped {
            info!("✓ Video is clean, copied to: {}", output.display());
        } else {
            info!("✓ Successfully created scrubbed video: {}", output.display());
            info!(
                "Applied: {} blur, {} black, {} cut zone(s), {} mute interval(s)",
                result.applied.blur_zones,
                result.applied.black_zones,
                result.applied.cut_zones,
                result.applied.mute_segments
            );
        }
        Ok(())
    } else {
        Err(vidscrub::error::VidscrubError::Processing {
            message: result
                .error
                .unwrap_or_else(|| "Processing failed".to_string()),
        })
    }
}
