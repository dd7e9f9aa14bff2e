//! Command-line front end: classify audio files and print one JSON line per file.

use std::path::{Path, PathBuf};

use serde_json::json;

use sermood::analysis::extract_features;
use sermood::config::{self, PipelineSettings};
use sermood::logging;
use sermood::{EmotionPipeline, UploadedAudio};

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config_path: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    no_transcoder: bool,
    mode: Mode,
}

#[derive(Debug, Clone, Default)]
enum Mode {
    #[default]
    Help,
    Status,
    Features(PathBuf),
    Classify(Vec<PathBuf>),
}

/// Returns `Ok(false)` when at least one file could not be classified.
fn run() -> Result<bool, String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Mode::Help = options.mode {
        println!("{}", help_text());
        return Ok(true);
    }
    if let Err(err) = logging::init(options.log_dir.as_deref()) {
        eprintln!("File logging disabled: {err}");
    }

    if let Mode::Features(path) = &options.mode {
        let features = extract_features(path).map_err(|err| err.to_string())?;
        println!(
            "{}",
            json!({ "file": path.display().to_string(), "features": features })
        );
        return Ok(true);
    }

    let settings = resolve_settings(&options)?;
    let pipeline = EmotionPipeline::from_settings(&settings).map_err(|err| err.to_string())?;
    let all_ok = match &options.mode {
        Mode::Status => {
            println!("{}", status_line(&pipeline)?);
            true
        }
        Mode::Classify(files) => files
            .iter()
            .map(|file| classify_file(&pipeline, file))
            .fold(true, |ok, file_ok| ok && file_ok),
        Mode::Help | Mode::Features(_) => true,
    };
    pipeline.shutdown();
    Ok(all_ok)
}

fn resolve_settings(options: &CliOptions) -> Result<PipelineSettings, String> {
    let mut settings = match &options.config_path {
        Some(path) => config::load_from_path(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    if let Some(dir) = &options.model_dir {
        settings.model_dir = Some(dir.clone());
    }
    if let Some(dir) = &options.scratch_dir {
        settings.scratch_dir = Some(dir.clone());
    }
    if options.no_transcoder {
        settings.transcoder.enabled = false;
    }
    Ok(settings)
}

/// Health report plus the label set and feature width of the loaded ensemble.
fn status_line(pipeline: &EmotionPipeline) -> Result<serde_json::Value, String> {
    let mut line = serde_json::to_value(pipeline.status()).map_err(|err| err.to_string())?;
    if let Some(fields) = line.as_object_mut() {
        let predictor = pipeline.predictor();
        fields.insert("emotions".into(), json!(predictor.classes()));
        fields.insert("feature_dim".into(), json!(predictor.feature_dim()));
    }
    Ok(line)
}

fn classify_file(pipeline: &EmotionPipeline, path: &Path) -> bool {
    let display = path.display().to_string();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let line = match std::fs::read(path) {
        Err(err) => json!({
            "file": display,
            "error": format!("Failed to read file: {err}"),
            "status": 400,
        }),
        Ok(bytes) => match pipeline.classify(UploadedAudio::new(filename, bytes)) {
            Ok(label) => json!({ "file": display, "predicted_emotion": label }),
            Err(err) => json!({
                "file": display,
                "error": err.public_message(),
                "status": err.status_code(),
            }),
        },
    };
    println!("{line}");
    line.get("predicted_emotion").is_some()
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut status = false;
    let mut features: Option<PathBuf> = None;
    let mut files = Vec::new();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Ok(CliOptions::default()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--models" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--models requires a value".to_string())?;
                options.model_dir = Some(PathBuf::from(value));
            }
            "--scratch" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--scratch requires a value".to_string())?;
                options.scratch_dir = Some(PathBuf::from(value));
            }
            "--log-dir" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--log-dir requires a value".to_string())?;
                options.log_dir = Some(PathBuf::from(value));
            }
            "--features" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--features requires a value".to_string())?;
                features = Some(PathBuf::from(value));
            }
            "--no-transcoder" => options.no_transcoder = true,
            "--status" => status = true,
            unknown if unknown.starts_with("--") => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
            file => files.push(PathBuf::from(file)),
        }
        idx += 1;
    }

    options.mode = match (status, features, files.is_empty()) {
        (true, None, true) => Mode::Status,
        (false, Some(path), true) => Mode::Features(path),
        (false, None, false) => Mode::Classify(files),
        (false, None, true) => Mode::Help,
        _ => {
            return Err(format!(
                "--status, --features and audio files are mutually exclusive\n\n{}",
                help_text()
            ));
        }
    };
    Ok(options)
}

fn help_text() -> String {
    [
        "sermood",
        "",
        "Usage:",
        "  sermood [options] <audio>...",
        "  sermood [options] --status",
        "  sermood --features <wav>",
        "",
        "Options:",
        "  --config <toml>    Settings file (default: config.toml in the app directory).",
        "  --models <dir>     Model artifact directory.",
        "  --scratch <dir>    Scratch directory for request files.",
        "  --log-dir <dir>    Directory for the log file (default: logs in the app directory).",
        "  --no-transcoder    Skip ffmpeg and decode in-process only.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn files_and_overrides_are_parsed() {
        let options = parse_args(args(&[
            "--models",
            "/m",
            "--no-transcoder",
            "a.wav",
            "b.ogg",
        ]))
        .unwrap();
        assert_eq!(options.model_dir, Some(PathBuf::from("/m")));
        assert!(options.no_transcoder);
        match options.mode {
            Mode::Classify(files) => {
                assert_eq!(files, vec![PathBuf::from("a.wav"), PathBuf::from("b.ogg")])
            }
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn status_cannot_be_combined_with_files() {
        assert!(parse_args(args(&["--status", "a.wav"])).is_err());
        assert!(matches!(
            parse_args(args(&["--status"])).unwrap().mode,
            Mode::Status
        ));
    }

    #[test]
    fn missing_values_and_unknown_flags_are_errors() {
        assert!(parse_args(args(&["--models"])).is_err());
        let err = parse_args(args(&["--verbose"])).unwrap_err();
        assert!(err.starts_with("Unknown argument: --verbose"));
    }

    #[test]
    fn log_dir_is_parsed_for_every_mode() {
        let options = parse_args(args(&["--log-dir", "/tmp/logs", "--status"])).unwrap();
        assert_eq!(options.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert!(matches!(options.mode, Mode::Status));
        assert!(parse_args(args(&["--log-dir"])).is_err());
    }

    #[test]
    fn no_arguments_shows_help() {
        assert!(matches!(parse_args(Vec::new()).unwrap().mode, Mode::Help));
    }
}
