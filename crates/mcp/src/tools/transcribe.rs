use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use toolwire_core::{InputSchema, Property, ToolDescriptor, ToolError, ToolHandler, ToolOutput};

use crate::config::TranscribeConfig;

pub const NAME: &str = "transcribe_audio";

pub const MODELS: &[&str] = &["tiny", "base", "small", "medium", "large"];

const EXTENSIONS: &[&str] = &["mp3", "mp4", "wav", "m4a", "flac", "ogg", "webm", "mov"];

pub fn definition(config: &TranscribeConfig) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Transcribe an audio or video file with Whisper (language auto-detected)",
        InputSchema::object()
            .required(
                "path",
                Property::string("Absolute path to the audio/video file"),
            )
            .optional(
                "model",
                Property::string("Whisper model size")
                    .one_of(MODELS.iter().copied())
                    .with_default(config.default_model.as_str()),
            ),
    )
}

#[derive(Debug, Deserialize)]
struct TranscribeArgs {
    path: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct Transcript {
    detected_language: Option<String>,
    language_probability: Option<f64>,
    duration: Option<f64>,
    model: Option<String>,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    start: f64,
    end: f64,
    text: String,
}

pub struct TranscribeTool {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl TranscribeTool {
    pub fn new(config: &TranscribeConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, input: &Path, model: &str, out_dir: &Path) -> Result<(), ToolError> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .arg(input)
            .arg("-o")
            .arg(out_dir)
            .arg("-m")
            .arg(model)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(command = %self.command, input = %input.display(), model, "starting transcriber");

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|e| {
                ToolError::failed(format!("failed to start {}: {}", self.command, e))
            })?,
            Err(_) => return Err(ToolError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().rev().find(|l| !l.trim().is_empty());
            return Err(ToolError::failed(format!(
                "transcriber exited with {}{}",
                output.status,
                reason.map(|r| format!(": {}", r.trim())).unwrap_or_default()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ToolHandler for TranscribeTool {
    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: TranscribeArgs = serde_json::from_value(arguments)?;
        let input = PathBuf::from(&args.path);

        check_extension(&input)?;
        let is_file = tokio::fs::metadata(&input)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ToolError::invalid(format!(
                "file not found: {}",
                input.display()
            )));
        }

        let out_dir = tempfile::tempdir()?;
        self.run(&input, &args.model, out_dir.path()).await?;

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let transcript_path = out_dir.path().join(format!("{}.json", stem));
        let content = tokio::fs::read_to_string(&transcript_path)
            .await
            .map_err(|_| ToolError::failed("transcriber finished without writing a transcript"))?;
        let transcript: Transcript = serde_json::from_str(&content)
            .map_err(|e| ToolError::upstream(format!("malformed transcript: {}", e)))?;

        Ok(ToolOutput::text(render(&input, &transcript)))
    }
}

fn check_extension(path: &Path) -> Result<(), ToolError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(ToolError::invalid(format!(
            "unsupported file type '.{}' (expected one of: {})",
            ext,
            EXTENSIONS.join(", ")
        )))
    }
}

fn render(input: &Path, transcript: &Transcript) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let mut header = Vec::new();
    if let Some(lang) = &transcript.detected_language {
        match transcript.language_probability {
            Some(p) => header.push(format!("Language: {} ({:.1}%)", lang, p * 100.0)),
            None => header.push(format!("Language: {}", lang)),
        }
    }
    if let Some(duration) = transcript.duration {
        header.push(format!("Duration: {:.1}s", duration));
    }
    if let Some(model) = &transcript.model {
        header.push(format!("Model: {}", model));
    }

    let mut output = format!("Transcript of {}\n", name);
    if !header.is_empty() {
        output.push_str(&header.join(" | "));
        output.push('\n');
    }
    output.push('\n');

    if transcript.segments.is_empty() {
        output.push_str("(no speech detected)");
        return output;
    }

    let lines: Vec<String> = transcript
        .segments
        .iter()
        .map(|s| {
            format!(
                "[{} --> {}] {}",
                format_timestamp(s.start),
                format_timestamp(s.end),
                s.text.trim()
            )
        })
        .collect();
    output.push_str(&lines.join("\n"));
    output
}

/// SRT timestamp, `HH:MM:SS,mmm`. Sub-millisecond remainders are truncated.
fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    let millis = ((seconds % 1.0) * 1000.0) as u64;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
