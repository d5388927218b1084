use std::path::PathBuf;

use clap::Parser;
use contour_gestures::SessionCommand;

/// Contour-based hand gesture recorder and recognizer.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct AppArgs {
    /// Gesture library file.
    #[arg(long, default_value = "gesture_data.json")]
    pub store: PathBuf,
    /// Optional JSON pipeline config; missing keys keep their defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Replay PNG/JPEG frames from this directory instead of a camera.
    #[arg(long)]
    pub frames: Option<PathBuf>,
    /// Camera index to capture from.
    #[arg(long, default_value_t = 0)]
    pub camera: u32,
    /// Print available cameras and exit.
    #[arg(long, default_value_t = false)]
    pub list_cameras: bool,
    /// Write every processed frame, annotated, into this directory.
    #[arg(long)]
    pub overlay_dir: Option<PathBuf>,
    /// Samples collected per recording (overrides the config file).
    #[arg(long)]
    pub recording_length: Option<usize>,
}

/// Parses one line typed on stdin. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Result<SessionCommand, String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some(match word.to_ascii_lowercase().as_str() {
        "record" | "r" => Ok(SessionCommand::StartRecording(rest.trim().to_string())),
        "cancel" | "c" => Ok(SessionCommand::CancelRecording),
        "list" | "l" => Ok(SessionCommand::ListGestures),
        "quit" | "q" | "exit" => Ok(SessionCommand::Quit),
        other => Err(format!(
            "unknown command '{other}' (expected record <label>, cancel, list or quit)"
        )),
    })
}
