mod cli;

use std::{io::BufRead, thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use contour_gestures::{
    FeatureExtractor, FrameSource, GestureStore, HandPipeline, PipelineConfig, SessionCommand,
    SessionController, SessionEvent,
    pipeline::{ImageSequence, overlay::OverlayWriter},
};
use crossbeam_channel::{Sender, unbounded};
use indicatif::{ProgressBar, ProgressStyle};

use cli::{AppArgs, parse_command};

fn main() -> Result<()> {
    env_logger::init();
    let args = AppArgs::parse();

    if args.list_cameras {
        return list_cameras();
    }

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(length) = args.recording_length {
        config.session.recording_length = length;
        config.validate()?;
    }

    let store = GestureStore::load(&args.store);
    let pipeline = HandPipeline::new(&config);

    let (command_tx, command_rx) = unbounded();
    spawn_command_reader(command_tx);

    let mut source = open_source(&args)?;

    let reason = match &args.overlay_dir {
        Some(dir) => {
            let extractor = OverlayWriter::new(pipeline, dir)?;
            run_session(extractor, store, &config, source.as_mut(), &command_rx)
        }
        None => run_session(pipeline, store, &config, source.as_mut(), &command_rx),
    };
    log::info!("session ended: {reason:?}");

    Ok(())
}

fn run_session<E: FeatureExtractor>(
    extractor: E,
    store: GestureStore,
    config: &PipelineConfig,
    source: &mut dyn FrameSource,
    commands: &crossbeam_channel::Receiver<SessionCommand>,
) -> contour_gestures::StopReason {
    let mut session = SessionController::new(extractor, store, config);
    let mut reporter = Reporter::default();
    session.run(source, commands, |event| reporter.report(event))
}

/// Keeps the frame source alive together with the capture thread feeding it.
struct OpenedSource {
    source: Box<dyn FrameSource>,
    #[cfg(feature = "camera-nokhwa")]
    _camera: Option<contour_gestures::pipeline::CameraStream>,
}

impl OpenedSource {
    fn as_mut(&mut self) -> &mut dyn FrameSource {
        self.source.as_mut()
    }
}

fn open_source(args: &AppArgs) -> Result<OpenedSource> {
    if let Some(dir) = &args.frames {
        return Ok(OpenedSource {
            source: Box::new(ImageSequence::open(dir)?),
            #[cfg(feature = "camera-nokhwa")]
            _camera: None,
        });
    }

    #[cfg(feature = "camera-nokhwa")]
    {
        use contour_gestures::pipeline::start_camera_stream;
        use nokhwa::utils::CameraIndex;

        let (frame_tx, frame_rx) = crossbeam_channel::bounded(1);
        let camera = start_camera_stream(CameraIndex::Index(args.camera), frame_tx)?;
        Ok(OpenedSource {
            source: Box::new(frame_rx),
            _camera: Some(camera),
        })
    }

    #[cfg(not(feature = "camera-nokhwa"))]
    {
        anyhow::bail!("built without camera support; pass --frames <dir>")
    }
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = contour_gestures::pipeline::available_cameras()?;
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for camera in cameras {
        println!("{}", camera.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    anyhow::bail!("built without camera support")
}

fn spawn_command_reader(command_tx: Sender<SessionCommand>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    log::warn!("stopped reading commands: {err}");
                    return;
                }
            };
            match parse_command(&line) {
                Some(Ok(command)) => {
                    if command_tx.send(command).is_err() {
                        return;
                    }
                }
                Some(Err(message)) => eprintln!("{message}"),
                None => {}
            }
        }
    });
}

/// Turns session events into terminal output.
#[derive(Default)]
struct Reporter {
    progress: Option<ProgressBar>,
    last_status: Option<String>,
}

impl Reporter {
    fn report(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Frame(result) => match (&result.recording, &self.progress) {
                (Some(recording), Some(pb)) => pb.set_position(recording.count as u64),
                _ => {
                    let status = result.display_text();
                    if self.last_status.as_deref() != Some(status.as_str()) {
                        println!("{status}");
                        self.last_status = Some(status);
                    }
                }
            },
            SessionEvent::RecordingStarted { label, total } => {
                self.progress = Some(create_progress_bar(&label, total));
            }
            SessionEvent::RecordingSaved { label, samples } => {
                self.finish_progress(format!("saved {samples} samples for '{label}'"));
            }
            SessionEvent::StoreSaveFailed { label, error } => {
                self.finish_progress(format!("'{label}' kept in memory only: {error}"));
            }
            SessionEvent::RecordingCancelled { label, discarded } => {
                if let Some(pb) = self.progress.take() {
                    pb.abandon_with_message(format!("cancelled '{label}'"));
                }
                println!("discarded {discarded} samples for '{label}'");
            }
            SessionEvent::CommandRejected { reason, .. } => eprintln!("{reason}"),
            SessionEvent::Library(entries) => {
                if entries.is_empty() {
                    println!("gesture library is empty");
                }
                for (label, samples) in entries {
                    println!("{label}: {samples} samples");
                }
            }
            SessionEvent::Stopped(_) => {
                if let Some(pb) = self.progress.take() {
                    pb.abandon_with_message("recording discarded");
                }
            }
        }
    }

    fn finish_progress(&mut self, message: String) {
        match self.progress.take() {
            Some(pb) => pb.finish_with_message(message),
            None => println!("{message}"),
        }
        self.last_status = None;
    }
}

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} {prefix} [{wide_bar:.cyan/blue}] {pos}/{len} {msg}";

fn create_progress_bar(label: &str, total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(format!("recording '{label}'"));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
