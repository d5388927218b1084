use std::mem;

use crossbeam_channel::{Receiver, TryRecvError};
use thiserror::Error;

use crate::{
    config::PipelineConfig,
    matcher::{MatchOutcome, Matcher},
    pipeline::{FeatureExtractor, FeatureVector, FrameSource},
    store::GestureStore,
    types::{Frame, FrameResult, RecordingProgress},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    StartRecording(String),
    CancelRecording,
    ListGestures,
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandRejection {
    #[error("gesture label must not be empty")]
    EmptyLabel,
    #[error("already recording '{0}'")]
    AlreadyRecording(String),
    #[error("no recording in progress")]
    NotRecording,
    #[error("session has stopped")]
    Stopped,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Idle,
    Recording {
        label: String,
        buffer: Vec<FeatureVector>,
    },
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Quit,
    SourceExhausted,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Frame(FrameResult),
    RecordingStarted {
        label: String,
        total: usize,
    },
    RecordingSaved {
        label: String,
        samples: usize,
    },
    RecordingCancelled {
        label: String,
        discarded: usize,
    },
    StoreSaveFailed {
        label: String,
        error: String,
    },
    CommandRejected {
        command: SessionCommand,
        reason: CommandRejection,
    },
    Library(Vec<(String, usize)>),
    Stopped(StopReason),
}

/// Owns the gesture store and drives the Idle/Recording state machine, one
/// frame at a time.
pub struct SessionController<E> {
    extractor: E,
    store: GestureStore,
    matcher: Matcher,
    recording_length: usize,
    state: SessionState,
}

impl<E: FeatureExtractor> SessionController<E> {
    pub fn new(extractor: E, store: GestureStore, config: &PipelineConfig) -> Self {
        Self {
            extractor,
            store,
            matcher: Matcher::new(config.matcher.clone()),
            recording_length: config.session.recording_length.max(1),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &GestureStore {
        &self.store
    }

    pub fn into_store(self) -> GestureStore {
        self.store
    }

    /// Labels are trimmed and lower-cased before use.
    pub fn start_recording(&mut self, label: &str) -> Result<String, CommandRejection> {
        match &self.state {
            SessionState::Recording { label, .. } => {
                return Err(CommandRejection::AlreadyRecording(label.clone()));
            }
            SessionState::Stopped => return Err(CommandRejection::Stopped),
            SessionState::Idle => {}
        }

        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return Err(CommandRejection::EmptyLabel);
        }

        log::info!(
            "recording {} samples for '{label}'",
            self.recording_length
        );
        self.state = SessionState::Recording {
            label: label.clone(),
            buffer: Vec::with_capacity(self.recording_length),
        };
        Ok(label)
    }

    /// Drops the partial buffer and returns `(label, discarded)`.
    pub fn cancel_recording(&mut self) -> Result<(String, usize), CommandRejection> {
        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Recording { label, buffer } => {
                log::info!("discarding {} samples for '{label}'", buffer.len());
                Ok((label, buffer.len()))
            }
            other => {
                let reason = if other == SessionState::Stopped {
                    CommandRejection::Stopped
                } else {
                    CommandRejection::NotRecording
                };
                self.state = other;
                Err(reason)
            }
        }
    }

    pub fn library(&self) -> Vec<(String, usize)> {
        self.store
            .all()
            .map(|(label, samples)| (label.to_string(), samples.len()))
            .collect()
    }

    pub fn handle_command(&mut self, command: SessionCommand) -> SessionEvent {
        let outcome = match &command {
            SessionCommand::StartRecording(label) => {
                self.start_recording(label)
                    .map(|label| SessionEvent::RecordingStarted {
                        label,
                        total: self.recording_length,
                    })
            }
            SessionCommand::CancelRecording => self
                .cancel_recording()
                .map(|(label, discarded)| SessionEvent::RecordingCancelled { label, discarded }),
            SessionCommand::ListGestures => Ok(SessionEvent::Library(self.library())),
            SessionCommand::Quit => {
                self.stop();
                Ok(SessionEvent::Stopped(StopReason::Quit))
            }
        };

        outcome.unwrap_or_else(|reason| {
            log::warn!("rejected {command:?}: {reason}");
            SessionEvent::CommandRejected { command, reason }
        })
    }

    /// Runs one frame through the pipeline and applies at most one state
    /// transition. The first event is always the frame report.
    pub fn process_frame(&mut self, frame: &Frame) -> Vec<SessionEvent> {
        if matches!(self.state, SessionState::Stopped) {
            return Vec::new();
        }
        let vector = self.extractor.extract(frame).map(|analysis| analysis.vector);
        self.process_vector(vector)
    }

    fn process_vector(&mut self, vector: Option<FeatureVector>) -> Vec<SessionEvent> {
        let Some(vector) = vector else {
            let mut result = FrameResult::no_candidate();
            result.recording = self.progress();
            return vec![SessionEvent::Frame(result)];
        };
        let finger_count = Some(vector.finger_count());

        match &mut self.state {
            SessionState::Recording { label, buffer } => {
                buffer.push(vector);
                let progress = RecordingProgress {
                    label: label.clone(),
                    count: buffer.len(),
                    total: self.recording_length,
                };
                let complete = progress.is_complete();

                let mut events = vec![SessionEvent::Frame(FrameResult {
                    candidate_found: true,
                    finger_count,
                    matched_label: None,
                    confidence: None,
                    recording: Some(progress),
                })];
                if complete {
                    events.extend(self.finish_recording());
                }
                events
            }
            SessionState::Idle => {
                let outcome = self.matcher.match_vector(Some(&vector), &self.store);
                let (matched_label, confidence) = match outcome {
                    MatchOutcome::Matched {
                        label, confidence, ..
                    } => (Some(label), Some(confidence)),
                    MatchOutcome::NoMatch | MatchOutcome::NoDecision => (None, None),
                };
                vec![SessionEvent::Frame(FrameResult {
                    candidate_found: true,
                    finger_count,
                    matched_label,
                    confidence,
                    recording: None,
                })]
            }
            SessionState::Stopped => Vec::new(),
        }
    }

    fn progress(&self) -> Option<RecordingProgress> {
        match &self.state {
            SessionState::Recording { label, buffer } => Some(RecordingProgress {
                label: label.clone(),
                count: buffer.len(),
                total: self.recording_length,
            }),
            _ => None,
        }
    }

    fn finish_recording(&mut self) -> Option<SessionEvent> {
        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Recording { label, buffer } => {
                let samples = buffer.len();
                self.store.put(label.clone(), buffer);
                Some(match self.store.save() {
                    Ok(()) => {
                        log::info!("recorded {samples} samples for '{label}'");
                        SessionEvent::RecordingSaved { label, samples }
                    }
                    Err(err) => {
                        log::error!("recording '{label}' kept in memory only: {err}");
                        SessionEvent::StoreSaveFailed {
                            label,
                            error: err.to_string(),
                        }
                    }
                })
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    fn stop(&mut self) {
        if let SessionState::Recording { label, buffer } =
            mem::replace(&mut self.state, SessionState::Stopped)
        {
            log::info!(
                "session stopped, discarding {} unsaved samples for '{label}'",
                buffer.len()
            );
        }
    }

    /// Poll loop: drain pending commands, pull one frame, process it, repeat
    /// until quit or until the source runs dry.
    pub fn run<S, F>(
        &mut self,
        source: &mut S,
        commands: &Receiver<SessionCommand>,
        mut on_event: F,
    ) -> StopReason
    where
        S: FrameSource + ?Sized,
        F: FnMut(SessionEvent),
    {
        loop {
            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        let event = self.handle_command(command);
                        let quit = event == SessionEvent::Stopped(StopReason::Quit);
                        on_event(event);
                        if quit {
                            return StopReason::Quit;
                        }
                    }
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }

            let Some(frame) = source.next_frame() else {
                log::info!("frame source exhausted");
                self.stop();
                on_event(SessionEvent::Stopped(StopReason::SourceExhausted));
                return StopReason::SourceExhausted;
            };

            for event in self.process_frame(&frame) {
                on_event(event);
            }
        }
    }
}
