use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;

use crate::types::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Pull-based frame supply. `None` means the source is exhausted.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Blocks until the producer sends a frame or hangs up.
impl FrameSource for Receiver<Frame> {
    fn next_frame(&mut self) -> Option<Frame> {
        self.recv().ok()
    }
}

pub struct FrameIter<I>(pub I);

impl<I: Iterator<Item = Frame>> FrameSource for FrameIter<I> {
    fn next_frame(&mut self) -> Option<Frame> {
        self.0.next()
    }
}

/// Replays the images of a directory in file-name order.
#[derive(Debug)]
pub struct ImageSequence {
    paths: VecDeque<PathBuf>,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        log::info!("replaying {} frames from {}", paths.len(), dir.display());
        Ok(Self {
            paths: paths.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Option<Frame> {
        while let Some(path) = self.paths.pop_front() {
            match image::open(&path) {
                Ok(img) => return Some(Frame::from_image(img.to_rgb8())),
                Err(err) => log::warn!("skipping unreadable frame {}: {err}", path.display()),
            }
        }
        None
    }
}
