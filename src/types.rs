use std::time::Instant;

use image::RgbImage;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgb: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgb,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    /// True when the pixel buffer holds exactly `width * height` RGB triples.
    pub fn is_well_formed(&self) -> bool {
        let expected = (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(3);
        expected > 0 && self.rgb.len() == expected
    }

    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.rgb.clone())
    }

    /// Horizontal flip so the preview behaves like a mirror.
    pub fn mirror(&mut self) {
        let stride = self.width as usize * 3;
        if stride == 0 {
            return;
        }
        for row in self.rgb.chunks_exact_mut(stride) {
            let (mut left, mut right) = (0usize, self.width as usize - 1);
            while left < right {
                for c in 0..3 {
                    row.swap(left * 3 + c, right * 3 + c);
                }
                left += 1;
                right -= 1;
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingProgress {
    pub label: String,
    pub count: usize,
    pub total: usize,
}

impl RecordingProgress {
    pub fn is_complete(&self) -> bool {
        self.count >= self.total
    }
}

/// Per-frame report handed to whoever drives the session.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameResult {
    pub candidate_found: bool,
    pub finger_count: Option<u32>,
    pub matched_label: Option<String>,
    pub confidence: Option<f32>,
    pub recording: Option<RecordingProgress>,
}

impl FrameResult {
    pub fn no_candidate() -> Self {
        Self {
            candidate_found: false,
            finger_count: None,
            matched_label: None,
            confidence: None,
            recording: None,
        }
    }

    pub fn display_text(&self) -> String {
        if let Some(progress) = &self.recording {
            return format!(
                "recording '{}' {}/{}",
                progress.label, progress.count, progress.total
            );
        }
        if !self.candidate_found {
            return "no hand".to_string();
        }
        let fingers = self.finger_count.unwrap_or(0);
        match (&self.matched_label, self.confidence) {
            (Some(label), Some(confidence)) => {
                format!("{label} ({:.0}%) | fingers: {fingers}", confidence * 100.0)
            }
            (Some(label), None) => format!("{label} | fingers: {fingers}"),
            _ => format!("unknown gesture | fingers: {fingers}"),
        }
    }
}
