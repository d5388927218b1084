use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Which color representations vote on a skin pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinColorSpace {
    Hsv,
    Ycrcb,
    Both,
}

/// Bounds are inclusive. HSV uses H in 0..180 and S/V in 0..255, YCrCb is
/// stored as `[Y, Cr, Cb]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub color_space: SkinColorSpace,
    pub hsv_lower: [u8; 3],
    pub hsv_upper: [u8; 3],
    pub ycrcb_lower: [u8; 3],
    pub ycrcb_upper: [u8; 3],
    pub blur_sigma: f32,
    pub processing_width: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            color_space: SkinColorSpace::Both,
            hsv_lower: [0, 48, 80],
            hsv_upper: [20, 255, 255],
            ycrcb_lower: [0, 133, 77],
            ycrcb_upper: [255, 173, 127],
            blur_sigma: 1.5,
            processing_width: 320,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub min_area: f64,
    pub max_area: f64,
    /// Accepted bounding-box width/height band; `None` skips the check.
    pub aspect_ratio: Option<[f64; 2]>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_area: 2_000.0,
            max_area: 60_000.0,
            aspect_ratio: Some([0.35, 1.8]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcavityConfig {
    /// Minimum defect depth in processing-scale pixels.
    pub depth_threshold: f64,
    /// Far points must sit above this fraction of the frame height.
    pub wrist_cutoff: f64,
}

impl Default for ConcavityConfig {
    fn default() -> Self {
        Self {
            depth_threshold: 12.0,
            wrist_cutoff: 0.8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub depth_scale: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { depth_scale: 100.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub recording_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recording_length: 30,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmenter: SegmenterConfig,
    pub selector: SelectorConfig,
    pub concavity: ConcavityConfig,
    pub features: FeatureConfig,
    pub matcher: MatcherConfig,
    pub session: SessionConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        log::info!("loaded pipeline config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let seg = &self.segmenter;
        for c in 0..3 {
            if seg.hsv_lower[c] > seg.hsv_upper[c] || seg.ycrcb_lower[c] > seg.ycrcb_upper[c] {
                bail!("segmenter lower bound exceeds upper bound on channel {c}");
            }
        }
        if !(seg.blur_sigma >= 0.0) {
            bail!("blur_sigma must be non-negative, got {}", seg.blur_sigma);
        }
        if seg.processing_width == 0 {
            bail!("processing_width must be positive");
        }

        let sel = &self.selector;
        if !(sel.min_area >= 0.0) || sel.min_area > sel.max_area {
            bail!(
                "invalid contour area band [{}, {}]",
                sel.min_area,
                sel.max_area
            );
        }
        if let Some([lo, hi]) = sel.aspect_ratio {
            if !(lo > 0.0) || lo > hi {
                bail!("invalid aspect ratio band [{lo}, {hi}]");
            }
        }

        let cav = &self.concavity;
        if !(cav.depth_threshold >= 0.0) {
            bail!("depth_threshold must be non-negative");
        }
        if !(cav.wrist_cutoff > 0.0 && cav.wrist_cutoff <= 1.0) {
            bail!("wrist_cutoff must be in (0, 1], got {}", cav.wrist_cutoff);
        }
        if !(self.features.depth_scale > 0.0) {
            bail!("depth_scale must be positive");
        }
        if !(self.matcher.threshold > 0.0) {
            bail!("matcher threshold must be positive");
        }
        if self.session.recording_length == 0 {
            bail!("recording_length must be at least 1");
        }
        Ok(())
    }
}
