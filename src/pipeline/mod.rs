#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod concavity;
pub mod contour;
pub mod features;
pub mod overlay;
#[cfg(feature = "camera-nokhwa")]
pub mod rgb_converter;
pub mod segmenter;
pub mod source;

use imageproc::point::Point;

#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraDevice, CameraStream, available_cameras, start_camera_stream};
pub use concavity::{ConcavityAnalyzer, Defect, Valley};
pub use contour::{HandContourSelector, Rejection, Selection};
pub use features::{FeatureBuilder, FeatureVector};
pub use segmenter::{SkinMask, SkinSegmenter};
pub use source::{FrameIter, FrameSource, ImageSequence};

use crate::{config::PipelineConfig, types::Frame};

/// Turns one frame into at most one feature vector.
pub trait FeatureExtractor {
    fn extract(&mut self, frame: &Frame) -> Option<HandAnalysis>;
}

/// Contour geometry behind a feature vector, in processing-scale pixels.
#[derive(Clone, Debug)]
pub struct HandGeometry {
    pub contour: Vec<Point<i32>>,
    pub hull: Vec<usize>,
    pub valleys: Vec<Valley>,
    /// Processing width divided by frame width.
    pub scale: f32,
}

#[derive(Clone, Debug)]
pub struct HandAnalysis {
    pub vector: FeatureVector,
    pub geometry: Option<HandGeometry>,
}

impl From<FeatureVector> for HandAnalysis {
    fn from(vector: FeatureVector) -> Self {
        Self {
            vector,
            geometry: None,
        }
    }
}

/// Segmenter → selector → concavity analyzer → feature builder.
#[derive(Clone, Debug)]
pub struct HandPipeline {
    segmenter: SkinSegmenter,
    selector: HandContourSelector,
    analyzer: ConcavityAnalyzer,
    builder: FeatureBuilder,
}

impl HandPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            segmenter: SkinSegmenter::new(config.segmenter.clone()),
            selector: HandContourSelector::new(config.selector.clone()),
            analyzer: ConcavityAnalyzer::new(config.concavity.clone()),
            builder: FeatureBuilder::new(config.features.clone()),
        }
    }

    pub fn analyze(&self, frame: &Frame) -> Option<HandAnalysis> {
        let mask = self.segmenter.segment(frame);
        let candidate = match self.selector.select(&mask) {
            Selection::Accepted(candidate) => candidate,
            Selection::Rejected(reason) => {
                log::debug!("no hand candidate: {reason:?}");
                return None;
            }
        };

        let report = self.analyzer.analyze(&candidate.contour, mask.height());
        let vector = self.builder.build(&report.valleys);
        log::trace!(
            "hand area {:.0}, {} defects, {} valleys",
            candidate.area,
            report.defects.len(),
            report.valleys.len()
        );

        Some(HandAnalysis {
            vector,
            geometry: Some(HandGeometry {
                contour: candidate.contour,
                hull: report.hull,
                valleys: report.valleys,
                scale: mask.scale,
            }),
        })
    }
}

impl FeatureExtractor for HandPipeline {
    fn extract(&mut self, frame: &Frame) -> Option<HandAnalysis> {
        self.analyze(frame)
    }
}
