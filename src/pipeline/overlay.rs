use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_line_segment_mut},
    point::Point,
};

use super::{FeatureExtractor, HandAnalysis, HandGeometry};
use crate::types::Frame;

const CONTOUR_COLOR: Rgb<u8> = Rgb([56, 189, 248]);
const HULL_COLOR: Rgb<u8> = Rgb([16, 185, 129]);
const VALLEY_COLOR: Rgb<u8> = Rgb([248, 113, 113]);
const HULL_THICKNESS: i32 = 3;
const VALLEY_RADIUS: i32 = 5;

/// Draws contour, hull and accepted valleys onto the full-size frame.
pub fn draw_hand_overlay(frame: &mut Frame, geometry: &HandGeometry) {
    if !frame.is_well_formed() {
        return;
    }
    let Some(mut canvas) = frame.to_image() else {
        return;
    };
    let inv = if geometry.scale > 0.0 {
        1.0 / geometry.scale
    } else {
        1.0
    };
    let project = |p: Point<i32>| (p.x as f32 * inv, p.y as f32 * inv);

    let contour: Vec<(f32, f32)> = geometry.contour.iter().copied().map(project).collect();
    draw_closed_path(&mut canvas, &contour, CONTOUR_COLOR, 1);

    let hull: Vec<(f32, f32)> = geometry
        .hull
        .iter()
        .filter_map(|&i| geometry.contour.get(i).copied())
        .map(project)
        .collect();
    draw_closed_path(&mut canvas, &hull, HULL_COLOR, HULL_THICKNESS);

    for valley in &geometry.valleys {
        let (x, y) = project(valley.far);
        draw_filled_circle_mut(
            &mut canvas,
            (x.round() as i32, y.round() as i32),
            VALLEY_RADIUS,
            VALLEY_COLOR,
        );
    }

    frame.rgb = canvas.into_raw();
}

/// Extractor wrapper that saves every frame, annotated when a hand was
/// found, as a numbered PNG.
pub struct OverlayWriter<E> {
    inner: E,
    dir: PathBuf,
    written: u64,
}

impl<E: FeatureExtractor> OverlayWriter<E> {
    pub fn new(inner: E, dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create overlay directory {}", dir.display()))?;
        Ok(Self {
            inner,
            dir: dir.to_path_buf(),
            written: 0,
        })
    }
}

impl<E: FeatureExtractor> FeatureExtractor for OverlayWriter<E> {
    fn extract(&mut self, frame: &Frame) -> Option<HandAnalysis> {
        let analysis = self.inner.extract(frame);

        let mut annotated = frame.clone();
        if let Some(geometry) = analysis.as_ref().and_then(|a| a.geometry.as_ref()) {
            draw_hand_overlay(&mut annotated, geometry);
        }

        self.written += 1;
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        if let Some(image) = annotated.to_image() {
            if let Err(err) = image.save(&path) {
                log::warn!("failed to write overlay {}: {err}", path.display());
            }
        }

        analysis
    }
}

fn draw_closed_path(
    canvas: &mut RgbImage,
    points: &[(f32, f32)],
    color: Rgb<u8>,
    thickness: i32,
) {
    if points.len() < 2 {
        return;
    }
    let radius = (thickness.max(1) - 1) / 2;
    for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() > radius {
                    continue;
                }
                let (ox, oy) = (ox as f32, oy as f32);
                draw_line_segment_mut(canvas, (a.0 + ox, a.1 + oy), (b.0 + ox, b.1 + oy), color);
            }
        }
    }
}
