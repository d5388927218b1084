use std::borrow::Cow;

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use rayon::prelude::*;

use crate::{
    config::{SegmenterConfig, SkinColorSpace},
    types::Frame,
};

const FOREGROUND: u8 = 255;
const BINARIZE_LEVEL: u8 = 128;

/// Binary skin mask at processing resolution.
#[derive(Clone, Debug)]
pub struct SkinMask {
    pub image: GrayImage,
    /// Processing width divided by the source frame width.
    pub scale: f32,
}

impl SkinMask {
    fn empty(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width.max(1), height.max(1)),
            scale: 1.0,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn foreground_pixels(&self) -> usize {
        self.image.as_raw().iter().filter(|&&v| v != 0).count()
    }
}

#[derive(Clone, Debug)]
pub struct SkinSegmenter {
    config: SegmenterConfig,
}

impl SkinSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn segment(&self, frame: &Frame) -> SkinMask {
        if !frame.is_well_formed() {
            log::debug!(
                "frame buffer does not match {}x{}, treating as background",
                frame.width,
                frame.height
            );
            return SkinMask::empty(frame.width, frame.height);
        }

        let (rgb, width, height, scale) = match self.downscale(frame) {
            Ok(scaled) => scaled,
            Err(err) => {
                log::warn!("downscale failed, segmenting at full resolution: {err:?}");
                (Cow::Borrowed(frame.rgb.as_slice()), frame.width, frame.height, 1.0)
            }
        };

        let mut mask = vec![0u8; width as usize * height as usize];
        mask.par_iter_mut()
            .zip(rgb.par_chunks_exact(3))
            .for_each(|(dst, px)| {
                if self.is_skin([px[0], px[1], px[2]]) {
                    *dst = FOREGROUND;
                }
            });

        let Some(mut image) = GrayImage::from_raw(width, height, mask) else {
            return SkinMask::empty(width, height);
        };

        if self.config.blur_sigma > 0.0 {
            image = gaussian_blur_f32(&image, self.config.blur_sigma);
            for px in image.pixels_mut() {
                px.0[0] = if px.0[0] >= BINARIZE_LEVEL { FOREGROUND } else { 0 };
            }
        }

        SkinMask { image, scale }
    }

    pub fn is_skin(&self, rgb: [u8; 3]) -> bool {
        let cfg = &self.config;
        let hsv = || within(rgb_to_hsv(rgb), cfg.hsv_lower, cfg.hsv_upper);
        let ycrcb = || within(rgb_to_ycrcb(rgb), cfg.ycrcb_lower, cfg.ycrcb_upper);
        match cfg.color_space {
            SkinColorSpace::Hsv => hsv(),
            SkinColorSpace::Ycrcb => ycrcb(),
            SkinColorSpace::Both => hsv() && ycrcb(),
        }
    }

    fn downscale<'a>(&self, frame: &'a Frame) -> Result<(Cow<'a, [u8]>, u32, u32, f32)> {
        let target = self.config.processing_width;
        if frame.width <= target {
            return Ok((Cow::Borrowed(frame.rgb.as_slice()), frame.width, frame.height, 1.0));
        }

        let scale = target as f32 / frame.width as f32;
        let new_w = target;
        let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;

        let src_image = fir::images::Image::from_vec_u8(
            frame.width,
            frame.height,
            frame.rgb.clone(),
            fir::PixelType::U8x3,
        )?;
        let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x3);
        let mut resizer = fir::Resizer::new();
        let resize_options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
        resizer
            .resize(&src_image, &mut dst_image, Some(&resize_options))
            .context("fast resize failed")?;

        Ok((Cow::Owned(dst_image.into_vec()), new_w, new_h, scale))
    }
}

fn within(value: [u8; 3], lower: [u8; 3], upper: [u8; 3]) -> bool {
    (0..3).all(|c| value[c] >= lower[c] && value[c] <= upper[c])
}

/// 8-bit HSV with hue halved into 0..180.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { 255.0 * delta / max };
    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().clamp(0.0, 179.0) as u8,
        s.round().clamp(0.0, 255.0) as u8,
        max as u8,
    ]
}

/// Stored as `[Y, Cr, Cb]`, chroma offset by 128.
pub fn rgb_to_ycrcb([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let y = 0.299 * rf + 0.587 * gf + 0.114 * bf;
    let cr = (rf - y) * 0.713 + 128.0;
    let cb = (bf - y) * 0.564 + 128.0;
    [
        y.round().clamp(0.0, 255.0) as u8,
        cr.round().clamp(0.0, 255.0) as u8,
        cb.round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const SKIN: [u8; 3] = [200, 150, 120];
    const BACKGROUND: [u8; 3] = [30, 60, 200];

    fn segmenter() -> SkinSegmenter {
        SkinSegmenter::new(SegmenterConfig::default())
    }

    fn solid_frame(width: u32, height: u32, color: [u8; 3]) -> Frame {
        Frame::from_image(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn converts_to_hsv_like_opencv() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
    }

    #[test]
    fn skin_tone_passes_both_color_spaces() {
        let seg = segmenter();
        assert!(seg.is_skin(SKIN));
        assert!(!seg.is_skin(BACKGROUND));
        assert!(!seg.is_skin([0, 255, 0]));
    }

    #[test]
    fn background_frame_yields_empty_mask() {
        let mask = segmenter().segment(&solid_frame(64, 48, BACKGROUND));
        assert_eq!((mask.width(), mask.height()), (64, 48));
        assert_eq!(mask.foreground_pixels(), 0);
    }

    #[test]
    fn wide_frames_are_downscaled() {
        let mask = segmenter().segment(&solid_frame(640, 480, SKIN));
        assert_eq!((mask.width(), mask.height()), (320, 240));
        assert!((mask.scale - 0.5).abs() < 1e-6);
        assert!(mask.foreground_pixels() > 320 * 240 * 9 / 10);
    }

    #[test]
    fn malformed_frame_is_background() {
        let frame = Frame::new(vec![200; 10], 4, 4);
        assert_eq!(segmenter().segment(&frame).foreground_pixels(), 0);
    }

    #[test]
    fn blur_removes_isolated_speckle() {
        let mut image = RgbImage::from_pixel(32, 32, Rgb(BACKGROUND));
        image.put_pixel(16, 16, Rgb(SKIN));
        let mask = segmenter().segment(&Frame::from_image(image));
        assert_eq!(mask.foreground_pixels(), 0);
    }
}
