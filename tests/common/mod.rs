#![allow(dead_code)]

use contour_gestures::Frame;
use image::{Rgb, RgbImage};

pub const SKIN: Rgb<u8> = Rgb([200, 150, 120]);
pub const BACKGROUND: Rgb<u8> = Rgb([30, 60, 200]);

/// 320x240 frame with a palm and three raised fingers separated by deep gaps.
pub fn three_finger_hand() -> Frame {
    let mut img = RgbImage::from_pixel(320, 240, BACKGROUND);
    fill(&mut img, 100..188, 120..220);
    for x0 in [100, 136, 172] {
        fill(&mut img, x0..x0 + 16, 40..120);
    }
    Frame::from_image(img)
}

/// Three fingers of different lengths, tips at y = 50, 30 and 45.
pub fn staggered_hand() -> Frame {
    let mut img = RgbImage::from_pixel(320, 240, BACKGROUND);
    fill(&mut img, 100..188, 120..220);
    for (x0, tip) in [(100, 50), (136, 30), (172, 45)] {
        fill(&mut img, x0..x0 + 16, tip..120);
    }
    Frame::from_image(img)
}

/// Four raised fingers with level tips.
pub fn four_finger_hand() -> Frame {
    let mut img = RgbImage::from_pixel(320, 240, BACKGROUND);
    fill(&mut img, 100..224, 120..220);
    for x0 in [100, 136, 172, 208] {
        fill(&mut img, x0..x0 + 16, 40..120);
    }
    Frame::from_image(img)
}

/// Same scene with the fingers folded down.
pub fn fist() -> Frame {
    let mut img = RgbImage::from_pixel(320, 240, BACKGROUND);
    fill(&mut img, 100..188, 110..220);
    Frame::from_image(img)
}

pub fn empty_scene() -> Frame {
    Frame::from_image(RgbImage::from_pixel(320, 240, BACKGROUND))
}

fn fill(img: &mut RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) {
    for y in ys {
        for x in xs.clone() {
            img.put_pixel(x, y, SKIN);
        }
    }
}
