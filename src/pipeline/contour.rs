use imageproc::{
    contours::{BorderType, find_contours},
    point::Point,
};

use super::segmenter::SkinMask;
use crate::config::SelectorConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingBox {
    fn of(points: &[Point<i32>]) -> Self {
        let mut bounds = Self {
            min_x: i32::MAX,
            min_y: i32::MAX,
            max_x: i32::MIN,
            max_y: i32::MIN,
        };
        for p in points {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.max_y = bounds.max_y.max(p.y);
        }
        bounds
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y + 1
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height().max(1) as f64
    }
}

#[derive(Clone, Debug)]
pub struct HandCandidate {
    pub contour: Vec<Point<i32>>,
    pub area: f64,
    pub bounds: BoundingBox,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rejection {
    NoContour,
    AreaOutOfRange { area: f64 },
    AspectOutOfRange { ratio: f64 },
}

#[derive(Clone, Debug)]
pub enum Selection {
    Accepted(HandCandidate),
    Rejected(Rejection),
}

impl Selection {
    pub fn candidate(self) -> Option<HandCandidate> {
        match self {
            Selection::Accepted(candidate) => Some(candidate),
            Selection::Rejected(_) => None,
        }
    }
}

/// Picks the largest external skin contour and gates it on area and shape.
#[derive(Clone, Debug)]
pub struct HandContourSelector {
    config: SelectorConfig,
}

impl HandContourSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn select(&self, mask: &SkinMask) -> Selection {
        let largest = find_contours::<i32>(&mask.image)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| {
                let area = polygon_area(&c.points);
                (c.points, area)
            })
            .fold(None::<(Vec<Point<i32>>, f64)>, |best, (points, area)| {
                match best {
                    Some((_, best_area)) if best_area >= area => best,
                    _ => Some((points, area)),
                }
            });

        let Some((contour, area)) = largest else {
            return Selection::Rejected(Rejection::NoContour);
        };

        if area < self.config.min_area || area > self.config.max_area {
            return Selection::Rejected(Rejection::AreaOutOfRange { area });
        }

        let bounds = BoundingBox::of(&contour);
        if let Some([lo, hi]) = self.config.aspect_ratio {
            let ratio = bounds.aspect_ratio();
            if ratio < lo || ratio > hi {
                return Selection::Rejected(Rejection::AspectOutOfRange { ratio });
            }
        }

        Selection::Accepted(HandCandidate {
            contour,
            area,
            bounds,
        })
    }
}

/// Shoelace area of the closed polygon through `points`.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn mask_with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> SkinMask {
        let mut image = GrayImage::new(width, height);
        for &(x0, y0, w, h) in rects {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    image.put_pixel(x, y, Luma([255]));
                }
            }
        }
        SkinMask { image, scale: 1.0 }
    }

    fn selector(min_area: f64, max_area: f64) -> HandContourSelector {
        HandContourSelector::new(SelectorConfig {
            min_area,
            max_area,
            aspect_ratio: Some([0.35, 1.8]),
        })
    }

    #[test]
    fn empty_mask_has_no_candidate() {
        let mask = mask_with_rects(64, 64, &[]);
        assert!(matches!(
            selector(0.0, 1e9).select(&mask),
            Selection::Rejected(Rejection::NoContour)
        ));
    }

    #[test]
    fn accepts_rect_inside_area_band() {
        let mask = mask_with_rects(100, 100, &[(10, 10, 40, 60)]);
        let candidate = selector(1_000.0, 5_000.0).select(&mask).candidate().unwrap();
        assert_eq!(candidate.area, 39.0 * 59.0);
        assert_eq!(candidate.bounds.width(), 40);
        assert_eq!(candidate.bounds.height(), 60);
    }

    #[test]
    fn rejects_small_region() {
        let mask = mask_with_rects(100, 100, &[(10, 10, 10, 10)]);
        assert!(matches!(
            selector(1_000.0, 5_000.0).select(&mask),
            Selection::Rejected(Rejection::AreaOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_arm_like_aspect() {
        let mask = mask_with_rects(100, 100, &[(5, 40, 90, 20)]);
        assert!(matches!(
            selector(1_000.0, 5_000.0).select(&mask),
            Selection::Rejected(Rejection::AspectOutOfRange { .. })
        ));
    }

    #[test]
    fn picks_largest_region() {
        let mask = mask_with_rects(200, 100, &[(5, 5, 20, 20), (100, 10, 50, 70)]);
        let candidate = selector(0.0, 1e9).select(&mask).candidate().unwrap();
        assert_eq!(candidate.bounds.min_x, 100);
    }

    #[test]
    fn shoelace_of_square() {
        let square = [
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 4),
            Point::new(0, 4),
        ];
        assert_eq!(polygon_area(&square), 16.0);
    }
}
