use std::f64::consts::FRAC_PI_2;

use imageproc::point::Point;

use crate::config::ConcavityConfig;

/// One concavity between the hull chord `start`–`end` and the contour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Defect {
    pub start: Point<i32>,
    pub end: Point<i32>,
    pub far: Point<i32>,
    pub depth: f64,
}

/// A defect accepted as the gap between two extended fingers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Valley {
    pub depth: f64,
    /// Interior angle at the far point, radians.
    pub angle: f64,
    pub far: Point<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct ConcavityReport {
    pub hull: Vec<usize>,
    pub defects: Vec<Defect>,
    pub valleys: Vec<Valley>,
}

#[derive(Clone, Debug)]
pub struct ConcavityAnalyzer {
    config: ConcavityConfig,
}

impl ConcavityAnalyzer {
    pub fn new(config: ConcavityConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, contour: &[Point<i32>], frame_height: u32) -> ConcavityReport {
        let hull = convex_hull_indices(contour);
        let defects = convexity_defects(contour, &hull);
        let valleys = self.finger_valleys(&defects, frame_height);
        ConcavityReport {
            hull,
            defects,
            valleys,
        }
    }

    /// Keeps defects deep enough, sharper than a right angle and above the
    /// wrist line. Enumeration order is preserved.
    pub fn finger_valleys(&self, defects: &[Defect], frame_height: u32) -> Vec<Valley> {
        let cutoff = self.config.wrist_cutoff * frame_height as f64;

        defects
            .iter()
            .filter_map(|defect| {
                let a = distance(defect.start, defect.far);
                let b = distance(defect.end, defect.far);
                let c = distance(defect.end, defect.start);
                if a == 0.0 || b == 0.0 {
                    return None;
                }

                let cos = ((a * a + b * b - c * c) / (2.0 * a * b)).clamp(-1.0, 1.0);
                let angle = cos.acos();

                let accepted = defect.depth > self.config.depth_threshold
                    && angle < FRAC_PI_2
                    && (defect.far.y as f64) < cutoff;
                accepted.then_some(Valley {
                    depth: defect.depth,
                    angle,
                    far: defect.far,
                })
            })
            .collect()
    }
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

fn cross(o: Point<i32>, a: Point<i32>, b: Point<i32>) -> i64 {
    (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
}

/// Convex hull as indices into `points`, sorted in contour order.
/// Collinear boundary points stay hull vertices, so every notch under a flat
/// hull edge is bounded by its own pair of hull points.
pub fn convex_hull_indices(points: &[Point<i32>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by_key(|&i| (points[i].x, points[i].y));
    order.dedup_by_key(|i| (points[*i].x, points[*i].y));
    if order.len() < 3 {
        order.sort_unstable();
        return order;
    }

    let mut lower: Vec<usize> = Vec::with_capacity(order.len());
    for &i in &order {
        while lower.len() >= 2
            && cross(
                points[lower[lower.len() - 2]],
                points[lower[lower.len() - 1]],
                points[i],
            ) < 0
        {
            lower.pop();
        }
        lower.push(i);
    }

    let mut upper: Vec<usize> = Vec::with_capacity(order.len());
    for &i in order.iter().rev() {
        while upper.len() >= 2
            && cross(
                points[upper[upper.len() - 2]],
                points[upper[upper.len() - 1]],
                points[i],
            ) < 0
        {
            upper.pop();
        }
        upper.push(i);
    }

    lower.pop();
    upper.pop();
    let mut hull = lower;
    hull.extend(upper);
    hull.sort_unstable();
    hull.dedup();
    hull
}

/// For every pair of hull-adjacent contour indices, the contour point
/// between them farthest from their chord. Gaps without depth yield nothing.
pub fn convexity_defects(contour: &[Point<i32>], hull: &[usize]) -> Vec<Defect> {
    let n = contour.len();
    if hull.len() < 3 || n < 4 {
        return Vec::new();
    }

    let mut defects = Vec::new();
    for (k, &s) in hull.iter().enumerate() {
        let e = hull[(k + 1) % hull.len()];
        let span = if e > s { e - s } else { e + n - s };
        if span < 2 {
            continue;
        }

        let start = contour[s];
        let end = contour[e];
        let mut far = start;
        let mut depth = 0.0;
        for step in 1..span {
            let p = contour[(s + step) % n];
            let d = chord_distance(start, end, p);
            if d > depth {
                depth = d;
                far = p;
            }
        }

        if depth > 0.0 {
            defects.push(Defect {
                start,
                end,
                far,
                depth,
            });
        }
    }
    defects
}

fn chord_distance(start: Point<i32>, end: Point<i32>, p: Point<i32>) -> f64 {
    let len = distance(start, end);
    if len == 0.0 {
        return distance(start, p);
    }
    cross(start, end, p).abs() as f64 / len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: i32, y: i32) -> Point<i32> {
        Point::new(x, y)
    }

    fn analyzer() -> ConcavityAnalyzer {
        ConcavityAnalyzer::new(ConcavityConfig {
            depth_threshold: 12.0,
            wrist_cutoff: 0.8,
        })
    }

    fn notched_contour() -> Vec<Point<i32>> {
        vec![pt(0, 0), pt(10, 30), pt(20, 0), pt(20, 40), pt(0, 40)]
    }

    #[test]
    fn hull_skips_concave_point() {
        assert_eq!(convex_hull_indices(&notched_contour()), vec![0, 2, 3, 4]);
    }

    #[test]
    fn hull_keeps_collinear_edge_points() {
        let contour = vec![pt(0, 0), pt(5, 0), pt(10, 0), pt(10, 10), pt(0, 10)];
        assert_eq!(convex_hull_indices(&contour), vec![0, 1, 2, 3, 4]);
    }

    fn two_notches_under_flat_edge() -> Vec<Point<i32>> {
        vec![
            pt(0, 0),
            pt(10, 30),
            pt(20, 0),
            pt(30, 30),
            pt(40, 0),
            pt(40, 40),
            pt(0, 40),
        ]
    }

    #[test]
    fn level_tips_bound_separate_defects() {
        let contour = two_notches_under_flat_edge();
        let hull = convex_hull_indices(&contour);
        assert_eq!(hull, vec![0, 2, 4, 5, 6]);

        let defects = convexity_defects(&contour, &hull);
        let fars: Vec<_> = defects.iter().map(|d| d.far).collect();
        assert_eq!(fars, vec![pt(10, 30), pt(30, 30)]);
        assert!(defects.iter().all(|d| (d.depth - 30.0).abs() < 1e-9));

        let report = analyzer().analyze(&contour, 100);
        assert_eq!(report.valleys.len(), 2);
    }

    #[test]
    fn finds_notch_defect() {
        let contour = notched_contour();
        let hull = convex_hull_indices(&contour);
        let defects = convexity_defects(&contour, &hull);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].far, pt(10, 30));
        assert!((defects[0].depth - 30.0).abs() < 1e-9);
    }

    #[test]
    fn notch_is_a_finger_valley() {
        let report = analyzer().analyze(&notched_contour(), 100);
        assert_eq!(report.valleys.len(), 1);
        let valley = report.valleys[0];
        assert!((valley.angle - 0.8f64.acos()).abs() < 1e-9);
    }

    #[test]
    fn zero_length_leg_is_skipped() {
        let defects = [
            Defect {
                start: pt(10, 10),
                end: pt(30, 10),
                far: pt(10, 10),
                depth: 50.0,
            },
            Defect {
                start: pt(30, 10),
                end: pt(50, 10),
                far: pt(50, 10),
                depth: 50.0,
            },
        ];
        assert!(analyzer().finger_valleys(&defects, 100).is_empty());
    }

    #[test]
    fn accepted_valleys_have_positive_legs() {
        let contour = vec![
            pt(0, 0),
            pt(8, 35),
            pt(16, -5),
            pt(24, 35),
            pt(32, 0),
            pt(32, 60),
            pt(0, 60),
        ];
        let report = analyzer().analyze(&contour, 100);
        assert_eq!(report.valleys.len(), 2);
        for (valley, defect) in report.valleys.iter().zip(&report.defects) {
            assert!(distance(defect.start, valley.far) > 0.0);
            assert!(distance(defect.end, valley.far) > 0.0);
        }
    }

    #[test]
    fn shallow_defect_is_excluded() {
        let shallow = Defect {
            start: pt(0, 0),
            end: pt(20, 0),
            far: pt(10, 30),
            depth: 5.0,
        };
        let deep = Defect { depth: 30.0, ..shallow };
        assert!(analyzer().finger_valleys(&[shallow], 100).is_empty());
        assert_eq!(analyzer().finger_valleys(&[deep], 100).len(), 1);
    }

    #[test]
    fn obtuse_defect_is_excluded() {
        let wide = Defect {
            start: pt(0, 0),
            end: pt(100, 0),
            far: pt(50, 20),
            depth: 20.0,
        };
        assert!(analyzer().finger_valleys(&[wide], 100).is_empty());
    }

    #[test]
    fn defect_below_wrist_line_is_excluded() {
        let low = Defect {
            start: pt(0, 60),
            end: pt(20, 60),
            far: pt(10, 90),
            depth: 30.0,
        };
        assert!(analyzer().finger_valleys(&[low], 100).is_empty());
    }
}
