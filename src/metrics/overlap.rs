//! Overlap between ground-truth boxes and detections.
//!
//! Both functions take the ground truth first. Callers must keep that order
//! even though the formulas are symmetric for well-formed input.

use crate::matching::GtCandidate;
use crate::types::BoxCoords;
use geo::{Area, ConvexHull, Coord, LineString, MultiPoint, Polygon};

/// Polygons with an area below this are treated as degenerate.
const EPS: f64 = 1e-12;

/// Overlap ratio of two axis-aligned boxes given as `[xmin, ymin, xmax, ymax]`.
///
/// This is the intersection area divided by the area of the joint bounding
/// extent of both boxes. It is *not* the usual IoU: the denominator is the
/// smallest rectangle enclosing both boxes, not their union. Reported metrics
/// depend on this exact ratio.
///
/// Touching boxes (zero-width intersection) yield 0.
///
/// # Example
///
/// ```
/// use obb_eval::metrics::overlap::overlap_aligned;
///
/// let gt = [0.0, 0.0, 10.0, 10.0];
/// let det = [5.0, 0.0, 15.0, 10.0];
/// // intersection 5x10, joint extent 15x10
/// assert!((overlap_aligned(&gt, &det) - 50.0 / 150.0).abs() < 1e-12);
/// ```
pub fn overlap_aligned(gt: &[f64; 4], det: &[f64; 4]) -> f64 {
    let dx_int = gt[2].min(det[2]) - gt[0].max(det[0]);
    let dy_int = gt[3].min(det[3]) - gt[1].max(det[1]);

    let dx_ov = gt[2].max(det[2]) - gt[0].min(det[0]);
    let dy_ov = gt[3].max(det[3]) - gt[1].min(det[1]);

    if dx_int < 0.0 || dy_int < 0.0 {
        return 0.0;
    }

    let extent = dx_ov * dy_ov;
    if extent <= 0.0 {
        return 0.0;
    }

    (dx_int * dy_int) / extent
}

/// Intersection over union of two quadrilaterals given as four corner points.
///
/// Corners may be listed clockwise or counter-clockwise. A quadrilateral whose
/// corners are out of order crosses itself and is replaced by the convex hull
/// of its corners. A zero-area quadrilateral on either side yields 0.
///
/// # Example
///
/// ```
/// use obb_eval::metrics::overlap::overlap_oriented;
///
/// let square = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];
/// assert!((overlap_oriented(&square, &square) - 1.0).abs() < 1e-9);
/// ```
pub fn overlap_oriented(gt: &[f64; 8], det: &[f64; 8]) -> f64 {
    let gt_ring = simple_ring(quad_corners(gt));
    let det_ring = simple_ring(quad_corners(det));

    let gt_area = ring_to_polygon(&gt_ring).unsigned_area();
    let det_area = ring_to_polygon(&det_ring).unsigned_area();
    if gt_area < EPS || det_area < EPS {
        return 0.0;
    }

    let gt_parts = convex_parts(&gt_ring);
    let det_parts = convex_parts(&det_ring);
    let intersection: f64 = gt_parts
        .iter()
        .flat_map(|g| {
            det_parts
                .iter()
                .map(move |d| ring_to_polygon(&clip_convex(d, g)).unsigned_area())
        })
        .sum();

    let union = gt_area + det_area - intersection;
    if union < EPS {
        return 0.0;
    }

    (intersection / union).clamp(0.0, 1.0)
}

/// Overlap of a detection with a ground-truth candidate.
///
/// Oriented detections are compared to the candidate's oriented box, aligned
/// ones to its aligned box.
pub fn overlap(gt: &GtCandidate, det: &BoxCoords) -> f64 {
    match det {
        BoxCoords::Aligned(det) => overlap_aligned(&gt.a_bbox, det),
        BoxCoords::Oriented(det) => overlap_oriented(&gt.o_bbox, det),
    }
}

fn quad_corners(coords: &[f64; 8]) -> Vec<Coord<f64>> {
    coords
        .chunks_exact(2)
        .map(|p| Coord { x: p[0], y: p[1] })
        .collect()
}

fn ring_to_polygon(ring: &[Coord<f64>]) -> Polygon<f64> {
    Polygon::new(LineString::from(ring.to_vec()), vec![])
}

fn cross(o: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// A ring is convex when all its turns go the same way; straight turns are ignored.
fn is_convex(ring: &[Coord<f64>]) -> bool {
    let n = ring.len();
    let mut sign = 0.0;
    for i in 0..n {
        let turn = cross(ring[i], ring[(i + 1) % n], ring[(i + 2) % n]);
        if turn == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
    }
    true
}

/// Whether the open segments `p1`-`p2` and `q1`-`q2` properly cross.
fn segments_cross(p1: Coord<f64>, p2: Coord<f64>, q1: Coord<f64>, q2: Coord<f64>) -> bool {
    let d1 = cross(p1, p2, q1);
    let d2 = cross(p1, p2, q2);
    let d3 = cross(q1, q2, p1);
    let d4 = cross(q1, q2, p2);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// Reorders a self-crossing quadrilateral into the convex hull of its corners.
fn simple_ring(ring: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
    let crossed = segments_cross(ring[0], ring[1], ring[2], ring[3])
        || segments_cross(ring[1], ring[2], ring[3], ring[0]);
    if !crossed {
        return ring;
    }

    let hull = MultiPoint::from(ring).convex_hull();
    let mut coords = hull.exterior().0.clone();
    // drop the closing coordinate
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

/// Splits a simple quadrilateral into convex pieces with disjoint interiors.
///
/// A non-convex simple quadrilateral has exactly one reflex corner; cutting
/// along the diagonal from that corner leaves two triangles.
fn convex_parts(ring: &[Coord<f64>]) -> Vec<Vec<Coord<f64>>> {
    let n = ring.len();
    if n != 4 || is_convex(ring) {
        return vec![ring.to_vec()];
    }

    let orientation = signed_area(ring).signum();
    let reflex = (0..n).find(|&i| {
        let turn = cross(ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
        turn != 0.0 && turn.signum() == -orientation
    });
    match reflex {
        Some(r) => vec![
            vec![ring[r], ring[(r + 1) % n], ring[(r + 2) % n]],
            vec![ring[(r + 2) % n], ring[(r + 3) % n], ring[r]],
        ],
        None => vec![ring.to_vec()],
    }
}

fn signed_area(ring: &[Coord<f64>]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

/// Sutherland-Hodgman clipping of `subject` by the convex ring `clip`.
fn clip_convex(subject: &[Coord<f64>], clip: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut clip = clip.to_vec();
    if signed_area(&clip) < 0.0 {
        clip.reverse();
    }

    let mut output = subject.to_vec();
    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let (a, b) = (clip[i], clip[(i + 1) % clip.len()]);
        let input = std::mem::take(&mut output);
        for j in 0..input.len() {
            let current = input[j];
            let previous = input[(j + input.len() - 1) % input.len()];
            let current_in = cross(a, b, current) >= 0.0;
            let previous_in = cross(a, b, previous) >= 0.0;

            if current_in {
                if !previous_in {
                    output.push(line_intersection(previous, current, a, b));
                }
                output.push(current);
            } else if previous_in {
                output.push(line_intersection(previous, current, a, b));
            }
        }
    }
    output
}

/// Point where segment `p`-`q` crosses the line through `a` and `b`.
fn line_intersection(p: Coord<f64>, q: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    let cp = cross(a, b, p);
    let cq = cross(a, b, q);
    let t = cp / (cp - cq);
    Coord {
        x: p.x + t * (q.x - p.x),
        y: p.y + t * (q.y - p.y),
    }
}
