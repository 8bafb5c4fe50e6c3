// src/geometry.rs
//
// Pure landmark geometry. Coordinates are normalized image-plane values
// with y growing downward, so "above" means a smaller y.

use crate::types::Point2;

/// Edge vectors shorter than this make an angle indeterminate.
const MIN_EDGE_LENGTH: f32 = 1e-3;

/// Straightness required at the PIP joint of the index finger (degrees).
pub const INDEX_STRAIGHTNESS_DEG: f32 = 150.0;

/// Tip-to-MCP over PIP-to-MCP ratio required for the index finger.
pub const INDEX_EXTENSION_RATIO: f32 = 1.15;

/// How far the tip must sit above the PIP joint.
pub const INDEX_HEIGHT_MARGIN: f32 = 0.02;
pub const FINGER_HEIGHT_MARGIN: f32 = 0.015;

pub fn distance(a: Point2, b: Point2) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Angle at `vertex` between the rays to `p1` and `p2`, in degrees (0..=180).
///
/// Returns `None` when either ray is shorter than 1e-3: the angle is
/// indeterminate, which callers must not read as "straight".
pub fn angle_at(vertex: Point2, p1: Point2, p2: Point2) -> Option<f32> {
    let (ax, ay) = (p1.x - vertex.x, p1.y - vertex.y);
    let (bx, by) = (p2.x - vertex.x, p2.y - vertex.y);

    let mag_a = (ax * ax + ay * ay).sqrt();
    let mag_b = (bx * bx + by * by).sqrt();
    if mag_a < MIN_EDGE_LENGTH || mag_b < MIN_EDGE_LENGTH {
        return None;
    }

    let cos = ((ax * bx + ay * by) / (mag_a * mag_b)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Joints of one finger, tip first. For the thumb the chain is
/// tip, IP, MP, CMC.
#[derive(Debug, Clone, Copy)]
pub struct FingerJoints {
    pub tip: Point2,
    pub dip: Point2,
    pub pip: Point2,
    pub mcp: Point2,
}

/// Extension test strictness. The index finger is the pointer and gets the
/// full four-part test; other fingers only need distance and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    Index,
    Standard,
}

fn progressive_distance(f: &FingerJoints) -> bool {
    let tip = distance(f.tip, f.mcp);
    let dip = distance(f.dip, f.mcp);
    let pip = distance(f.pip, f.mcp);
    tip > dip && dip > pip
}

/// Tip-to-MCP over PIP-to-MCP; `None` when the PIP sits on the MCP.
pub fn extension_ratio(f: &FingerJoints) -> Option<f32> {
    let pip = distance(f.pip, f.mcp);
    if pip < MIN_EDGE_LENGTH {
        return None;
    }
    Some(distance(f.tip, f.mcp) / pip)
}

/// Tip-to-MCP distance over the length of the joint chain. A straight
/// finger scores 1.0 and a folded one approaches 0.
pub fn straightness(f: &FingerJoints) -> Option<f32> {
    let chain = distance(f.mcp, f.pip) + distance(f.pip, f.dip) + distance(f.dip, f.tip);
    if chain < MIN_EDGE_LENGTH {
        return None;
    }
    Some(distance(f.tip, f.mcp) / chain)
}

/// `min_straightness` is the configured finger extension threshold.
pub fn is_finger_extended(f: &FingerJoints, strictness: Strictness, min_straightness: f32) -> bool {
    if !progressive_distance(f) {
        return false;
    }
    if !straightness(f).is_some_and(|s| s >= min_straightness) {
        return false;
    }

    match strictness {
        Strictness::Standard => f.tip.y < f.pip.y - FINGER_HEIGHT_MARGIN,
        Strictness::Index => {
            let height = f.tip.y < f.pip.y - INDEX_HEIGHT_MARGIN;
            let straight = angle_at(f.pip, f.mcp, f.tip)
                .map(|a| a > INDEX_STRAIGHTNESS_DEG)
                .unwrap_or(false);
            let ratio = extension_ratio(f)
                .map(|r| r > INDEX_EXTENSION_RATIO)
                .unwrap_or(false);
            height && straight && ratio
        }
    }
}

/// Same distance chain as an extended finger, but the tip hangs below the
/// second joint. Used for the thumbs-down pose.
pub fn is_finger_pointing_down(f: &FingerJoints) -> bool {
    progressive_distance(f) && f.tip.y > f.pip.y + FINGER_HEIGHT_MARGIN
}
