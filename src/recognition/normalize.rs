use crate::types::{LandmarkFrame, NormalizedFeatureVector, WRIST};

/// Translates every landmark so the wrist sits at the origin.
///
/// Output is `[x0, y0, x1, y1, ...]` in landmark order, so its length is always
/// twice the frame's point count and entries 0 and 1 are exactly zero. Frames
/// are validated by the recognizer before they reach this point.
pub fn normalize_landmarks(frame: &LandmarkFrame) -> NormalizedFeatureVector {
    let points = frame.points();
    let Some(wrist) = points.get(WRIST).copied() else {
        return NormalizedFeatureVector::from_values(Vec::new());
    };

    let mut values = Vec::with_capacity(points.len() * 2);
    for p in points {
        values.push(p.x - wrist.x);
        values.push(p.y - wrist.y);
    }
    NormalizedFeatureVector::from_values(values)
}
