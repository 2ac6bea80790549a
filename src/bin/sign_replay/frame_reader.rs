use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use fingerspell::{LandmarkFrame, Point2, RecognitionError};
use serde::Deserialize;

/// One line of a capture file.
#[derive(Debug, Deserialize)]
struct CapturedFrame {
    #[serde(default)]
    hand_present: Option<bool>,
    #[serde(default)]
    landmarks: Option<CapturedLandmarks>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CapturedLandmarks {
    Pairs(Vec<[f32; 2]>),
    Flat(Vec<f32>),
}

#[derive(Debug)]
pub struct ReplayFrame {
    pub line: usize,
    pub hand_present: bool,
    /// Landmarks that cannot form a frame are kept as the error so the replay
    /// can count the line as rejected.
    pub landmarks: Result<Option<LandmarkFrame>, RecognitionError>,
}

/// Reads a JSON-lines capture. Blank lines are skipped; `hand_present`
/// defaults to whether landmarks were recorded.
pub fn read_frames(path: &Path) -> Result<Vec<ReplayFrame>, String> {
    let file = File::open(path)
        .map_err(|err| format!("Failed to open capture '{}': {err}", path.display()))?;
    let mut frames = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|err| {
            format!("Failed to read capture '{}' line {line_no}: {err}", path.display())
        })?;
        if line.trim().is_empty() {
            continue;
        }
        frames.push(parse_frame(&line, line_no).map_err(|err| {
            format!("Invalid frame in '{}' line {line_no}: {err}", path.display())
        })?);
    }
    Ok(frames)
}

fn parse_frame(line: &str, line_no: usize) -> Result<ReplayFrame, serde_json::Error> {
    let captured: CapturedFrame = serde_json::from_str(line)?;
    let recorded = captured.landmarks.is_some();
    let landmarks = captured
        .landmarks
        .map(|l| match l {
            CapturedLandmarks::Pairs(pairs) => Ok(LandmarkFrame::new(
                pairs.into_iter().map(|[x, y]| Point2::new(x, y)).collect(),
            )),
            CapturedLandmarks::Flat(values) => LandmarkFrame::from_flat(&values),
        })
        .transpose();
    Ok(ReplayFrame {
        line: line_no,
        hand_present: captured.hand_present.unwrap_or(recorded),
        landmarks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_len(frame: &ReplayFrame) -> Option<usize> {
        frame
            .landmarks
            .as_ref()
            .expect("well-formed landmarks")
            .as_ref()
            .map(LandmarkFrame::len)
    }

    #[test]
    fn parses_pairs_flat_and_gaps() {
        let pairs = parse_frame(r#"{"landmarks": [[0.1, 0.2], [0.3, 0.4]]}"#, 1).expect("pairs");
        assert!(pairs.hand_present);
        assert_eq!(frame_len(&pairs), Some(2));

        let flat = parse_frame(r#"{"hand_present": true, "landmarks": [0.1, 0.2, 0.3, 0.4]}"#, 2)
            .expect("flat");
        assert_eq!(frame_len(&flat), Some(2));

        let gap = parse_frame(r#"{"hand_present": false}"#, 3).expect("gap");
        assert!(!gap.hand_present);
        assert_eq!(frame_len(&gap), None);

        let empty = parse_frame("{}", 4).expect("empty");
        assert!(!empty.hand_present);
    }

    #[test]
    fn odd_flat_landmarks_are_kept_as_an_error() {
        let values = vec!["0.5"; 43].join(", ");
        let line = format!(r#"{{"landmarks": [{values}]}}"#);
        let frame = parse_frame(&line, 5).expect("line parses");
        assert!(frame.hand_present);
        assert!(matches!(
            frame.landmarks,
            Err(RecognitionError::UnpairedCoordinate { values: 43 })
        ));
    }
}
