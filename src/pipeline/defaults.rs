use crate::error::AdviceError;
use crate::feedback::AdvicePrompt;
use crate::pipeline::traits::{AdviceFuture, AdviceProvider};

/// Static ASL fingerspelling letters; J and Z involve motion and are excluded.
pub const STATIC_ALPHABET: &str = "ABCDEFGHIKLMNOPQRSTUVWXY";

/// Offline advice provider that answers from a fixed handshape table.
///
/// Useful as a stand-in for a hosted text model, or as the provider of
/// last resort when no network capability is configured.
pub struct LocalCoach;

impl LocalCoach {
    pub fn handshape(letter: &str) -> Option<&'static str> {
        let shape = match letter {
            "A" => "a fist with the thumb resting against the side of the index finger",
            "B" => "four fingers straight up and together with the thumb folded across the palm",
            "C" => "fingers and thumb curved into a C shape",
            "D" => "the index finger up while the other fingertips touch the thumb",
            "E" => "fingertips curled down to rest on the thumb tucked under them",
            "F" => "index finger and thumb touching in a circle with the other three fingers up",
            "G" => "index finger and thumb pointing sideways, parallel to each other",
            "H" => "index and middle fingers together pointing sideways",
            "I" => "only the pinky raised from a fist",
            "K" => "index and middle fingers up in a V with the thumb between them",
            "L" => "index finger up and thumb out, forming an L",
            "M" => "the thumb tucked under the first three fingers",
            "N" => "the thumb tucked under the first two fingers",
            "O" => "all fingertips meeting the thumb in a round O",
            "P" => "a K handshape pointed downward",
            "Q" => "a G handshape pointed downward",
            "R" => "index and middle fingers crossed",
            "S" => "a fist with the thumb across the front of the fingers",
            "T" => "the thumb tucked between the index and middle fingers",
            "U" => "index and middle fingers up and pressed together",
            "V" => "index and middle fingers up and spread apart",
            "W" => "index, middle and ring fingers up and spread",
            "X" => "the index finger hooked from a fist",
            "Y" => "thumb and pinky extended, other fingers folded",
            _ => return None,
        };
        Some(shape)
    }

    pub fn tip(prompt: &AdvicePrompt) -> Result<String, AdviceError> {
        let request = &prompt.request;
        let target = request.target_label.as_str();
        let Some(shape) = Self::handshape(target) else {
            return Err(AdviceError::unavailable(format!(
                "no handshape on file for {target:?}"
            )));
        };

        if request.stable_label == target {
            return Ok(format!(
                "Nice {target}! Hold it steady: {target} is {shape}."
            ));
        }
        let seen = request.stable_label.as_str();
        Ok(match Self::handshape(seen) {
            Some(seen_shape) => format!(
                "That looks like {seen} ({seen_shape}). For {target}, make {shape}."
            ),
            None => format!("For {target}, make {shape}."),
        })
    }
}

impl AdviceProvider for LocalCoach {
    fn advise(&self, prompt: AdvicePrompt) -> AdviceFuture {
        Box::pin(async move { Self::tip(&prompt) })
    }
}
