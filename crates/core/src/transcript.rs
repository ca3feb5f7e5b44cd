/// A unit of transcribed speech delivered by a recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub is_final: bool,
}

impl Fragment {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Per-question accumulation of recognizer output.
///
/// `finalized` holds every committed fragment, space-joined, and only ever grows.
/// `interim` is a preview of speech the recognizer has not committed yet; it is
/// replaced wholesale on every interim update and dropped whenever a final
/// fragment arrives. Only `finalized` ever becomes part of an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptAccumulator {
    finalized: String,
    interim: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulator after applying `fragment`.
    #[must_use]
    pub fn apply(mut self, fragment: &Fragment) -> Self {
        self.push(fragment);
        self
    }

    pub fn push(&mut self, fragment: &Fragment) {
        if fragment.is_final {
            let text = fragment.text.trim();
            if !text.is_empty() {
                if !self.finalized.is_empty() {
                    self.finalized.push(' ');
                }
                self.finalized.push_str(text);
            }
            self.interim.clear();
        } else {
            self.interim = fragment.text.clone();
        }
    }

    pub fn finalized(&self) -> &str {
        &self.finalized
    }

    pub fn interim(&self) -> &str {
        &self.interim
    }

    /// The text to show while the user is still speaking.
    pub fn live_text(&self) -> String {
        match (self.finalized.is_empty(), self.interim.trim().is_empty()) {
            (_, true) => self.finalized.clone(),
            (true, false) => self.interim.trim().to_string(),
            (false, false) => format!("{} {}", self.finalized, self.interim.trim()),
        }
    }

    /// The committed answer text, without any interim preview.
    pub fn answer(&self) -> &str {
        self.finalized.trim()
    }

    pub fn is_empty(&self) -> bool {
        self.finalized.is_empty() && self.interim.is_empty()
    }
}

impl<'a> FromIterator<&'a Fragment> for TranscriptAccumulator {
    fn from_iter<T: IntoIterator<Item = &'a Fragment>>(iter: T) -> Self {
        iter.into_iter()
            .fold(TranscriptAccumulator::new(), |acc, fragment| acc.apply(fragment))
    }
}
