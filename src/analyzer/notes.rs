//! Frequency → note-name mapping.

/// Maps a frequency to a note label with octave, e.g. 440.0 → "A4".
pub trait NoteMapper {
    /// `None` when the frequency cannot be named (non-finite, non-positive).
    fn to_note(&self, frequency_hz: f64) -> Option<String>;
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const MIDI_A4: f64 = 69.0;

/// Twelve-tone equal temperament, sharps only, nearest semitone.
#[derive(Debug, Clone, Copy)]
pub struct EqualTemperament {
    pub a4_hz: f64,
}

impl EqualTemperament {
    pub fn new(a4_hz: f64) -> Self {
        Self { a4_hz }
    }

    /// Fractional MIDI note number for a frequency.
    pub fn midi(&self, frequency_hz: f64) -> f64 {
        12.0 * (frequency_hz / self.a4_hz).log2() + MIDI_A4
    }
}

impl Default for EqualTemperament {
    fn default() -> Self {
        Self::new(440.0)
    }
}

impl NoteMapper for EqualTemperament {
    fn to_note(&self, frequency_hz: f64) -> Option<String> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return None;
        }
        let midi = self.midi(frequency_hz).round() as i64;
        let octave = midi.div_euclid(12) - 1;
        let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
        Some(format!("{name}{octave}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitches() {
        let et = EqualTemperament::default();
        assert_eq!(et.to_note(440.0).as_deref(), Some("A4"));
        assert_eq!(et.to_note(261.63).as_deref(), Some("C4"));
        assert_eq!(et.to_note(311.13).as_deref(), Some("D#4"));
        assert_eq!(et.to_note(523.25).as_deref(), Some("C5"));
        assert_eq!(et.to_note(27.5).as_deref(), Some("A0"));
    }

    #[test]
    fn test_rounds_to_nearest_semitone() {
        let et = EqualTemperament::default();
        // 40 cents sharp of A4 still reads as A4
        assert_eq!(et.to_note(440.0 * 2f64.powf(0.4 / 12.0)).as_deref(), Some("A4"));
        // 60 cents sharp rounds up to A#4
        assert_eq!(et.to_note(440.0 * 2f64.powf(0.6 / 12.0)).as_deref(), Some("A#4"));
    }

    #[test]
    fn test_alternate_reference() {
        let baroque = EqualTemperament::new(415.0);
        assert_eq!(baroque.to_note(415.0).as_deref(), Some("A4"));
    }

    #[test]
    fn test_unnamable_frequencies() {
        let et = EqualTemperament::default();
        assert_eq!(et.to_note(0.0), None);
        assert_eq!(et.to_note(-10.0), None);
        assert_eq!(et.to_note(f64::NAN), None);
    }
}
