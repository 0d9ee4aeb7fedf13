//! Major-scale table and pitch-class helpers.
//!
//! Each scale is spelled the way a player reads it (Bb major uses flats,
//! F# major uses E#), so comparisons against detected notes go through
//! [`pitch_class`] rather than string equality.

use crate::analyzer::AnalysisError;

/// Number of notes in a scale definition: seven degrees plus the octave.
pub const SCALE_LENGTH: usize = 8;

/// Distinct scale degrees graded per attempt.
pub const SCALE_DEGREES: usize = 7;

/// A named major scale, root to octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleDefinition {
    pub name: &'static str,
    pub notes: [&'static str; SCALE_LENGTH],
}

impl ScaleDefinition {
    /// The seven distinct degrees (octave repeat dropped).
    pub fn degrees(&self) -> &[&'static str] {
        &self.notes[..SCALE_DEGREES]
    }

    /// Label for the gap between degree `index` and the next one, e.g. "C - D".
    /// Indices past the octave wrap around the 7-note cycle (two-octave runs).
    pub fn note_pair(&self, index: usize) -> String {
        let from = self.notes[index % SCALE_DEGREES];
        let to = self.notes[(index + 1) % SCALE_DEGREES];
        format!("{from} - {to}")
    }
}

pub const MAJOR_SCALES: [ScaleDefinition; 15] = [
    ScaleDefinition { name: "C major", notes: ["C", "D", "E", "F", "G", "A", "B", "C"] },
    ScaleDefinition { name: "G major", notes: ["G", "A", "B", "C", "D", "E", "F#", "G"] },
    ScaleDefinition { name: "D major", notes: ["D", "E", "F#", "G", "A", "B", "C#", "D"] },
    ScaleDefinition { name: "A major", notes: ["A", "B", "C#", "D", "E", "F#", "G#", "A"] },
    ScaleDefinition { name: "E major", notes: ["E", "F#", "G#", "A", "B", "C#", "D#", "E"] },
    ScaleDefinition { name: "B major", notes: ["B", "C#", "D#", "E", "F#", "G#", "A#", "B"] },
    ScaleDefinition { name: "F# major", notes: ["F#", "G#", "A#", "B", "C#", "D#", "E#", "F#"] },
    ScaleDefinition { name: "C# major", notes: ["C#", "D#", "E#", "F#", "G#", "A#", "B#", "C#"] },
    ScaleDefinition { name: "F major", notes: ["F", "G", "A", "Bb", "C", "D", "E", "F"] },
    ScaleDefinition { name: "Bb major", notes: ["Bb", "C", "D", "Eb", "F", "G", "A", "Bb"] },
    ScaleDefinition { name: "Eb major", notes: ["Eb", "F", "G", "Ab", "Bb", "C", "D", "Eb"] },
    ScaleDefinition { name: "Ab major", notes: ["Ab", "Bb", "C", "Db", "Eb", "F", "G", "Ab"] },
    ScaleDefinition { name: "Db major", notes: ["Db", "Eb", "F", "Gb", "Ab", "Bb", "C", "Db"] },
    ScaleDefinition { name: "Gb major", notes: ["Gb", "Ab", "Bb", "Cb", "Db", "Eb", "F", "Gb"] },
    ScaleDefinition { name: "Cb major", notes: ["Cb", "Db", "Eb", "Fb", "Gb", "Ab", "Bb", "Cb"] },
];

/// Resolve a scale by name (case-insensitive, surrounding whitespace ignored).
pub fn lookup(name: &str) -> Result<&'static ScaleDefinition, AnalysisError> {
    let wanted = name.trim();
    MAJOR_SCALES
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| AnalysisError::UnknownScale(name.to_string()))
}

/// Pitch class (0 = C … 11 = B) of a note label such as "Eb", "F#4", "B♭3" or "E#".
///
/// The octave suffix is ignored. Returns `None` for anything that does not start
/// with a note letter, including the "none" placeholder for unpitched onsets.
pub fn pitch_class(label: &str) -> Option<u8> {
    let mut chars = label.trim().chars().peekable();
    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut offset = 0i32;
    while let Some(&c) = chars.peek() {
        match c {
            '#' | '♯' => offset += 1,
            'b' | '♭' => offset -= 1,
            _ => break,
        }
        chars.next();
    }

    // Whatever is left must be an octave number (or nothing)
    let rest: String = chars.collect();
    if !rest.is_empty() && rest.parse::<i32>().is_err() {
        return None;
    }

    Some((base + offset).rem_euclid(12) as u8)
}
