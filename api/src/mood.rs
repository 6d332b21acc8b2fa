//! Emotion label → recommendation bundle.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodRecommendation {
    /// Emotion key that matched, `default` when nothing did.
    pub emotion: &'static str,
    pub display_name: &'static str,
    pub tag: &'static str,
    /// Song categories to pull suggestions from, most relevant first.
    pub categories: &'static [&'static str],
}

const DEFAULT: MoodRecommendation = MoodRecommendation {
    emotion: "default",
    display_name: "Lo-fi Chill Beats",
    tag: "chill",
    categories: &["chill", "lofi", "calm"],
};

const fn entry(
    emotion: &'static str,
    display_name: &'static str,
    tag: &'static str,
    categories: &'static [&'static str],
) -> MoodRecommendation {
    MoodRecommendation {
        emotion,
        display_name,
        tag,
        categories,
    }
}

static MOOD_TABLE: &[MoodRecommendation] = &[
    entry("joy", "Party Hits", "party", &["happy", "party", "dance"]),
    entry("happy", "Party Hits", "party", &["happy", "party", "dance"]),
    entry("amusement", "Feel Good Pop", "happy", &["happy", "pop"]),
    entry("excitement", "Hype Mix", "energetic", &["energetic", "party", "workout"]),
    entry("optimism", "Uplift Vibes", "motivational", &["motivational", "happy"]),
    entry("admiration", "Feel Good Pop", "happy", &["happy", "pop"]),
    entry("approval", "Feel Good Pop", "happy", &["happy", "pop"]),
    entry("gratitude", "Warm Acoustic", "acoustic", &["acoustic", "happy"]),
    entry("pride", "Victory Anthems", "energetic", &["energetic", "motivational"]),
    entry("relief", "Sunday Morning", "calm", &["calm", "acoustic"]),
    entry("love", "Romantic Evening", "romantic", &["romantic", "love"]),
    entry("caring", "Romantic Evening", "romantic", &["romantic", "acoustic"]),
    entry("desire", "Late Night R&B", "romantic", &["romantic", "rnb"]),
    entry("curiosity", "Discover Weekly", "indie", &["indie", "discover"]),
    entry("realization", "Deep Focus", "focus", &["focus", "instrumental"]),
    entry("neutral", "Deep Focus", "focus", &["focus", "chill"]),
    entry("surprise", "Trending Now", "energetic", &["energetic", "trending"]),
    entry("sadness", "Motivation Mix", "motivational", &["motivational", "sad"]),
    entry("grief", "Healing Piano", "calm", &["calm", "sad", "instrumental"]),
    entry("remorse", "Fresh Start", "inspirational", &["inspirational", "calm"]),
    entry("disappointment", "Fresh Start", "inspirational", &["inspirational", "motivational"]),
    entry("embarrassment", "Shake It Off", "happy", &["happy", "pop"]),
    entry("anger", "Calm Down", "calm", &["calm", "chill"]),
    entry("annoyance", "Lo-fi Chill Beats", "chill", &["chill", "lofi"]),
    entry("disapproval", "Lo-fi Chill Beats", "chill", &["chill", "lofi"]),
    entry("disgust", "Clean Slate", "inspirational", &["inspirational", "calm"]),
    entry("fear", "Comfort & Calm", "calm", &["calm", "acoustic"]),
    entry("nervousness", "Lo-fi Chill Beats", "chill", &["chill", "lofi", "calm"]),
    entry("confusion", "Deep Focus", "focus", &["focus", "instrumental"]),
    // sentiment model labels
    entry("positive", "Feel Good Pop", "happy", &["happy", "pop"]),
    entry("negative", "Comfort & Calm", "calm", &["calm", "motivational"]),
];

/// Resolves `label` (any case, surrounding whitespace ignored) to its
/// bundle. Unknown, empty and missing labels get the default bundle.
pub fn map(label: Option<&str>) -> MoodRecommendation {
    let Some(label) = label else {
        return DEFAULT;
    };
    let key = label.trim().to_lowercase();
    MOOD_TABLE
        .iter()
        .find(|entry| entry.emotion == key)
        .copied()
        .unwrap_or(DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joy_maps_to_party() {
        let rec = map(Some("joy"));
        assert_eq!(rec.tag, "party");
        assert!(rec.categories.contains(&"happy"));
        assert!(rec.categories.contains(&"party"));
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(map(Some("  SADNESS ")), map(Some("sadness")));
        assert_eq!(map(Some("POSITIVE")).emotion, "positive");
    }

    #[test]
    fn unknown_inputs_fall_back_to_default() {
        for label in [None, Some(""), Some("xyz-unknown"), Some("   ")] {
            let rec = map(label);
            assert_eq!(rec.emotion, "default");
            assert!(!rec.categories.is_empty());
        }
    }

    #[test]
    fn every_entry_is_usable() {
        assert!(MOOD_TABLE.len() >= 20);
        for rec in MOOD_TABLE {
            assert_eq!(rec.emotion, rec.emotion.to_lowercase());
            assert!(!rec.categories.is_empty(), "{} has no categories", rec.emotion);
            assert!(!rec.display_name.is_empty());
            assert_eq!(map(Some(rec.emotion)), *rec);
        }
    }
}
