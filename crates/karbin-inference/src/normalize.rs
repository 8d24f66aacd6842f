//! Text normalization applied to every text before it reaches a model.
//!
//! Job postings and profiles mix Persian and Arabic code points for the same
//! letters, and often carry diacritics. Without folding these, two spellings
//! of one skill embed to different vectors.

/// Arabic yeh, folded to Persian yeh.
const ARABIC_YEH: char = '\u{064A}';
const PERSIAN_YEH: char = '\u{06CC}';

/// Arabic kaf, folded to Persian keheh.
const ARABIC_KAF: char = '\u{0643}';
const PERSIAN_KAF: char = '\u{06A9}';

/// Superscript alef, dropped like the harakat.
const SUPERSCRIPT_ALEF: char = '\u{0670}';

fn is_diacritic(c: char) -> bool {
    ('\u{064B}'..='\u{065F}').contains(&c) || c == SUPERSCRIPT_ALEF
}

/// Fold Arabic letter variants to their Persian forms, drop diacritics,
/// and collapse runs of whitespace to a single space.
///
/// Leading and trailing whitespace is removed. The function is idempotent.
///
/// # Example
///
/// ```
/// use karbin_inference::normalize_text;
///
/// assert_eq!(
///     normalize_text("  برنامه\u{064E}  نو\u{064A}س "),
///     "برنامه نو\u{06CC}س"
/// );
/// ```
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .chars()
        .filter(|c| !is_diacritic(*c))
        .map(|c| match c {
            ARABIC_YEH => PERSIAN_YEH,
            ARABIC_KAF => PERSIAN_KAF,
            other => other,
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
