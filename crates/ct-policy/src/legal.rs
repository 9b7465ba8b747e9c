// legal.rs — Mandatory local legal-keyword scan.
//
// The external classifier also flags legal-risk language, but its flag is
// OR-ed with this scan — a misbehaving classifier must never be able to get
// a legally sensitive message auto-answered. The list is deliberately blunt;
// false positives go to a human, which is the cheap direction to fail in.

/// Terms that mark a message as legally sensitive.
pub const LEGAL_KEYWORDS: &[&str] = &[
    "lawsuit",
    "attorney",
    "lawyer",
    "sue",
    "legal action",
    "court",
    "discrimination",
    "harassment",
    "uninhabitable",
    "code violation",
    "health department",
];

/// Case-insensitive scan for legal-risk language.
///
/// Single-word keywords match on word boundaries ("sue" must not fire on
/// "issue"); multi-word phrases match as substrings.
pub fn has_legal_keywords(text: &str) -> bool {
    let lower = text.to_lowercase();
    LEGAL_KEYWORDS.iter().any(|keyword| {
        if keyword.contains(' ') {
            lower.contains(keyword)
        } else {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == *keyword)
        }
    })
}
