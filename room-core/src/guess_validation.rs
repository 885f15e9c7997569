use room_types::{Guess, RoomError};

pub const MAX_GUESS_CHARS: usize = 32;

/// Hebrew points and cantillation marks, which do not change the word.
fn is_hebrew_mark(c: char) -> bool {
    ('\u{0591}'..='\u{05C7}').contains(&c)
        && !matches!(c, '\u{05BE}' | '\u{05C0}' | '\u{05C3}' | '\u{05C6}')
}

// geresh, gershayim, and their ASCII stand-ins
fn is_abbreviation_mark(c: char) -> bool {
    matches!(c, '\u{05F3}' | '\u{05F4}' | '\'' | '"')
}

/// Canonical form used for duplicate detection and exact-match checks.
pub fn normalize_word(word: &str) -> String {
    word.trim()
        .chars()
        .filter(|c| !is_hebrew_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Validates a raw guess and returns its normalized form.
pub fn validate_guess(word: &str) -> Result<String, RoomError> {
    let normalized = normalize_word(word);
    let invalid = |reason: &str| RoomError::InvalidGuess {
        word: word.trim().to_string(),
        reason: reason.to_string(),
    };

    if normalized.is_empty() {
        return Err(invalid("guess is empty"));
    }
    if normalized.chars().any(char::is_whitespace) {
        return Err(invalid("guess must be a single word"));
    }
    if normalized.chars().count() > MAX_GUESS_CHARS {
        return Err(invalid("guess is too long"));
    }
    if !normalized
        .chars()
        .all(|c| c.is_alphabetic() || is_abbreviation_mark(c))
    {
        return Err(invalid("guess may only contain letters"));
    }

    Ok(normalized)
}

/// Finds an earlier guess of the same word in the room, if any.
pub fn find_duplicate<'a>(guesses: &'a [Guess], normalized: &str) -> Option<&'a Guess> {
    guesses
        .iter()
        .find(|guess| normalize_word(&guess.word) == normalized)
}
