use rand::Rng;
use regex::Regex;
use room_types::RoomError;
use std::sync::LazyLock;

pub const ROOM_CODE_LEN: usize = 6;
// No 0/O, 1/I/L: codes get read aloud and typed on phones
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

static ROOM_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ABCDEFGHJKMNPQRSTUVWXYZ2-9]{6}$").expect("room code pattern is valid")
});

pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form used for storage and lookups: trimmed, uppercase.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn is_valid_room_code(code: &str) -> bool {
    ROOM_CODE_PATTERN.is_match(code)
}

/// Normalizes user input and rejects anything that could never be a code.
pub fn parse_room_code(input: &str) -> Result<String, RoomError> {
    let code = normalize_room_code(input);
    if code.is_empty() {
        return Err(RoomError::EmptyRoomCode);
    }
    if !is_valid_room_code(&code) {
        return Err(RoomError::InvalidRoomCode { code });
    }
    Ok(code)
}
