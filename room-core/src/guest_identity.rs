use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use room_types::ParticipantId;

const GUEST_PREFIX: &str = "guest";
const RANDOM_BYTES: usize = 9;

/// Session-scoped identifier for a participant without an account.
///
/// Combines the creation time in milliseconds with 72 random bits, so two
/// identities minted in the same millisecond still differ with overwhelming
/// probability. Nothing is persisted; a new process or tab gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuestIdentity {
    id: String,
}

impl GuestIdentity {
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut random = [0u8; RANDOM_BYTES];
        rand::thread_rng().fill_bytes(&mut random);

        Self {
            id: format!(
                "{}_{}_{}",
                GUEST_PREFIX,
                to_base36(millis),
                URL_SAFE_NO_PAD.encode(random)
            ),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn participant(&self) -> ParticipantId {
        ParticipantId::Guest(self.id.clone())
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
