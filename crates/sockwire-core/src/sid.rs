//! Session id generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use uuid::Uuid;

/// Fresh opaque session id: URL-safe base64 of a UUIDv7.
pub fn generate() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::now_v7().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_non_empty_and_distinct() {
        let a = generate();
        let b = generate();
        assert_eq!(a.len(), 22);
        assert_ne!(a, b);
    }
}
