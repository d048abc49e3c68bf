//! Opaque session token generation.

use rand::Rng;

/// Tokens are 32 random bytes rendered as lowercase hex.
pub const SESSION_TOKEN_LEN: usize = 64;

#[must_use]
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes
        .iter()
        .fold(String::with_capacity(SESSION_TOKEN_LEN), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_sixty_four_hex_chars() {
        let token = generate_session_token();
        assert_eq!(token.len(), SESSION_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token, token.to_lowercase());
    }

    #[test]
    fn consecutive_tokens_differ() {
        assert_ne!(generate_session_token(), generate_session_token());
    }
}
