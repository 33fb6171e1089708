//! Token scopes and plaintext shape validation.

use serde::{Deserialize, Serialize};

/// Length of a plaintext token: 16 random bytes, base32 without padding.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Authentication,
    Activation,
    PasswordReset,
}

/// Cheap pre-lookup check that `token` could have been issued by us.
pub fn is_valid_token_shape(token: &str) -> bool {
    token.len() == TOKEN_PLAINTEXT_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        assert!(is_valid_token_shape("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"));
        assert!(!is_valid_token_shape(""));
        assert!(!is_valid_token_shape("abc"));
        // Right length, lowercase.
        assert!(!is_valid_token_shape("y3qmgx3pj3wlrl2yrtqgq6krhu"));
        // Right length, digits outside the base32 alphabet.
        assert!(!is_valid_token_shape("Y3QMGX3PJ3WLRL2YRTQGQ6KRH0"));
        assert!(!is_valid_token_shape("Y3QMGX3PJ3WLRL2YRTQGQ6KRHUU"));
    }
}
