use sha2::{Digest, Sha256};

/// Hash a password for storage in the front end's credential file:
/// lowercase hex SHA-256 of its UTF-8 bytes.
pub fn password_hash(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash() {
        assert_eq!(
            password_hash("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
        assert_eq!(password_hash("").len(), 64);
    }
}
