use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

pub const MIN_PASSWORD_LEN: usize = 12;

/// Hashes in a blocking task since argon2 is CPU-bound.
pub async fn hash_password(password: String) -> Result<String, String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())?
}

/// Returns `Ok(true)` if the password matches, `Ok(false)` if it doesn't, and
/// `Err` only if the stored hash itself is malformed — that's a data
/// integrity bug, not a bad login attempt.
pub async fn verify_password(password: String, hash: String) -> Result<bool, String> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|e| e.to_string())?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    })
    .await
    .map_err(|e| e.to_string())?
}

pub fn is_strong_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify_round_trips() {
        let hash = hash_password("correct-horse-battery-staple".into()).await.unwrap();
        assert!(verify_password("correct-horse-battery-staple".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong-password-entirely".into(), hash).await.unwrap());
    }

    #[test]
    fn rejects_short_passwords() {
        assert!(!is_strong_enough("short"));
        assert!(is_strong_enough("correct-horse-battery-staple"));
    }
}
