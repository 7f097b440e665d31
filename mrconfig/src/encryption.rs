//! Chiffrement des secrets de configuration
//!
//! Les secrets (client secret, mot de passe du site, refresh token de départ)
//! peuvent être écrits dans `config.yaml` sous la forme `encrypted:BASE64`.
//! La clé AES-256-GCM est dérivée de l'identifiant de la machine : un fichier
//! chiffré n'est donc lisible que sur l'hôte qui l'a produit.
//!
//! Format encodé : nonce (12 octets) suivi du texte chiffré.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

/// Préfixe identifiant une valeur chiffrée
const ENCRYPTED_PREFIX: &str = "encrypted:";

const KEY_SALT: &[u8] = b"multiroom-secret-key-v1";
const NONCE_SALT: &[u8] = b"multiroom-secret-nonce-v1";
const NONCE_LEN: usize = 12;

/// Identifiant stable de la machine
fn machine_id() -> Result<String> {
    #[cfg(target_os = "linux")]
    {
        for candidate in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
            if let Ok(id) = std::fs::read_to_string(candidate) {
                let id = id.trim();
                if !id.is_empty() {
                    return Ok(id.to_string());
                }
            }
        }
        Err(anyhow!("No machine-id available"))
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("ioreg")
            .args(["-d2", "-c", "IOPlatformExpertDevice"])
            .output()?;
        let text = String::from_utf8_lossy(&output.stdout);

        // "IOPlatformUUID" = "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"
        text.lines()
            .find(|line| line.contains("IOPlatformUUID"))
            .and_then(|line| line.split('"').nth(3))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("IOPlatformUUID not found in ioreg output"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(anyhow!("Secret encryption is not supported on this platform"))
    }
}

fn cipher() -> Result<Aes256Gcm> {
    let mut hasher = Sha256::new();
    hasher.update(machine_id()?.as_bytes());
    hasher.update(KEY_SALT);
    let key = hasher.finalize();

    Aes256Gcm::new_from_slice(&key).map_err(|e| anyhow!("Failed to create cipher: {}", e))
}

/// Chiffre un secret avec la clé de la machine
///
/// Le nonce est dérivé du secret lui-même : chiffrer deux fois la même
/// valeur produit la même chaîne, ce qui garde le fichier de config stable.
pub fn encrypt_secret(secret: &str) -> Result<String> {
    let cipher = cipher()?;

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(NONCE_SALT);
    let digest = hasher.finalize();
    let nonce_bytes = &digest[..NONCE_LEN];

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce_bytes), secret.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", ENCRYPTED_PREFIX, STANDARD.encode(&combined)))
}

/// Déchiffre une valeur au format `encrypted:BASE64`
pub fn decrypt_secret(encrypted: &str) -> Result<String> {
    let encoded = encrypted
        .strip_prefix(ENCRYPTED_PREFIX)
        .ok_or_else(|| anyhow!("Invalid encrypted secret (missing prefix)"))?;

    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;

    if raw.len() < NONCE_LEN {
        return Err(anyhow!("Invalid ciphertext (too short)"));
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

    let plaintext = cipher()?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("Decryption failed (wrong machine or corrupted data): {}", e))?;

    String::from_utf8(plaintext).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
}

/// Vérifie si une valeur est chiffrée
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Retourne le secret en clair, qu'il soit stocké chiffré ou non
pub fn reveal_secret(value: &str) -> Result<String> {
    if is_encrypted(value) {
        decrypt_secret(value)
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_encrypted() {
        assert!(is_encrypted("encrypted:SGVsbG8="));
        assert!(!is_encrypted("plaintext"));
        assert!(!is_encrypted(""));
    }

    #[test]
    fn test_plaintext_is_revealed_as_is() {
        assert_eq!(reveal_secret("hunter2").unwrap(), "hunter2");
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        assert!(decrypt_secret("hunter2").is_err());
        assert!(decrypt_secret("encrypted:!!!not-base64!!!").is_err());
        assert!(decrypt_secret("encrypted:AAAA").is_err());
    }

    #[test]
    fn test_round_trip_when_machine_id_available() {
        // Certains conteneurs n'ont pas de machine-id
        if machine_id().is_err() {
            return;
        }

        let encrypted = encrypt_secret("s3cr3t!").unwrap();
        assert!(is_encrypted(&encrypted));
        assert_eq!(encrypted, encrypt_secret("s3cr3t!").unwrap());
        assert_eq!(reveal_secret(&encrypted).unwrap(), "s3cr3t!");
    }
}
