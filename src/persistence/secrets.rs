//! Secure secret storage using OS keyring.
//!
//! Provides abstraction over keyring for storing saved-connection passwords.
//! Falls back to plaintext storage in the state database when the keyring
//! is unavailable.

use crate::error::{OrawatchError, Result};
use keyring::Entry;
use tracing::warn;

const SERVICE_NAME: &str = "orawatch";

/// Status of the secure storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStorageStatus {
    /// OS keyring is available and working.
    Secure,
    /// Keyring unavailable; passwords go to the state database as plaintext.
    Plaintext,
}

/// Manages secure storage of saved-connection passwords.
#[derive(Debug, Clone)]
pub struct SecretStorage {
    keyring_available: bool,
}

impl Default for SecretStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStorage {
    /// Creates a new secret storage instance, probing keyring availability.
    pub fn new() -> Self {
        Self {
            keyring_available: Self::probe_keyring(),
        }
    }

    /// Probes whether the OS keyring is available.
    fn probe_keyring() -> bool {
        let test_entry = match Entry::new(SERVICE_NAME, "__probe__") {
            Ok(e) => e,
            Err(_) => return false,
        };

        match test_entry.set_password("test") {
            Ok(()) => {
                let _ = test_entry.delete_credential();
                true
            }
            Err(_) => false,
        }
    }

    /// Returns the current status of secret storage.
    pub fn status(&self) -> SecretStorageStatus {
        if self.keyring_available {
            SecretStorageStatus::Secure
        } else {
            SecretStorageStatus::Plaintext
        }
    }

    /// Returns whether secure storage (keyring) is available.
    pub fn is_secure(&self) -> bool {
        self.keyring_available
    }

    /// Stores a secret in the keyring.
    pub fn store(&self, key: &str, secret: &str) -> Result<()> {
        if !self.keyring_available {
            return Err(OrawatchError::persistence(
                "Keyring unavailable; password must be stored in the state database",
            ));
        }

        let entry = Entry::new(SERVICE_NAME, key).map_err(|e| {
            OrawatchError::persistence(format!("Failed to create keyring entry: {e}"))
        })?;

        entry
            .set_password(secret)
            .map_err(|e| OrawatchError::persistence(format!("Failed to store secret: {e}")))?;

        Ok(())
    }

    /// Retrieves a secret from the keyring.
    pub fn retrieve(&self, key: &str) -> Result<Option<String>> {
        if !self.keyring_available {
            return Ok(None);
        }

        let entry = Entry::new(SERVICE_NAME, key)
            .map_err(|e| OrawatchError::persistence(format!("Failed to access keyring: {e}")))?;

        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(OrawatchError::persistence(format!(
                "Failed to retrieve secret: {e}"
            ))),
        }
    }

    /// Deletes a secret from the keyring.
    pub fn delete(&self, key: &str) -> Result<()> {
        if !self.keyring_available {
            return Ok(());
        }

        let entry = Entry::new(SERVICE_NAME, key)
            .map_err(|e| OrawatchError::persistence(format!("Failed to access keyring: {e}")))?;

        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!("Failed to delete secret from keyring: {e}");
                Ok(())
            }
        }
    }

    /// Generates a keyring key for a saved connection's password.
    pub fn connection_password_key(connection_id: i64) -> String {
        format!("conn:{}", connection_id)
    }

    /// Masks a secret for display, showing only the last 4 characters.
    pub fn mask_secret(secret: &str) -> String {
        if secret.len() <= 4 {
            "*".repeat(secret.len())
        } else {
            format!("{}...{}", "*".repeat(4), &secret[secret.len() - 4..])
        }
    }
}
