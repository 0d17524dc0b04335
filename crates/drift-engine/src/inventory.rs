//! Vault inventory reading.
//!
//! Lists every secret in the vault and resolves its current value and
//! expiry health. A secret whose value cannot be read stays in the
//! listing with [`VaultValue::AccessDenied`].

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::client::VaultClient;
use crate::error::ClientError;
use crate::expiry;
use crate::types::{VaultSecret, VaultValue};

/// Reads the vault inventory through a [`VaultClient`].
pub struct InventoryReader<'a, V: VaultClient + ?Sized> {
    vault: &'a V,
}

impl<'a, V: VaultClient + ?Sized> InventoryReader<'a, V> {
    /// Creates a reader over the given vault handle.
    #[must_use]
    pub const fn new(vault: &'a V) -> Self {
        Self { vault }
    }

    /// Lists all secrets with values, classified against `now`.
    ///
    /// An enumeration failure yields an empty inventory. The failure is
    /// logged so an empty vault and an unreachable one can be told apart
    /// in the logs; use [`Self::try_list`] to get the error instead.
    #[must_use]
    pub fn list(&self, now: DateTime<Utc>) -> Vec<VaultSecret> {
        match self.try_list(now) {
            Ok(secrets) => secrets,
            Err(err) => {
                warn!(error = %err, "vault enumeration failed; reporting empty inventory");
                Vec::new()
            }
        }
    }

    /// Lists all secrets, returning the enumeration error if listing fails.
    ///
    /// Per-secret value failures never fail the listing.
    pub fn try_list(&self, now: DateTime<Utc>) -> Result<Vec<VaultSecret>, ClientError> {
        let properties = self.vault.list_secret_metadata()?;

        let secrets: Vec<VaultSecret> = properties
            .into_iter()
            .map(|props| {
                let value = match self.vault.get_secret_value(&props.name) {
                    Ok(value) => VaultValue::Plain(value),
                    Err(err) => {
                        debug!(secret = %props.name, error = %err, "secret value unreadable");
                        VaultValue::AccessDenied
                    }
                };
                let (expiry_status, days_remaining) = expiry::classify(props.expires_on, now);

                VaultSecret {
                    name: props.name,
                    value,
                    enabled: props.enabled,
                    updated_on: props.updated_on,
                    expires_on: props.expires_on,
                    expiry_status,
                    days_remaining,
                }
            })
            .collect();

        info!(count = secrets.len(), "vault inventory listed");
        Ok(secrets)
    }

    /// Writes a new version of a secret.
    ///
    /// # Errors
    ///
    /// Returns the vault's error unchanged.
    pub fn set_secret(
        &self,
        name: &str,
        value: &str,
        expires_on: Option<DateTime<Utc>>,
    ) -> Result<(), ClientError> {
        self.vault.set_secret(name, value, expires_on)
    }
}
