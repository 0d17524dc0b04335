//! Reconciliation of workload usage against vault inventory.
//!
//! Each usage record is matched in two passes over the inventory, in
//! listing order, first match wins:
//!
//! 1. content: the decoded workload value is byte-identical to a vault
//!    value ([`AkvStatus::Synced`])
//! 2. naming: the vault name is contained in the workload secret name, or
//!    the referenced key is contained in the vault name
//!    ([`AkvStatus::Drift`])
//!
//! Pass 2 only runs when pass 1 found nothing, so a content match always
//! wins over a name match regardless of inventory order.

use subtle::ConstantTimeEq;

use crate::types::{AkvStatus, CorrelationRow, UsageRecord, VaultSecret};

/// Correlates usage records with the vault, one row per record, in order.
#[must_use]
pub fn correlate(records: &[UsageRecord], vault: &[VaultSecret]) -> Vec<CorrelationRow> {
    records
        .iter()
        .map(|record| correlate_one(record, vault))
        .collect()
}

fn correlate_one(record: &UsageRecord, vault: &[VaultSecret]) -> CorrelationRow {
    let matched = find_content_match(record, vault)
        .map(|secret| (AkvStatus::Synced(secret.name.clone()), secret))
        .or_else(|| {
            find_name_match(record, vault)
                .map(|secret| (AkvStatus::Drift(secret.name.clone()), secret))
        });

    let mut row = CorrelationRow {
        pod: record.pod.clone(),
        deployment: record.deployment.clone(),
        mechanism: record.mechanism,
        workload_secret: record.secret_name.clone(),
        akv_status: AkvStatus::Unknown,
        vault_name_ref: None,
        vault_value: None,
        vault_expiry_status: None,
        days_remaining: None,
    };

    if let Some((status, secret)) = matched {
        row.akv_status = status;
        row.vault_name_ref = Some(secret.name.clone());
        row.vault_value = Some(secret.value.clone());
        row.vault_expiry_status = Some(secret.expiry_status);
        row.days_remaining = secret.days_remaining;
    }
    row
}

fn find_content_match<'v>(
    record: &UsageRecord,
    vault: &'v [VaultSecret],
) -> Option<&'v VaultSecret> {
    let consumed = record
        .value
        .as_ref()
        .and_then(|value| value.as_decoded())
        .filter(|value| !value.is_empty())?;

    vault.iter().find(|secret| {
        secret
            .value
            .as_plain()
            .is_some_and(|stored| bool::from(stored.as_bytes().ct_eq(consumed.as_bytes())))
    })
}

fn find_name_match<'v>(record: &UsageRecord, vault: &'v [VaultSecret]) -> Option<&'v VaultSecret> {
    let workload_name = record.secret_name.to_lowercase();
    let key = record.key.as_deref().map(str::to_lowercase);

    vault.iter().find(|secret| {
        let vault_name = secret.name.to_lowercase();
        workload_name.contains(&vault_name)
            || key.as_deref().is_some_and(|key| vault_name.contains(key))
    })
}
