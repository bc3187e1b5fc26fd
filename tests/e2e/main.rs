//! End-to-end scenarios for the vault.
