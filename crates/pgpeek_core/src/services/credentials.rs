//! Credential store: named environments and the active selection.
//!
//! The environment list is persisted as base64(JSON list) under
//! [`ENVIRONMENTS_KEY`]; the active environment name is a plain string under
//! [`ACTIVE_ENVIRONMENT_KEY`]. Base64 is an encoding, not encryption: anyone
//! who can read the store can read the passwords and keys in it.

use crate::error::{PeekError, PeekResult};
use crate::models::Environment;
use crate::services::storage::KeyValueStore;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;

/// Storage key of the encoded environment list.
pub const ENVIRONMENTS_KEY: &str = "db_environments_v2";

/// Storage key of the active environment name.
pub const ACTIVE_ENVIRONMENT_KEY: &str = "active_db_environment_v2";

/// Encode environments in the persisted blob format.
pub fn encode_environments(environments: &[Environment]) -> PeekResult<String> {
    let json = serde_json::to_string(environments)?;
    Ok(STANDARD.encode(json))
}

/// Decode the persisted blob format.
pub fn decode_environments(blob: &str) -> PeekResult<Vec<Environment>> {
    let bytes = STANDARD.decode(blob.trim())?;
    let environments = serde_json::from_slice(&bytes)?;
    Ok(environments)
}

/// Named environment profiles with at most one active.
pub struct CredentialStore {
    /// Where the profiles are persisted.
    store: Arc<dyn KeyValueStore>,
    /// Profiles in insertion order; names are unique.
    environments: Vec<Environment>,
    /// Name of the active profile, if any.
    active: Option<String>,
}

impl CredentialStore {
    /// Load the environments from `store`.
    ///
    /// A blob that cannot be decoded is discarded and the store starts empty.
    /// Without a stored selection, the first environment becomes active.
    pub fn load(store: Arc<dyn KeyValueStore>) -> PeekResult<Self> {
        let environments = match store.get(ENVIRONMENTS_KEY)? {
            Some(blob) if !blob.trim().is_empty() => match decode_environments(&blob) {
                Ok(environments) => environments,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load credentials, discarding them");
                    store.delete(ENVIRONMENTS_KEY)?;
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        let mut credentials = Self {
            store,
            environments,
            active: None,
        };
        credentials.dedupe();

        let stored_active = credentials.store.get(ACTIVE_ENVIRONMENT_KEY)?.filter(|n| !n.is_empty());
        match stored_active {
            Some(name) => credentials.active = Some(name),
            None => {
                if let Some(first) = credentials.environments.first() {
                    credentials.active = Some(first.name.clone());
                    credentials.persist_active()?;
                }
            }
        }

        tracing::debug!(
            provider = credentials.store.name(),
            environments = credentials.environments.len(),
            active = ?credentials.active,
            "Credential store loaded"
        );
        Ok(credentials)
    }

    /// All environments in insertion order.
    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// Look up an environment by name.
    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// Name of the active environment, if one is selected.
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active environment.
    pub fn get_active_environment(&self) -> PeekResult<Environment> {
        let name = self
            .active
            .as_deref()
            .ok_or_else(|| PeekError::no_active_environment("no environment selected"))?;
        self.get(name).cloned().ok_or_else(|| {
            PeekError::no_active_environment(format!("environment '{name}' not found"))
        })
    }

    /// Create or replace (by name) an environment.
    ///
    /// The first environment saved while nothing is active becomes active.
    pub fn save_environment(&mut self, environment: Environment) -> PeekResult<()> {
        environment.validate().map_err(PeekError::validation)?;

        let name = environment.name.clone();
        match self.environments.iter().position(|e| e.name == name) {
            Some(index) => self.environments[index] = environment,
            None => self.environments.push(environment),
        }
        self.persist_environments()?;

        if self.active.is_none() {
            self.active = Some(name.clone());
            self.persist_active()?;
        }

        tracing::info!(environment = %name, "Environment saved");
        Ok(())
    }

    /// Select the active environment.
    pub fn set_active(&mut self, name: &str) -> PeekResult<()> {
        if self.get(name).is_none() {
            return Err(PeekError::validation(format!("Unknown environment: {name}")));
        }
        self.active = Some(name.to_string());
        self.persist_active()?;
        tracing::info!(environment = %name, "Active environment changed");
        Ok(())
    }

    /// Delete an environment.
    ///
    /// Deleting the active environment activates the first remaining one.
    /// Returns whether anything was removed.
    pub fn delete_environment(&mut self, name: &str) -> PeekResult<bool> {
        let before = self.environments.len();
        self.environments.retain(|e| e.name != name);
        let removed = self.environments.len() != before;

        if self.active.as_deref() == Some(name) {
            self.active = self.environments.first().map(|e| e.name.clone());
        }
        self.persist_environments()?;
        self.persist_active()?;

        if removed {
            tracing::info!(environment = %name, "Environment deleted");
        }
        Ok(removed)
    }

    fn dedupe(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.environments.retain(|e| seen.insert(e.name.clone()));
    }

    fn persist_environments(&self) -> PeekResult<()> {
        let blob = encode_environments(&self.environments)?;
        self.store.set(ENVIRONMENTS_KEY, &blob)
    }

    fn persist_active(&self) -> PeekResult<()> {
        match &self.active {
            Some(name) => self.store.set(ACTIVE_ENVIRONMENT_KEY, name),
            None => self.store.delete(ACTIVE_ENVIRONMENT_KEY),
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("provider", &self.store.name())
            .field("environments", &self.environments.len())
            .field("active", &self.active)
            .finish()
    }
}
