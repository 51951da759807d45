//! Session-scoped device permissions
//!
//! Location and camera access are each prompted for at most once per session.
//! After the user answers, the decision is remembered and later requests are
//! answered without prompting again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

/// Device capabilities that need the user's consent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Location,
    Camera,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Location => f.write_str("location"),
            Capability::Camera => f.write_str("camera"),
        }
    }
}

/// Remembered permission decision for one capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Prompt,
    Granted,
    Denied,
}

/// Asks the user whether a capability may be used
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PermissionPrompter: Send + Sync {
    async fn request(&self, capability: Capability) -> bool;
}

/// Prompter with fixed answers
#[derive(Debug, Clone, Copy)]
pub struct PresetPrompter {
    pub location: bool,
    pub camera: bool,
}

impl PresetPrompter {
    pub fn allow_all() -> Self {
        Self {
            location: true,
            camera: true,
        }
    }

    pub fn deny_all() -> Self {
        Self {
            location: false,
            camera: false,
        }
    }
}

#[async_trait]
impl PermissionPrompter for PresetPrompter {
    async fn request(&self, capability: Capability) -> bool {
        match capability {
            Capability::Location => self.location,
            Capability::Camera => self.camera,
        }
    }
}

/// Per-session permission decisions backed by a prompter
pub struct PermissionStore {
    prompter: Arc<dyn PermissionPrompter>,
    states: Mutex<HashMap<Capability, PermissionState>>,
}

impl fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionStore").finish_non_exhaustive()
    }
}

impl PermissionStore {
    pub fn new(prompter: Arc<dyn PermissionPrompter>) -> Self {
        Self {
            prompter,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a capability with a decision made before this session
    pub fn with_state(mut self, capability: Capability, state: PermissionState) -> Self {
        self.states.get_mut().insert(capability, state);
        self
    }

    pub async fn state(&self, capability: Capability) -> PermissionState {
        self.states
            .lock()
            .await
            .get(&capability)
            .copied()
            .unwrap_or_default()
    }

    /// Whether the capability may be used, prompting if still undecided
    pub async fn ensure(&self, capability: Capability) -> bool {
        // Held across the prompt so concurrent callers cannot prompt twice
        let mut states = self.states.lock().await;
        match states.get(&capability).copied().unwrap_or_default() {
            PermissionState::Granted => true,
            PermissionState::Denied => {
                debug!(capability = %capability, "Permission previously denied");
                false
            }
            PermissionState::Prompt => {
                let granted = self.prompter.request(capability).await;
                let decision = if granted {
                    PermissionState::Granted
                } else {
                    PermissionState::Denied
                };
                states.insert(capability, decision);
                info!(capability = %capability, granted, "Permission decision recorded");
                granted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prompts_once_per_capability() {
        let mut prompter = MockPermissionPrompter::new();
        prompter
            .expect_request()
            .withf(|c| *c == Capability::Location)
            .times(1)
            .returning(|_| true);
        prompter
            .expect_request()
            .withf(|c| *c == Capability::Camera)
            .times(1)
            .returning(|_| false);

        let store = PermissionStore::new(Arc::new(prompter));
        assert!(store.ensure(Capability::Location).await);
        assert!(store.ensure(Capability::Location).await);
        assert!(!store.ensure(Capability::Camera).await);
        assert!(!store.ensure(Capability::Camera).await);
        assert_eq!(store.state(Capability::Camera).await, PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_seeded_state_skips_prompt() {
        let mut prompter = MockPermissionPrompter::new();
        prompter.expect_request().never();

        let store = PermissionStore::new(Arc::new(prompter))
            .with_state(Capability::Location, PermissionState::Granted)
            .with_state(Capability::Location, PermissionState::Denied)
            .with_state(Capability::Camera, PermissionState::Granted);

        assert_eq!(store.state(Capability::Location).await, PermissionState::Denied);
        assert_eq!(store.state(Capability::Camera).await, PermissionState::Granted);
        assert!(!store.ensure(Capability::Location).await);
        assert!(store.ensure(Capability::Camera).await);
    }

    #[tokio::test]
    async fn test_preset_prompter_answers() {
        let store = PermissionStore::new(Arc::new(PresetPrompter {
            location: true,
            camera: false,
        }));
        assert_eq!(store.state(Capability::Location).await, PermissionState::Prompt);
        assert!(store.ensure(Capability::Location).await);
        assert!(!store.ensure(Capability::Camera).await);
    }
}
