#![forbid(unsafe_code)]

//! Container status snapshots and indicator classification.
//!
//! The status board polls a [`SystemSource`] for the deployment's containers
//! and shows one card per container with a colored indicator. Clicking a card
//! opens that container's log dialog.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::source::FetchError;

/// One container as reported by the system endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStatus {
    pub name: String,
    /// Free-form runtime status (`running`, `Up 3 hours`, `Exited (1)`).
    pub status: String,
    pub image: String,
    /// Comma-separated port mappings.
    pub ports: String,
    /// Health label when the container reports one.
    pub health: String,
    /// Last status line parsed from the container's own logs.
    pub log_status: String,
}

impl ContainerStatus {
    #[must_use]
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_health(mut self, health: impl Into<String>) -> Self {
        self.health = health.into();
        self
    }

    #[must_use]
    pub fn indicator(&self) -> StatusIndicator {
        StatusIndicator::classify(&self.status, &self.health)
    }

    /// Image name without registry path or tag.
    #[must_use]
    pub fn image_name(&self) -> &str {
        let untagged = self.image.split(':').next().unwrap_or_default();
        untagged.rsplit('/').next().unwrap_or(untagged)
    }

    /// First port mapping, if any.
    #[must_use]
    pub fn primary_port(&self) -> Option<&str> {
        self.ports
            .split(',')
            .map(str::trim)
            .find(|p| !p.is_empty())
    }
}

/// Containers of one deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSnapshot {
    pub components: Vec<ContainerStatus>,
}

#[derive(Deserialize)]
struct SystemEnvelope {
    system: SystemSnapshot,
}

impl SystemSnapshot {
    /// Decode either the bare snapshot (`{"components": [...]}`) or the
    /// endpoint response that nests it under `system`.
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        if value.get("system").is_some() {
            let envelope: SystemEnvelope = serde_json::from_value(value)?;
            return Ok(envelope.system);
        }
        Ok(serde_json::from_value(value)?)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ContainerStatus> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Indicator color class of a container card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusIndicator {
    Healthy,
    Warning,
    Failed,
    Unknown,
}

impl StatusIndicator {
    /// Classify a container. Health labels are checked before the runtime
    /// status, so an `Up` container reporting `unhealthy` is `Failed`.
    #[must_use]
    pub fn classify(status: &str, health: &str) -> Self {
        match health {
            "unhealthy" => return Self::Failed,
            "degraded" | "downgrade" | "warning" | "error" => return Self::Warning,
            _ => {}
        }
        if ["stopped", "Exited", "Failed"].iter().any(|s| status.contains(s)) {
            Self::Failed
        } else if status.contains("running") || status.contains("Up") || health == "healthy" {
            Self::Healthy
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

/// Display name of a container with the deployment prefix removed.
///
/// `prefix` is matched at the start of the name, with or without its
/// trailing separator. A name that is exactly the bare prefix is the
/// deployment's core service and displays as `core`.
#[must_use]
pub fn display_name<'a>(name: &'a str, prefix: Option<&str>) -> &'a str {
    let Some(prefix) = prefix.filter(|p| !p.is_empty()) else {
        return name;
    };
    let bare = prefix.trim_end_matches(['-', '_', '.']);
    if name == bare || name == prefix {
        return "core";
    }
    match name.strip_prefix(prefix) {
        Some(rest) if !rest.is_empty() => rest,
        _ => name,
    }
}

/// The status collaborator behind the status board.
pub trait SystemSource: Send + Sync {
    fn fetch_system(&self) -> Result<SystemSnapshot, FetchError>;
}

/// In-memory system source with replaceable snapshot and queued failures.
#[derive(Debug, Default)]
pub struct MemorySystemSource {
    snapshot: Mutex<SystemSnapshot>,
    failures: Mutex<VecDeque<FetchError>>,
}

impl MemorySystemSource {
    #[must_use]
    pub fn new(snapshot: SystemSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            failures: Mutex::default(),
        }
    }

    pub fn set(&self, snapshot: SystemSnapshot) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn fail_next(&self, error: FetchError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }
}

impl SystemSource for MemorySystemSource {
    fn fetch_system(&self) -> Result<SystemSnapshot, FetchError> {
        if let Some(err) = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Err(err);
        }
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Reads a system snapshot JSON file on every poll.
#[derive(Debug, Clone)]
pub struct SystemFileSource {
    path: PathBuf,
}

impl SystemFileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SystemSource for SystemFileSource {
    fn fetch_system(&self) -> Result<SystemSnapshot, FetchError> {
        let body = std::fs::read_to_string(&self.path)?;
        SystemSnapshot::from_json(&body)
    }
}
