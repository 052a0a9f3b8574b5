//! Device directory boundary.
//!
//! The orchestration core treats device identity as opaque; the directory
//! only supplies the addressing info handed to the action executor. The
//! production binary loads a static JSON inventory file; deployments with a
//! device CRUD service implement [`DeviceDirectory`] over it instead.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Addressing info for one managed device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    /// Human-readable label, if the inventory carries one.
    #[serde(default)]
    pub name: Option<String>,
    /// Host or IP the executor connects to.
    pub address: String,
    #[serde(default)]
    pub ssh_user: Option<String>,
}

/// Resolves device ids to addressing records.
#[async_trait::async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn resolve(&self, device_id: &str) -> Option<DeviceRecord>;
}

/// Errors loading a static inventory file.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Failed to read inventory file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse inventory file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A fixed in-memory directory, loaded once at startup.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    devices: HashMap<String, DeviceRecord>,
}

impl StaticDirectory {
    pub fn new(devices: Vec<DeviceRecord>) -> Self {
        Self {
            devices: devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    /// Load a JSON inventory file: an array of device records.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        let devices: Vec<DeviceRecord> = serde_json::from_str(&raw)?;
        Ok(Self::new(devices))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[async_trait::async_trait]
impl DeviceDirectory for StaticDirectory {
    async fn resolve(&self, device_id: &str) -> Option<DeviceRecord> {
        self.devices.get(device_id).cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
