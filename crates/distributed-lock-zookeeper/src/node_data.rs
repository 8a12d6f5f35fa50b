//! Descriptive payload stored in contender nodes.
//!
//! The payload tells an operator inspecting the lock folder who is waiting
//! for or holding the lock. It is stored as a JSON object.

use serde::{Deserialize, Serialize};

/// Host and process metadata of a lock contender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
}

impl NodeData {
    /// Describes the current process.
    pub fn current() -> Self {
        let host_name = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string());

        let process_name = std::env::current_exe().ok().and_then(|exe| {
            exe.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        });

        Self {
            host_name,
            application: process_name.clone(),
            process_name,
            process_id: Some(std::process::id().to_string()),
        }
    }

    /// Overrides the application name.
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn serialize(&self) -> Vec<u8> {
        // A struct of optional strings always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Reads a payload written by [`NodeData::serialize`]. Empty input is an
    /// empty payload.
    pub fn deserialize(data: &[u8]) -> Result<Self, serde_json::Error> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(data)
    }
}
