use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::meta::{Object, ObjectMeta, StatusObject};

// --- Resource requirements ---

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourceRequirements {
    /// CPU in millicores (1000 = 1 core)
    #[serde(default)]
    pub cpu_millis: u64,
    /// Memory in bytes
    #[serde(default)]
    pub memory_bytes: u64,
}

// --- Container spec ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub resources: ResourceRequirements,
}

// --- Pod status ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: PodPhase,
    /// True once the pod passes its readiness checks (set by the node agent).
    #[serde(default)]
    pub ready: bool,
}

// --- Pod spec ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSpec {
    /// Stable hostname assigned by the owning controller.
    #[serde(default)]
    pub hostname: String,
    pub containers: Vec<ContainerSpec>,
}

// --- Pod ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    pub meta: ObjectMeta,
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    pub fn is_running_and_ready(&self) -> bool {
        self.status.phase == PodPhase::Running && self.status.ready
    }
}

impl Object for Pod {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl StatusObject for Pod {
    fn copy_status_from(&mut self, src: &Self) {
        self.status = src.status.clone();
    }
}
