use serde::Serialize;
use tracing::debug;

use crate::error::{ProvisionError, Result};

pub const ROOT_DEVICE: &str = "/dev/xvda";
pub const ROOT_VOLUME_GIB: u64 = 64;
pub const EXTRACTION_DEVICE: &str = "/dev/sdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeRole {
    Root,
    Extraction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub device_path: &'static str,
    pub size_gib: u64,
    pub encrypted: bool,
    pub role: VolumeRole,
}

/// Block device layout of one node: root first, extraction second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VolumeSpec([Volume; 2]);

impl VolumeSpec {
    pub fn entries(&self) -> &[Volume] {
        &self.0
    }

    pub fn root(&self) -> &Volume {
        &self.0[0]
    }

    pub fn extraction(&self) -> &Volume {
        &self.0[1]
    }
}

pub fn derive_volumes(extraction_size_gib: i64) -> Result<VolumeSpec> {
    if extraction_size_gib <= 0 {
        return Err(ProvisionError::InvalidSize { size_gib: extraction_size_gib });
    }
    debug!(extraction_size_gib, "deriving node volumes");

    Ok(VolumeSpec([
        Volume { device_path: ROOT_DEVICE, size_gib: ROOT_VOLUME_GIB, encrypted: true, role: VolumeRole::Root },
        Volume {
            device_path: EXTRACTION_DEVICE,
            size_gib: extraction_size_gib as u64,
            encrypted: true,
            role: VolumeRole::Extraction,
        },
    ]))
}
