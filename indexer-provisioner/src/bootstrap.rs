//! First-boot plan of an ingestion node: stage every artifact, then run the
//! user-data script with the cluster identity filled in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::arn;
use crate::error::{ProvisionError, Result};
use crate::policy::PolicyStatement;
use crate::types::ClusterRef;

pub const CLUSTER_ARN_PLACEHOLDER: &str = "__KAFKA_CLUSTER_ARN__";
pub const STAGING_DIR: &str = "/tmp";

pub const MONITOR_EXTRACTION: &str = "monitor_extraction";
pub const LAST_BLOCK_TRACKER: &str = "lastBlock";
pub const MONITOR_BROKER: &str = "monitor_kafka";
pub const SCRIPTS: &str = "scripts";

/// `s3://bucket/key` location of a packaged artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub key: String,
}

impl ArtifactLocation {
    pub fn object_arn(&self) -> String {
        arn::s3_object(&self.bucket, &self.key)
    }

    /// Both parts end up unquoted in the first-boot script, so only plain
    /// S3 bucket names and a shell-inert key alphabet are accepted.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let b = self.bucket.as_bytes();
        let bucket_ok = (3..=63).contains(&b.len())
            && b.iter().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == b'.' || *c == b'-')
            && b.first().is_some_and(u8::is_ascii_alphanumeric)
            && b.last().is_some_and(u8::is_ascii_alphanumeric);
        if !bucket_ok {
            return Err(format!("'{}' is not a valid bucket name", self.bucket));
        }
        if self.key.is_empty() || !self.key.bytes().all(is_key_byte) {
            return Err(format!("key '{}' contains characters outside [A-Za-z0-9/._+=,@:-]", self.key));
        }
        Ok(())
    }
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'/' | b'.' | b'_' | b'-' | b'+' | b'=' | b',' | b'@' | b':')
}

impl FromStr for ArtifactLocation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let rest = s.strip_prefix("s3://").ok_or_else(|| format!("'{s}' is not an s3:// url"))?;
        let location = match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Self { bucket: bucket.to_string(), key: key.to_string() }
            }
            _ => return Err(format!("'{s}' has no bucket or key")),
        };
        location.validate()?;
        Ok(location)
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl Serialize for ArtifactLocation {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArtifactLocation {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Named artifacts a node stages at first boot. Kept sorted by id so the
/// generated plan is stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetBundle {
    artifacts: BTreeMap<String, ArtifactLocation>,
}

impl AssetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, location: ArtifactLocation) -> Result<()> {
        let id = id.into();
        validate_artifact_id(&id)?;
        location.validate().map_err(|reason| ProvisionError::InvalidArtifact { artifact: id.clone(), reason })?;
        self.artifacts.insert(id, location);
        Ok(())
    }

    pub fn with(mut self, id: impl Into<String>, url: &str) -> Result<Self> {
        let id = id.into();
        let location = url
            .parse()
            .map_err(|reason| ProvisionError::InvalidArtifact { artifact: id.clone(), reason })?;
        self.insert(id, location)?;
        Ok(self)
    }

    /// Ids are checked here as well, since a bundle may have been deserialized.
    pub fn validate(&self) -> Result<()> {
        self.artifacts.iter().try_for_each(|(id, location)| {
            validate_artifact_id(id)?;
            location.validate().map_err(|reason| ProvisionError::InvalidArtifact { artifact: id.clone(), reason })
        })
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArtifactLocation)> {
        self.artifacts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// One `s3:GetObject` grant per artifact object.
    pub fn read_statements(&self) -> Vec<PolicyStatement> {
        self.iter()
            .map(|(id, loc)| {
                PolicyStatement::allow(&format!("ReadArtifact{}", pascal_case(id)), ["s3:GetObject"], loc.object_arn())
            })
            .collect()
    }
}

// ids become file names under the staging dir
fn validate_artifact_id(id: &str) -> Result<()> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
        return Err(ProvisionError::InvalidArtifact {
            artifact: id.to_string(),
            reason: "ids may only contain ASCII letters, digits, '_' and '-'".into(),
        });
    }
    Ok(())
}

fn pascal_case(id: &str) -> String {
    id.split(|c| c == '_' || c == '-')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut chars = p.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Plain-text user-data script carrying the cluster identity placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptTemplate(String);

impl ScriptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact-match substitution of the single placeholder.
    pub fn render(&self, cluster_arn: &str) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(ProvisionError::MissingTemplate);
        }
        let occurrences = self.0.matches(CLUSTER_ARN_PLACEHOLDER).count();
        if occurrences != 1 {
            return Err(ProvisionError::UnresolvedPlaceholder { token: CLUSTER_ARN_PLACEHOLDER, occurrences });
        }
        Ok(self.0.replacen(CLUSTER_ARN_PLACEHOLDER, cluster_arn, 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    Copy,
    Execute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum BootstrapStep {
    #[serde(rename_all = "camelCase")]
    Copy { artifact_id: String, source: ArtifactLocation, destination_path: String },
    Execute { script: String },
}

impl BootstrapStep {
    pub fn kind(&self) -> StepKind {
        match self {
            BootstrapStep::Copy { .. } => StepKind::Copy,
            BootstrapStep::Execute { .. } => StepKind::Execute,
        }
    }

    /// Shell form of the step as it appears in user data.
    pub fn command(&self) -> String {
        match self {
            BootstrapStep::Copy { source, destination_path, .. } => {
                format!("aws s3 cp {source} {destination_path}")
            }
            BootstrapStep::Execute { script } => script.clone(),
        }
    }
}

/// Copy steps in artifact-id order, then exactly one execute step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BootstrapPlan {
    steps: Vec<BootstrapStep>,
}

impl BootstrapPlan {
    pub fn steps(&self) -> &[BootstrapStep] {
        &self.steps
    }

    pub fn copy_steps(&self) -> &[BootstrapStep] {
        &self.steps[..self.steps.len().saturating_sub(1)]
    }

    pub fn execute_script(&self) -> &str {
        match self.steps.last() {
            Some(BootstrapStep::Execute { script }) => script,
            // compose_bootstrap always terminates the plan with an execute step
            _ => "",
        }
    }

    pub fn to_user_data(&self) -> String {
        let mut out = String::from("#!/bin/bash\n");
        for step in &self.steps {
            out.push_str(&step.command());
            out.push('\n');
        }
        out
    }
}

pub fn compose_bootstrap(
    assets: &AssetBundle,
    cluster: &ClusterRef,
    template: &ScriptTemplate,
) -> Result<BootstrapPlan> {
    let cluster_arn = cluster.identity_arn()?;
    assets.validate()?;
    let script = template.render(cluster_arn)?;

    let mut steps: Vec<BootstrapStep> = assets
        .iter()
        .map(|(id, location)| BootstrapStep::Copy {
            artifact_id: id.to_string(),
            source: location.clone(),
            destination_path: format!("{STAGING_DIR}/{id}.zip"),
        })
        .collect();
    steps.push(BootstrapStep::Execute { script });

    debug!(artifacts = assets.len(), cluster = cluster.name(), "composed bootstrap plan");
    Ok(BootstrapPlan { steps })
}
