//! One ingestion node: compute, volumes, ingress, access and first-boot plan.

use serde::Serialize;
use tracing::{debug, info};

use crate::arn;
use crate::bootstrap::{compose_bootstrap, AssetBundle, BootstrapPlan, ScriptTemplate};
use crate::error::{ProvisionError, Result};
use crate::ingress::{node_ingress, IngressRule};
use crate::policy::{build_producer_policy, PolicyStatement, Principal, ProducerPolicy};
use crate::types::{ClusterRef, InstanceClass, NetworkPlacement, NodeSpec};
use crate::volumes::{derive_volumes, VolumeSpec};

const NODE_MANAGED_POLICIES: [&str; 2] = ["AmazonSSMManagedInstanceCore", "CloudWatchAgentServerPolicy"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CpuArch {
    Arm64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    pub family: &'static str,
    pub arch: CpuArch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubnetKind {
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRole {
    pub assumed_by: Principal,
    pub managed_policies: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeSpec {
    pub instance_class: InstanceClass,
    pub machine_image: MachineImage,
    pub subnet: SubnetKind,
    pub vpc_id: String,
    pub detailed_monitoring: bool,
    pub role: InstanceRole,
}

/// Fully composed node. Built once by [`compose_node`]; the only later change
/// is [`NodeBlueprint::with_grants`], which consumes the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBlueprint {
    pub variant: String,
    pub instance_id: String,
    pub compute: ComputeSpec,
    pub volumes: VolumeSpec,
    pub ingress: Vec<IngressRule>,
    pub producer_policy: ProducerPolicy,
    pub role_statements: Vec<PolicyStatement>,
    pub bootstrap: BootstrapPlan,
}

impl NodeBlueprint {
    /// Attach extra role statements, e.g. the shared file-transfer bucket.
    pub fn with_grants(mut self, statements: impl IntoIterator<Item = PolicyStatement>) -> Self {
        self.role_statements.extend(statements);
        self
    }

    pub fn statements(&self) -> impl Iterator<Item = &PolicyStatement> {
        self.producer_policy.statements().iter().chain(self.role_statements.iter())
    }

    pub fn user_data(&self) -> String {
        self.bootstrap.to_user_data()
    }
}

pub fn validate_variant_name(variant: &str) -> Result<()> {
    if variant.is_empty() || !variant.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
        return Err(ProvisionError::InvalidNetworkVariant { variant: variant.to_string() });
    }
    Ok(())
}

// Volume throughput is tuned from user data. Describe calls can't be scoped,
// attach/modify stay inside this account and region.
fn volume_tuning_statements(cluster: &ClusterRef) -> Vec<PolicyStatement> {
    let (region, account) = (cluster.region(), cluster.account_id());
    vec![
        PolicyStatement::allow("VolumeDiscovery", ["ec2:DescribeVolumes"], "*"),
        PolicyStatement::allow(
            "VolumeTuning",
            ["ec2:AttachVolume", "ec2:ModifyVolume"],
            arn::ec2_volumes(region, account),
        ),
        PolicyStatement::allow("VolumeAttachTarget", ["ec2:AttachVolume"], arn::ec2_instances(region, account)),
    ]
}

pub fn compose_node(
    spec: &NodeSpec,
    cluster: &ClusterRef,
    network: &NetworkPlacement,
    assets: &AssetBundle,
    template: &ScriptTemplate,
) -> Result<NodeBlueprint> {
    let variant = spec.network_variant_name.as_str();
    validate_variant_name(variant)?;
    network.validate()?;

    let instance_class = spec.resolved_instance_class();
    let extraction_gib = spec.resolved_extraction_volume_gib();
    debug!(variant, %instance_class, extraction_gib, "composing node");

    let volumes = derive_volumes(extraction_gib)?;
    let producer_policy = build_producer_policy(cluster)?;
    let bootstrap = compose_bootstrap(assets, cluster, template)?;
    let ingress = node_ingress(network.cidr);

    let mut role_statements = volume_tuning_statements(cluster);
    role_statements.extend(assets.read_statements());

    let compute = ComputeSpec {
        instance_class,
        machine_image: MachineImage { family: "amazon-linux-2023", arch: CpuArch::Arm64 },
        subnet: SubnetKind::Public,
        vpc_id: network.vpc_id.clone(),
        detailed_monitoring: true,
        role: InstanceRole {
            assumed_by: Principal::service("ec2.amazonaws.com"),
            managed_policies: NODE_MANAGED_POLICIES.to_vec(),
        },
    };

    info!(variant, cluster = cluster.name(), "composed ingestion node");
    Ok(NodeBlueprint {
        variant: variant.to_string(),
        instance_id: format!("{variant}-node"),
        compute,
        volumes,
        ingress,
        producer_policy,
        role_statements,
        bootstrap,
    })
}
