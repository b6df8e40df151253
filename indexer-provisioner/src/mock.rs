//! Fixed inputs for `INDEXER_MOCK=1`: compose a full stack locally without
//! AWS credentials, asset manifests or a user-data template on disk.

use crate::bootstrap::{
    AssetBundle, ScriptTemplate, LAST_BLOCK_TRACKER, MONITOR_BROKER, MONITOR_EXTRACTION, SCRIPTS,
};
use crate::cluster::ClusterParams;
use crate::error::Result;
use crate::stack::{compose_stack, ComposedStack};
use crate::types::{AccountContext, NetworkPlacement, NodeSpec};

pub const ACCOUNT_ID: &str = "111111111111";
pub const REGION: &str = "us-east-1";
pub const CLUSTER_UUID: &str = "6f0e1d2c-3b4a-4c5d-9e8f-0a1b2c3d4e5f-2";

pub fn account_context() -> Result<AccountContext> {
    AccountContext::new(ACCOUNT_ID, REGION)
}

pub fn placement() -> Result<NetworkPlacement> {
    Ok(NetworkPlacement {
        vpc_id: "vpc-0mock0000000000".into(),
        cidr: "172.31.0.0/16".parse()?,
        availability_zones: vec!["us-east-1a".into(), "us-east-1b".into(), "us-east-1c".into()],
    })
}

pub fn assets() -> Result<AssetBundle> {
    AssetBundle::new()
        .with(MONITOR_EXTRACTION, "s3://cdk-assets-mock/monitor_extraction.zip")?
        .with(LAST_BLOCK_TRACKER, "s3://cdk-assets-mock/lastBlock.zip")?
        .with(MONITOR_BROKER, "s3://cdk-assets-mock/monitor_kafka.zip")?
        .with(SCRIPTS, "s3://cdk-assets-mock/scripts.zip")
}

pub fn template() -> ScriptTemplate {
    ScriptTemplate::new(
        "cd /tmp && for z in *.zip; do unzip -o \"$z\" -d \"${z%.zip}\"; done\n\
         echo 'KAFKA_CLUSTER_ARN=__KAFKA_CLUSTER_ARN__' >> /etc/environment\n\
         bash /tmp/scripts/setup.sh\n",
    )
}

/// Stack for the given variants over the fixtures above. A missing cluster
/// uuid falls back to [`CLUSTER_UUID`].
pub fn stack_for(node_specs: &[NodeSpec], params: &ClusterParams) -> Result<ComposedStack> {
    let mut params = params.clone();
    params.cluster_uuid.get_or_insert_with(|| CLUSTER_UUID.to_string());
    compose_stack(&account_context()?, &placement()?, &params, node_specs, &assets()?, &template())
}

pub fn stack() -> Result<ComposedStack> {
    stack_for(&[NodeSpec::new("mainnet")], &ClusterParams::default())
}
