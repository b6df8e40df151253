//! Whole-stack composition: one broker cluster, one node per network variant,
//! and the shared file-transfer bucket.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::bootstrap::{AssetBundle, ScriptTemplate};
use crate::cluster::{provision_cluster, ClusterParams, ClusterTopology};
use crate::error::{ProvisionError, Result};
use crate::node::{compose_node, NodeBlueprint};
use crate::storage::SharedStorage;
use crate::types::{AccountContext, NetworkPlacement, NodeSpec};

/// Informational results for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackOutputs {
    pub vpc_id: String,
    pub cluster_arn: String,
    pub cluster_name: String,
    pub node_instance_ids: BTreeMap<String, String>,
    pub file_transfer_bucket_name: String,
    pub file_transfer_bucket_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedStack {
    pub cluster: ClusterTopology,
    pub nodes: Vec<NodeBlueprint>,
    pub storage: SharedStorage,
    pub outputs: StackOutputs,
}

fn check_variants(specs: &[NodeSpec]) -> Result<()> {
    if specs.is_empty() {
        return Err(ProvisionError::EmptyNodeSet);
    }
    let mut seen = BTreeSet::new();
    for spec in specs {
        if !seen.insert(spec.network_variant_name.as_str()) {
            return Err(ProvisionError::DuplicateNetworkVariant { variant: spec.network_variant_name.clone() });
        }
    }
    Ok(())
}

pub fn compose_stack(
    ctx: &AccountContext,
    network: &NetworkPlacement,
    cluster_params: &ClusterParams,
    node_specs: &[NodeSpec],
    assets: &AssetBundle,
    template: &ScriptTemplate,
) -> Result<ComposedStack> {
    check_variants(node_specs)?;

    // The cluster identity must exist before any node policy or script uses it.
    let cluster = provision_cluster(ctx, network, cluster_params)?;
    let storage = SharedStorage::file_transfer(ctx);

    // Nodes share nothing mutable; order only affects output order.
    let nodes = node_specs
        .iter()
        .map(|spec| {
            compose_node(spec, &cluster.cluster, network, assets, template)
                .map(|node| node.with_grants(storage.read_write_statements()))
        })
        .collect::<Result<Vec<_>>>()?;

    let outputs = StackOutputs {
        vpc_id: network.vpc_id.clone(),
        cluster_arn: cluster.identity_arn()?.to_string(),
        cluster_name: cluster.cluster.name().to_string(),
        node_instance_ids: nodes.iter().map(|n| (n.variant.clone(), n.instance_id.clone())).collect(),
        file_transfer_bucket_name: storage.bucket_name.clone(),
        file_transfer_bucket_arn: storage.bucket_arn.clone(),
    };

    info!(cluster = %outputs.cluster_name, nodes = nodes.len(), "composed indexer stack");
    Ok(ComposedStack { cluster, nodes, storage, outputs })
}
