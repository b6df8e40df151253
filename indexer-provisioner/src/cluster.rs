use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ProvisionError, Result};
use crate::ingress::{IngressRule, Port};
use crate::policy::{build_cluster_access_policy, PolicyStatement, Principal};
use crate::types::{validate_cluster_name, AccountContext, ClusterRef, InstanceClass, NetworkPlacement};

pub const DEFAULT_CLUSTER_NAME: &str = "blockchain";
pub const DEFAULT_KAFKA_VERSION: &str = "3.9.x.kraft";
pub const DEFAULT_BROKER_CLASS: &str = "m7g.xlarge";
pub const DEFAULT_BROKER_VOLUME_GIB: i64 = 16_384;
pub const DEFAULT_DELIVERY_PRINCIPAL: &str = "firehose.amazonaws.com";

pub const ZONE_COUNT: usize = 3;
pub const BROKERS_PER_ZONE: usize = 1;

const COORDINATION_PORT: u16 = 2181;
const TLS_LISTENER_PORT: u16 = 9094;
const IAM_LISTENER_PORT: u16 = 9098;

/// Cluster-wide knobs. TLS and IAM authentication are always on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterParams {
    pub name: String,
    /// Last segment of the cluster ARN. Composition fails without it.
    pub cluster_uuid: Option<String>,
    pub kafka_version: String,
    pub broker_instance_class: InstanceClass,
    pub broker_volume_gib: i64,
    /// Downstream consumer allowed to discover and connect, besides the nodes.
    pub delivery_principal: Option<Principal>,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLUSTER_NAME.to_string(),
            cluster_uuid: None,
            kafka_version: DEFAULT_KAFKA_VERSION.to_string(),
            broker_instance_class: InstanceClass::new(DEFAULT_BROKER_CLASS),
            broker_volume_gib: DEFAULT_BROKER_VOLUME_GIB,
            delivery_principal: Some(Principal::service(DEFAULT_DELIVERY_PRINCIPAL)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageMode {
    Tiered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientBrokerEncryption {
    Tls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionInTransit {
    pub client_broker: ClientBrokerEncryption,
    pub in_cluster: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientAuthentication {
    SaslIam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTopology {
    pub cluster: ClusterRef,
    pub kafka_version: String,
    pub broker_instance_class: InstanceClass,
    pub availability_zones: Vec<String>,
    pub broker_count: usize,
    pub broker_volume_gib: u64,
    pub storage_mode: StorageMode,
    pub encryption_in_transit: EncryptionInTransit,
    pub client_authentication: ClientAuthentication,
    pub broker_log_group: String,
    pub ingress: Vec<IngressRule>,
    pub access_policy: Vec<PolicyStatement>,
}

impl ClusterTopology {
    pub fn identity_arn(&self) -> Result<&str> {
        self.cluster.identity_arn()
    }
}

pub fn provision_cluster(
    ctx: &AccountContext,
    network: &NetworkPlacement,
    params: &ClusterParams,
) -> Result<ClusterTopology> {
    ctx.validate()?;
    network.validate()?;
    validate_cluster_name(&params.name)?;

    if network.availability_zones.len() < ZONE_COUNT {
        return Err(ProvisionError::InvalidNetworkPlacement {
            reason: format!(
                "{} availability zones available, {ZONE_COUNT} required",
                network.availability_zones.len()
            ),
        });
    }
    if params.broker_volume_gib <= 0 {
        return Err(ProvisionError::InvalidSize { size_gib: params.broker_volume_gib });
    }

    let zones: Vec<String> = network.availability_zones.iter().take(ZONE_COUNT).cloned().collect();
    debug!(cluster = %params.name, ?zones, "placing brokers");

    // Policies and the node script need the concrete cluster, never a pattern.
    let cluster = ClusterRef::unresolved(params.name.clone(), ctx)?;
    let cluster = match params.cluster_uuid.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(uuid) => cluster.with_uuid(uuid)?,
        None => return Err(ProvisionError::MissingClusterIdentity { cluster: params.name.clone() }),
    };

    let ingress = [
        (COORDINATION_PORT, "Cluster coordination from within the VPC"),
        (TLS_LISTENER_PORT, "TLS clients from within the VPC"),
        (IAM_LISTENER_PORT, "IAM clients from within the VPC"),
    ]
    .into_iter()
    .map(|(port, description)| IngressRule::from_cidr(network.cidr, Port::tcp(port), description))
    .collect();

    let access_policy = params
        .delivery_principal
        .iter()
        .map(|principal| build_cluster_access_policy(&cluster, principal))
        .collect::<Result<Vec<_>>>()?;

    info!(cluster = %params.name, brokers = zones.len() * BROKERS_PER_ZONE, "composed broker cluster");
    Ok(ClusterTopology {
        broker_count: zones.len() * BROKERS_PER_ZONE,
        kafka_version: params.kafka_version.clone(),
        broker_instance_class: params.broker_instance_class.clone(),
        availability_zones: zones,
        broker_volume_gib: params.broker_volume_gib as u64,
        storage_mode: StorageMode::Tiered,
        encryption_in_transit: EncryptionInTransit { client_broker: ClientBrokerEncryption::Tls, in_cluster: true },
        client_authentication: ClientAuthentication::SaslIam,
        broker_log_group: format!("/indexer/{}/broker", params.name),
        ingress,
        access_policy,
        cluster,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AccountContext {
        AccountContext::new("111111111111", "us-east-1").unwrap()
    }

    fn params() -> ClusterParams {
        ClusterParams { cluster_uuid: Some("0b1c2d3e-aa01-2".into()), ..ClusterParams::default() }
    }

    fn network(zones: &[&str]) -> NetworkPlacement {
        NetworkPlacement {
            vpc_id: "vpc-0abc".into(),
            cidr: "172.31.0.0/16".parse().unwrap(),
            availability_zones: zones.iter().map(|z| z.to_string()).collect(),
        }
    }

    #[test]
    fn one_broker_per_zone_across_three_zones() {
        let net = network(&["us-east-1a", "us-east-1b", "us-east-1c", "us-east-1d"]);
        let topo = provision_cluster(&ctx(), &net, &params()).unwrap();
        assert_eq!(topo.availability_zones, ["us-east-1a", "us-east-1b", "us-east-1c"]);
        assert_eq!(topo.broker_count, 3);
        assert_eq!(topo.storage_mode, StorageMode::Tiered);
        assert_eq!(topo.client_authentication, ClientAuthentication::SaslIam);
        assert!(topo.encryption_in_transit.in_cluster);
    }

    #[test]
    fn too_few_zones() {
        let net = network(&["us-east-1a", "us-east-1b"]);
        assert!(matches!(
            provision_cluster(&ctx(), &net, &params()),
            Err(ProvisionError::InvalidNetworkPlacement { .. })
        ));
    }

    #[test]
    fn identity_uses_uuid() {
        let net = network(&["a", "b", "c"]);
        let topo = provision_cluster(&ctx(), &net, &params()).unwrap();
        assert_eq!(
            topo.identity_arn().unwrap(),
            "arn:aws:kafka:us-east-1:111111111111:cluster/blockchain/0b1c2d3e-aa01-2"
        );
        assert!(topo.access_policy.iter().all(|s| !s.resource.contains('*')));
    }

    #[test]
    fn unknown_uuid_is_a_missing_identity() {
        let net = network(&["a", "b", "c"]);
        let expected = Err(ProvisionError::MissingClusterIdentity { cluster: "blockchain".into() });
        assert_eq!(provision_cluster(&ctx(), &net, &ClusterParams::default()), expected);

        let blank = ClusterParams { cluster_uuid: Some("  ".into()), ..ClusterParams::default() };
        assert_eq!(provision_cluster(&ctx(), &net, &blank), expected);

        let wildcard = ClusterParams { cluster_uuid: Some("*".into()), ..ClusterParams::default() };
        assert!(matches!(
            provision_cluster(&ctx(), &net, &wildcard),
            Err(ProvisionError::InvalidClusterIdentity { .. })
        ));
    }

    #[test]
    fn ingress_only_from_network_range() {
        let net = network(&["a", "b", "c"]);
        let topo = provision_cluster(&ctx(), &net, &params()).unwrap();
        assert!(topo.ingress.iter().all(|r| r.source == net.cidr && !r.is_public()));
        let ports: Vec<_> = topo.ingress.iter().map(|r| r.port.number).collect();
        assert_eq!(ports, [2181, 9094, 9098]);
    }

    #[test]
    fn delivery_principal_is_optional() {
        let net = network(&["a", "b", "c"]);
        let topo = provision_cluster(&ctx(), &net, &params()).unwrap();
        assert_eq!(topo.access_policy.len(), 1);
        assert_eq!(topo.access_policy[0].principal, Some(Principal::service("firehose.amazonaws.com")));

        let no_delivery = ClusterParams { delivery_principal: None, ..params() };
        let topo = provision_cluster(&ctx(), &net, &no_delivery).unwrap();
        assert!(topo.access_policy.is_empty());
    }

    #[test]
    fn rejects_bad_params() {
        let net = network(&["a", "b", "c"]);
        let bad_name = ClusterParams { name: "bad/name".into(), ..params() };
        assert!(matches!(
            provision_cluster(&ctx(), &net, &bad_name),
            Err(ProvisionError::InvalidClusterName { .. })
        ));
        let no_storage = ClusterParams { broker_volume_gib: 0, ..params() };
        assert!(matches!(provision_cluster(&ctx(), &net, &no_storage), Err(ProvisionError::InvalidSize { .. })));
    }
}
