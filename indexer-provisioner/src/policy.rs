//! Least-privilege access statements for the broker cluster.
//!
//! Resource patterns are always derived from a [`ClusterRef`]; callers never
//! pass ARNs in, so they cannot widen or narrow the scope by accident.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::arn;
use crate::error::Result;
use crate::types::ClusterRef;

/// Statements only ever grant; denials are left to account-level guardrails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Principal {
    /// A service principal such as `firehose.amazonaws.com`.
    Service(String),
    /// An IAM role or account ARN.
    Arn(String),
}

impl Principal {
    pub fn service(name: impl Into<String>) -> Self {
        Principal::Service(name.into())
    }

    /// `arn:...` values become [`Principal::Arn`], anything else a service.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.starts_with("arn:") {
            Principal::Arn(s.to_string())
        } else {
            Principal::Service(s.to_string())
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Service(s) | Principal::Arn(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatement {
    pub sid: String,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub actions: BTreeSet<String>,
    pub resource: String,
}

impl PolicyStatement {
    pub fn allow<'a>(sid: &str, actions: impl IntoIterator<Item = &'a str>, resource: impl Into<String>) -> Self {
        Self {
            sid: sid.to_string(),
            effect: Effect::Allow,
            principal: None,
            actions: actions.into_iter().map(str::to_string).collect(),
            resource: resource.into(),
        }
    }

    pub fn for_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn is_wildcard_resource(&self) -> bool {
        self.resource == "*"
    }
}

/// The four producer statement groups, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatementGroup {
    BrokerDiscovery,
    ClusterConnect,
    TopicReadWrite,
    ConsumerGroup,
}

impl StatementGroup {
    pub const ALL: [StatementGroup; 4] = [
        StatementGroup::BrokerDiscovery,
        StatementGroup::ClusterConnect,
        StatementGroup::TopicReadWrite,
        StatementGroup::ConsumerGroup,
    ];

    pub fn sid(self) -> &'static str {
        match self {
            StatementGroup::BrokerDiscovery => "BrokerDiscovery",
            StatementGroup::ClusterConnect => "ClusterConnect",
            StatementGroup::TopicReadWrite => "TopicReadWrite",
            StatementGroup::ConsumerGroup => "ConsumerGroup",
        }
    }
}

// Listing clusters and fetching bootstrap brokers cannot be scoped to a
// resource, so this group is the only one with a `*` resource.
const DISCOVERY_ACTIONS: [&str; 3] = ["kafka:ListClusters", "kafka:ListClustersV2", "kafka:GetBootstrapBrokers"];
const CONNECT_ACTIONS: [&str; 3] =
    ["kafka-cluster:Connect", "kafka-cluster:AlterCluster", "kafka-cluster:DescribeCluster"];
const TOPIC_ACTIONS: [&str; 3] = ["kafka-cluster:*Topic*", "kafka-cluster:WriteData", "kafka-cluster:ReadData"];
const GROUP_ACTIONS: [&str; 2] = ["kafka-cluster:AlterGroup", "kafka-cluster:DescribeGroup"];
const TRUSTED_PRINCIPAL_ACTIONS: [&str; 4] = [
    "kafka:CreateVpcConnection",
    "kafka:DescribeCluster",
    "kafka:DescribeClusterV2",
    "kafka:GetBootstrapBrokers",
];

/// Statements letting a node produce into (and read back from) one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProducerPolicy {
    statements: Vec<PolicyStatement>,
}

impl ProducerPolicy {
    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    pub fn statement(&self, group: StatementGroup) -> &PolicyStatement {
        // built from StatementGroup::ALL, so the index is always present
        &self.statements[group as usize]
    }
}

pub fn build_producer_policy(cluster: &ClusterRef) -> Result<ProducerPolicy> {
    let cluster_arn = cluster.identity_arn()?;
    let (region, account, name) = (cluster.region(), cluster.account_id(), cluster.name());
    debug!(cluster = name, "building producer policy");

    let statements = StatementGroup::ALL
        .iter()
        .map(|&group| match group {
            StatementGroup::BrokerDiscovery => PolicyStatement::allow(group.sid(), DISCOVERY_ACTIONS, "*"),
            StatementGroup::ClusterConnect => PolicyStatement::allow(group.sid(), CONNECT_ACTIONS, cluster_arn),
            StatementGroup::TopicReadWrite => {
                PolicyStatement::allow(group.sid(), TOPIC_ACTIONS, arn::kafka_topics(region, account, name))
            }
            StatementGroup::ConsumerGroup => {
                PolicyStatement::allow(group.sid(), GROUP_ACTIONS, arn::kafka_groups(region, account, name))
            }
        })
        .collect();

    Ok(ProducerPolicy { statements })
}

/// Cluster-scoped statement for a principal other than the ingestion nodes,
/// e.g. a delivery pipeline that needs to discover and connect.
pub fn build_cluster_access_policy(cluster: &ClusterRef, trusted: &Principal) -> Result<PolicyStatement> {
    let cluster_arn = cluster.identity_arn()?;
    debug!(cluster = cluster.name(), principal = %trusted, "building cluster access policy");
    Ok(PolicyStatement::allow("TrustedPrincipalAccess", TRUSTED_PRINCIPAL_ACTIONS, cluster_arn)
        .for_principal(trusted.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::types::AccountContext;

    const CLUSTER_ARN: &str = "arn:aws:kafka:us-east-1:111111111111:cluster/blockchain/0b1c2d3e";

    fn cluster() -> ClusterRef {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        ClusterRef::unresolved("blockchain", &ctx).unwrap().with_identity(CLUSTER_ARN).unwrap()
    }

    #[test]
    fn four_groups_in_fixed_order() {
        let policy = build_producer_policy(&cluster()).unwrap();
        let sids: Vec<_> = policy.statements().iter().map(|s| s.sid.as_str()).collect();
        assert_eq!(sids, ["BrokerDiscovery", "ClusterConnect", "TopicReadWrite", "ConsumerGroup"]);
    }

    #[test]
    fn topic_and_group_patterns_are_cluster_scoped() {
        let policy = build_producer_policy(&cluster()).unwrap();
        assert_eq!(
            policy.statement(StatementGroup::TopicReadWrite).resource,
            "arn:aws:kafka:us-east-1:111111111111:topic/blockchain/*"
        );
        assert_eq!(
            policy.statement(StatementGroup::ConsumerGroup).resource,
            "arn:aws:kafka:us-east-1:111111111111:group/blockchain/*"
        );
        assert_eq!(policy.statement(StatementGroup::ClusterConnect).resource, CLUSTER_ARN);
        assert!(policy.statement(StatementGroup::TopicReadWrite).actions.contains("kafka-cluster:WriteData"));
    }

    #[test]
    fn only_discovery_uses_wildcard_resource() {
        let policy = build_producer_policy(&cluster()).unwrap();
        let wildcards: Vec<_> = policy.statements().iter().filter(|s| s.is_wildcard_resource()).collect();
        assert_eq!(wildcards.len(), 1);
        assert_eq!(wildcards[0].sid, "BrokerDiscovery");
    }

    #[test]
    fn unresolved_cluster_is_an_ordering_error() {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        let unresolved = ClusterRef::unresolved("blockchain", &ctx).unwrap();
        assert_eq!(
            build_producer_policy(&unresolved),
            Err(ProvisionError::MissingClusterIdentity { cluster: "blockchain".into() })
        );
        assert!(build_cluster_access_policy(&unresolved, &Principal::service("firehose.amazonaws.com")).is_err());
    }

    #[test]
    fn foreign_identity_cannot_widen_connect() {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        for arn in ["*", "arn:aws:kafka:us-east-1:222222222222:cluster/other/x"] {
            let res = ClusterRef::unresolved("blockchain", &ctx).unwrap().with_identity(arn);
            assert!(matches!(res, Err(ProvisionError::InvalidClusterIdentity { .. })), "{arn} accepted");
        }
    }

    #[test]
    fn trusted_principal_statement() {
        let stmt = build_cluster_access_policy(&cluster(), &Principal::service("firehose.amazonaws.com")).unwrap();
        assert_eq!(stmt.principal, Some(Principal::Service("firehose.amazonaws.com".into())));
        assert_eq!(stmt.resource, CLUSTER_ARN);
        assert!(stmt.actions.contains("kafka:CreateVpcConnection"));
        assert_eq!(stmt.actions.len(), 4);
    }

    #[test]
    fn principal_parse() {
        assert_eq!(Principal::parse("firehose.amazonaws.com"), Principal::Service("firehose.amazonaws.com".into()));
        assert_eq!(
            Principal::parse(" arn:aws:iam::222222222222:role/delivery "),
            Principal::Arn("arn:aws:iam::222222222222:role/delivery".into())
        );
    }

    mod proptests {
        use super::super::*;
        use crate::types::AccountContext;
        use proptest::prelude::*;

        fn arb_cluster() -> impl Strategy<Value = ClusterRef> {
            ("[0-9]{12}", "[a-z]{2}-[a-z]{4,9}-[1-3]", "[A-Za-z0-9][A-Za-z0-9-]{0,40}", "[a-f0-9]{8}").prop_map(
                |(account, region, name, uuid)| {
                    let ctx = AccountContext::new(account, region).unwrap();
                    let arn = arn::kafka_cluster(&ctx.region, &ctx.account_id, &name, &uuid);
                    ClusterRef::unresolved(name, &ctx).unwrap().with_identity(arn).unwrap()
                },
            )
        }

        proptest! {
            #[test]
            fn scoped_patterns_stay_in_cluster_namespace(cluster in arb_cluster()) {
                let policy = build_producer_policy(&cluster).unwrap();
                let prefix = format!("arn:aws:kafka:{}:{}:", cluster.region(), cluster.account_id());
                for stmt in policy.statements().iter().filter(|s| !s.is_wildcard_resource()) {
                    prop_assert!(stmt.resource.starts_with(&prefix));
                    let (_, rest) = stmt.resource.split_at(prefix.len());
                    let mut parts = rest.splitn(3, '/');
                    let _kind = parts.next();
                    prop_assert_eq!(parts.next(), Some(cluster.name()));
                }
            }

            #[test]
            fn identities_outside_the_namespace_are_refused(
                cluster in arb_cluster(),
                other in "[ -~]{0,80}",
            ) {
                let prefix = arn::kafka_cluster(cluster.region(), cluster.account_id(), cluster.name(), "");
                prop_assume!(!other.starts_with(&prefix));
                let fresh = ClusterRef::unresolved(cluster.name(), &AccountContext {
                    account_id: cluster.account_id().to_string(),
                    region: cluster.region().to_string(),
                })
                .unwrap();
                prop_assert!(fresh.with_identity(other).is_err());
            }

            #[test]
            fn building_twice_is_identical(cluster in arb_cluster()) {
                prop_assert_eq!(build_producer_policy(&cluster).unwrap(), build_producer_policy(&cluster).unwrap());
            }
        }
    }
}
