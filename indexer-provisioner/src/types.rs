use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{ProvisionError, Result};

pub const DEFAULT_INSTANCE_CLASS: &str = "i8g.4xlarge";
pub const DEFAULT_EXTRACTION_VOLUME_GIB: i64 = 10_000;
/// Widest range accepted as the private network.
pub const MIN_PRIVATE_PREFIX: u8 = 8;

/// Account and region the whole stack is provisioned into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountContext {
    pub account_id: String,
    pub region: String,
}

impl AccountContext {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Result<Self> {
        let ctx = Self { account_id: account_id.into(), region: region.into() };
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn validate(&self) -> Result<()> {
        if self.account_id.len() != 12 || !self.account_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProvisionError::InvalidAccountContext {
                reason: format!("account id '{}' is not 12 digits", self.account_id),
            });
        }
        let region_ok = !self.region.is_empty()
            && self.region.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if !region_ok {
            return Err(ProvisionError::InvalidAccountContext {
                reason: format!("region '{}' is not a region identifier", self.region),
            });
        }
        Ok(())
    }
}

/// EC2 instance type, e.g. `i8g.4xlarge`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceClass(String);

impl InstanceClass {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceClass {
    fn default() -> Self {
        Self(DEFAULT_INSTANCE_CLASS.to_string())
    }
}

impl fmt::Display for InstanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-network node parameters supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub network_variant_name: String,
    #[serde(default)]
    pub instance_class: Option<InstanceClass>,
    #[serde(default)]
    pub extraction_volume_size_gib: Option<i64>,
}

impl NodeSpec {
    pub fn new(network_variant_name: impl Into<String>) -> Self {
        Self {
            network_variant_name: network_variant_name.into(),
            instance_class: None,
            extraction_volume_size_gib: None,
        }
    }

    pub fn with_instance_class(mut self, class: InstanceClass) -> Self {
        self.instance_class = Some(class);
        self
    }

    pub fn with_extraction_volume_gib(mut self, size_gib: i64) -> Self {
        self.extraction_volume_size_gib = Some(size_gib);
        self
    }

    pub fn resolved_instance_class(&self) -> InstanceClass {
        self.instance_class.clone().unwrap_or_default()
    }

    pub fn resolved_extraction_volume_gib(&self) -> i64 {
        self.extraction_volume_size_gib.unwrap_or(DEFAULT_EXTRACTION_VOLUME_GIB)
    }
}

/// Handle to the broker cluster. The name is validated on construction so that
/// topic and group patterns derived from it stay inside the cluster namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRef {
    identity_arn: Option<String>,
    name: String,
    region: String,
    account_id: String,
}

impl ClusterRef {
    /// A reference whose identity is not known yet.
    pub fn unresolved(name: impl Into<String>, ctx: &AccountContext) -> Result<Self> {
        let name = name.into();
        validate_cluster_name(&name)?;
        Ok(Self {
            identity_arn: None,
            name,
            region: ctx.region.clone(),
            account_id: ctx.account_id.clone(),
        })
    }

    /// Attach the cluster ARN. It has to name this cluster, in this account and
    /// region, with a concrete uuid segment.
    pub fn with_identity(mut self, arn: impl Into<String>) -> Result<Self> {
        let arn = arn.into();
        if arn.trim().is_empty() {
            return Err(ProvisionError::MissingClusterIdentity { cluster: self.name });
        }
        let prefix = crate::arn::kafka_cluster(&self.region, &self.account_id, &self.name, "");
        let rejected = match arn.strip_prefix(prefix.as_str()) {
            None => Some("not this cluster's account, region or name"),
            Some(uuid) => check_cluster_uuid(uuid).err(),
        };
        if let Some(reason) = rejected {
            return Err(ProvisionError::InvalidClusterIdentity { cluster: self.name, arn, reason });
        }
        self.identity_arn = Some(arn);
        Ok(self)
    }

    pub fn with_uuid(self, uuid: &str) -> Result<Self> {
        let arn = crate::arn::kafka_cluster(&self.region, &self.account_id, &self.name, uuid.trim());
        self.with_identity(arn)
    }

    pub fn identity_arn(&self) -> Result<&str> {
        self.identity_arn
            .as_deref()
            .ok_or_else(|| ProvisionError::MissingClusterIdentity { cluster: self.name.clone() })
    }

    pub fn is_resolved(&self) -> bool {
        self.identity_arn.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

pub fn validate_cluster_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.len() > 64 {
        Some("must be at most 64 characters")
    } else if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        Some("only ASCII letters, digits and '-' are allowed")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ProvisionError::InvalidClusterName { name: name.to_string(), reason }),
        None => Ok(()),
    }
}

fn check_cluster_uuid(uuid: &str) -> std::result::Result<(), &'static str> {
    if uuid.is_empty() {
        return Err("uuid segment is empty");
    }
    if !uuid.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err("uuid segment may only contain ASCII letters, digits and '-'");
    }
    Ok(())
}

/// IPv4 network range in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub const ANY: Ipv4Cidr = Ipv4Cidr { addr: Ipv4Addr::UNSPECIFIED, prefix: 0 };

    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(ProvisionError::InvalidNetworkPlacement {
                reason: format!("prefix /{prefix} is longer than 32 bits"),
            });
        }
        let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
        if u32::from(addr) & !mask != 0 {
            return Err(ProvisionError::InvalidNetworkPlacement {
                reason: format!("{addr}/{prefix} has host bits set"),
            });
        }
        Ok(Self { addr, prefix })
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = if self.prefix == 0 { 0 } else { u32::MAX << (32 - self.prefix) };
        u32::from(ip) & mask == u32::from(self.addr)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProvisionError::InvalidNetworkPlacement { reason: format!("'{s}' is not an IPv4 CIDR") };
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        Self::new(addr, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Cidr {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The network the cluster and nodes are placed into. Resolving it (default
/// VPC lookup etc.) is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPlacement {
    pub vpc_id: String,
    pub cidr: Ipv4Cidr,
    pub availability_zones: Vec<String>,
}

impl NetworkPlacement {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> { Err(ProvisionError::InvalidNetworkPlacement { reason }) };
        if self.vpc_id.trim().is_empty() {
            return invalid("vpc id is empty".into());
        }
        // the range gates the private ports; VPCs are never wider than /8
        if self.cidr.prefix() < MIN_PRIVATE_PREFIX {
            return invalid(format!(
                "network range {} is wider than /{MIN_PRIVATE_PREFIX}",
                self.cidr
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for zone in &self.availability_zones {
            if zone.trim().is_empty() {
                return invalid("empty availability zone name".into());
            }
            if !seen.insert(zone.as_str()) {
                return invalid(format!("availability zone '{zone}' listed twice"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_spec_defaults() {
        let spec = NodeSpec::new("mainnet");
        assert_eq!(spec.resolved_instance_class().as_str(), "i8g.4xlarge");
        assert_eq!(spec.resolved_extraction_volume_gib(), 10_000);

        let spec = spec.with_extraction_volume_gib(4096);
        assert_eq!(spec.resolved_extraction_volume_gib(), 4096);
    }

    #[test]
    fn node_spec_deserializes_with_missing_fields() {
        let spec: NodeSpec = serde_json::from_str(r#"{"networkVariantName":"sepolia"}"#).unwrap();
        assert_eq!(spec, NodeSpec::new("sepolia"));
    }

    #[test]
    fn account_context_validation() {
        assert!(AccountContext::new("111111111111", "us-east-1").is_ok());
        assert!(matches!(
            AccountContext::new("1111", "us-east-1"),
            Err(ProvisionError::InvalidAccountContext { .. })
        ));
        assert!(AccountContext::new("111111111111", "").is_err());
        assert!(AccountContext::new("111111111111", "us east").is_err());
    }

    #[test]
    fn cluster_ref_requires_identity() {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        let cluster = ClusterRef::unresolved("blockchain", &ctx).unwrap();
        assert_eq!(
            cluster.identity_arn(),
            Err(ProvisionError::MissingClusterIdentity { cluster: "blockchain".into() })
        );
        let cluster = cluster.with_identity("arn:aws:kafka:us-east-1:111111111111:cluster/blockchain/abc").unwrap();
        assert!(cluster.is_resolved());

        assert!(ClusterRef::unresolved("", &ctx).is_err());
        assert!(ClusterRef::unresolved("a/b", &ctx).is_err());
        assert!(ClusterRef::unresolved("x*", &ctx).is_err());
        assert!(ClusterRef::unresolved("a".repeat(65), &ctx).is_err());
    }

    #[test]
    fn blank_identity_is_missing() {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        let res = ClusterRef::unresolved("blockchain", &ctx).unwrap().with_identity("  ");
        assert_eq!(res, Err(ProvisionError::MissingClusterIdentity { cluster: "blockchain".into() }));
    }

    #[test]
    fn identity_must_name_this_cluster() {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        let cluster = ClusterRef::unresolved("blockchain", &ctx).unwrap();

        for arn in [
            "*",
            "arn:aws:kafka:us-east-1:111111111111:cluster/blockchain/*",
            "arn:aws:kafka:us-east-1:111111111111:cluster/blockchain/",
            "arn:aws:kafka:us-east-1:111111111111:cluster/blockchain/abc/def",
            "arn:aws:kafka:us-east-1:111111111111:cluster/other/abc",
            "arn:aws:kafka:us-east-1:222222222222:cluster/blockchain/abc",
            "arn:aws:kafka:eu-west-1:111111111111:cluster/blockchain/abc",
            "arn:aws:kafka:us-east-1:111111111111:cluster/blockchain-2/abc",
        ] {
            assert!(
                matches!(cluster.clone().with_identity(arn), Err(ProvisionError::InvalidClusterIdentity { .. })),
                "{arn} accepted"
            );
        }
    }

    #[test]
    fn uuid_builds_the_cluster_arn() {
        let ctx = AccountContext::new("111111111111", "us-east-1").unwrap();
        let cluster = ClusterRef::unresolved("blockchain", &ctx).unwrap().with_uuid("6f0e1d2c-aa01-2").unwrap();
        assert_eq!(
            cluster.identity_arn().unwrap(),
            "arn:aws:kafka:us-east-1:111111111111:cluster/blockchain/6f0e1d2c-aa01-2"
        );
        let cluster = ClusterRef::unresolved("blockchain", &ctx).unwrap();
        assert!(cluster.clone().with_uuid("*").is_err());
        assert!(cluster.with_uuid("a b").is_err());
    }

    #[test]
    fn cidr_parsing() {
        let cidr: Ipv4Cidr = "172.31.0.0/16".parse().unwrap();
        assert_eq!(cidr.to_string(), "172.31.0.0/16");
        assert!(cidr.contains("172.31.4.5".parse().unwrap()));
        assert!(!cidr.contains("10.0.0.1".parse().unwrap()));

        assert!("172.31.0.1/16".parse::<Ipv4Cidr>().is_err());
        assert!("172.31.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("nonsense".parse::<Ipv4Cidr>().is_err());
        assert_eq!(Ipv4Cidr::ANY.to_string(), "0.0.0.0/0");
        assert!(Ipv4Cidr::ANY.contains("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn placement_validation() {
        let mut placement = NetworkPlacement {
            vpc_id: "vpc-0abc".into(),
            cidr: "172.31.0.0/16".parse().unwrap(),
            availability_zones: vec!["us-east-1a".into(), "us-east-1b".into()],
        };
        assert!(placement.validate().is_ok());

        placement.availability_zones.push("us-east-1a".into());
        assert!(matches!(placement.validate(), Err(ProvisionError::InvalidNetworkPlacement { .. })));

        placement.availability_zones.pop();
        placement.cidr = Ipv4Cidr::ANY;
        assert!(placement.validate().is_err());
    }

    #[test]
    fn private_range_is_at_most_slash_8() {
        let mut placement = NetworkPlacement {
            vpc_id: "vpc-0abc".into(),
            cidr: "10.0.0.0/8".parse().unwrap(),
            availability_zones: vec!["us-east-1a".into()],
        };
        assert!(placement.validate().is_ok());

        for wide in ["0.0.0.0/1", "128.0.0.0/1", "8.0.0.0/7"] {
            placement.cidr = wide.parse().unwrap();
            assert!(
                matches!(placement.validate(), Err(ProvisionError::InvalidNetworkPlacement { .. })),
                "{wide} accepted"
            );
        }
    }
}
