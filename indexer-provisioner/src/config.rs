//! Environment-driven configuration for the provisioner binary.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::bootstrap::{AssetBundle, ScriptTemplate};
use crate::cluster::{ClusterParams, DEFAULT_CLUSTER_NAME, DEFAULT_DELIVERY_PRINCIPAL};
use crate::out::OutMode;
use crate::policy::Principal;
use crate::types::{InstanceClass, Ipv4Cidr, NetworkPlacement, NodeSpec};

const PREFIX: &str = "INDEXER";

#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub node_specs: Vec<NodeSpec>,
    pub account_id: Option<String>,
    pub region: Option<String>,
    pub mock: bool,
    pub vpc_id: Option<String>,
    pub vpc_cidr: Option<Ipv4Cidr>,
    pub availability_zones: Vec<String>,
    pub cluster: ClusterParams,
    pub asset_manifest: Option<PathBuf>,
    pub userdata_template: Option<PathBuf>,
    pub out: OutMode,
    pub endpoint: String,
}

fn key(name: &str) -> String {
    format!("{PREFIX}_{name}")
}

fn variant_env_name(variant: &str) -> String {
    variant.to_ascii_uppercase().replace('-', "_")
}

fn variant_key(variant: &str, name: &str) -> String {
    format!("{PREFIX}_{}_{name}", variant_env_name(variant))
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|x| !x.is_empty()).map(str::to_string).collect()
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl ProvisionerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let get = |name: &str| raw(&key(name));

        let variants = parse_list(&get("NETWORKS").unwrap_or_else(|| "mainnet".into()));
        let mut node_specs = Vec::with_capacity(variants.len());
        let mut env_names: BTreeMap<String, String> = BTreeMap::new();
        for variant in variants {
            // overrides are keyed by the upper-cased name, which must stay unique
            let env_name = variant_env_name(&variant);
            if let Some(other) = env_names.insert(env_name.clone(), variant.clone()) {
                if other != variant {
                    bail!("network variants '{other}' and '{variant}' share the {} settings", key(&env_name));
                }
            }
            let mut spec = NodeSpec::new(variant.clone());
            if let Some(class) = raw(&variant_key(&variant, "INSTANCE_CLASS")) {
                spec = spec.with_instance_class(InstanceClass::new(class.trim()));
            }
            if let Some(size) = raw(&variant_key(&variant, "VOLUME_GIB")) {
                let size: i64 = size
                    .trim()
                    .parse()
                    .with_context(|| format!("{} is not an integer", variant_key(&variant, "VOLUME_GIB")))?;
                spec = spec.with_extraction_volume_gib(size);
            }
            node_specs.push(spec);
        }

        let vpc_cidr = get("VPC_CIDR")
            .map(|c| c.parse::<Ipv4Cidr>())
            .transpose()
            .map_err(|e| anyhow!("{}: {e}", key("VPC_CIDR")))?;

        let delivery_principal = match get("DELIVERY_PRINCIPAL") {
            Some(p) if p.trim().eq_ignore_ascii_case("none") => None,
            Some(p) => Some(Principal::parse(&p)),
            None => Some(Principal::service(DEFAULT_DELIVERY_PRINCIPAL)),
        };
        let cluster = ClusterParams {
            name: get("CLUSTER_NAME").unwrap_or_else(|| DEFAULT_CLUSTER_NAME.into()),
            cluster_uuid: get("CLUSTER_UUID"),
            delivery_principal,
            ..ClusterParams::default()
        };

        Ok(Self {
            node_specs,
            account_id: get("ACCOUNT_ID"),
            region: get("REGION"),
            mock: get("MOCK").as_deref().map(parse_flag).unwrap_or(false),
            vpc_id: get("VPC_ID"),
            vpc_cidr,
            availability_zones: get("AVAILABILITY_ZONES").as_deref().map(parse_list).unwrap_or_default(),
            cluster,
            asset_manifest: get("ASSET_MANIFEST").map(PathBuf::from),
            userdata_template: get("USERDATA_TEMPLATE").map(PathBuf::from),
            out: OutMode::parse(&get("OUT").unwrap_or_default()),
            endpoint: get("ENDPOINT").unwrap_or_else(|| "http://localhost:8080/api/stacks".into()),
        })
    }

    /// Network placement from config; every field is required outside mock mode.
    pub fn placement(&self) -> Result<NetworkPlacement> {
        let vpc_id = self.vpc_id.clone().ok_or_else(|| anyhow!("{} is not set", key("VPC_ID")))?;
        let cidr = self.vpc_cidr.ok_or_else(|| anyhow!("{} is not set", key("VPC_CIDR")))?;
        if self.availability_zones.is_empty() {
            return Err(anyhow!("{} is not set", key("AVAILABILITY_ZONES")));
        }
        Ok(NetworkPlacement { vpc_id, cidr, availability_zones: self.availability_zones.clone() })
    }

    pub fn load_assets(&self) -> Result<AssetBundle> {
        let path = self.asset_manifest.as_ref().ok_or_else(|| anyhow!("{} is not set", key("ASSET_MANIFEST")))?;
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let bundle: AssetBundle =
            serde_json::from_str(&raw).with_context(|| format!("parsing asset manifest {}", path.display()))?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn load_template(&self) -> Result<ScriptTemplate> {
        let path = self
            .userdata_template
            .as_ref()
            .ok_or_else(|| anyhow!("{} is not set", key("USERDATA_TEMPLATE")))?;
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(ScriptTemplate::new(raw))
    }
}
