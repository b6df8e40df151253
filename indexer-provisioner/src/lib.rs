//! Composition of the blockchain indexer's infrastructure: one broker cluster,
//! per-network ingestion nodes, their least-privilege access statements and
//! first-boot plans. Everything here is a pure derivation over its inputs; the
//! provisioning engine that applies the result is an external collaborator.

pub mod arn;
pub mod bootstrap;
pub mod cluster;
pub mod config;
pub mod context;
pub mod error;
pub mod ingress;
pub mod mock;
pub mod node;
pub mod out;
pub mod policy;
pub mod stack;
pub mod storage;
pub mod types;
pub mod volumes;

pub use bootstrap::{compose_bootstrap, AssetBundle, BootstrapPlan, BootstrapStep, ScriptTemplate};
pub use cluster::{provision_cluster, ClusterParams, ClusterTopology};
pub use error::{ProvisionError, Result};
pub use node::{compose_node, NodeBlueprint};
pub use policy::{build_cluster_access_policy, build_producer_policy, PolicyStatement, Principal, ProducerPolicy};
pub use stack::{compose_stack, ComposedStack, StackOutputs};
pub use types::{AccountContext, ClusterRef, NetworkPlacement, NodeSpec};
pub use volumes::{derive_volumes, VolumeSpec};
