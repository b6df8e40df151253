use serde::Serialize;
use std::fmt;

use crate::types::Ipv4Cidr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub protocol: Protocol,
    pub number: u16,
}

impl Port {
    pub const fn tcp(number: u16) -> Self {
        Self { protocol: Protocol::Tcp, number }
    }

    pub const fn udp(number: u16) -> Self {
        Self { protocol: Protocol::Udp, number }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::Tcp => write!(f, "tcp/{}", self.number),
            Protocol::Udp => write!(f, "udp/{}", self.number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    pub source: Ipv4Cidr,
    pub port: Port,
    pub description: String,
}

impl IngressRule {
    pub fn from_any_ipv4(port: Port, description: &str) -> Self {
        Self { source: Ipv4Cidr::ANY, port, description: description.to_string() }
    }

    pub fn from_cidr(source: Ipv4Cidr, port: Port, description: &str) -> Self {
        Self { source, port, description: description.to_string() }
    }

    pub fn is_public(&self) -> bool {
        self.source.prefix() == 0
    }
}

pub const CONSENSUS_P2P_PORT: u16 = 9000;
pub const CONSENSUS_QUIC_PORT: u16 = 9001;
pub const EXECUTION_P2P_PORT: u16 = 30303;
pub const RPC_PORT: u16 = 8545;
pub const WS_RPC_PORT: u16 = 8546;
pub const METRICS_PORT: u16 = 9001;

/// Ingress of an ingestion node. Peer ports must be reachable from the
/// internet for the clients to sync; query and metrics ports stay private.
pub fn node_ingress(private_range: Ipv4Cidr) -> Vec<IngressRule> {
    vec![
        IngressRule::from_any_ipv4(Port::tcp(CONSENSUS_P2P_PORT), "P2P traffic, consensus client"),
        IngressRule::from_any_ipv4(Port::udp(CONSENSUS_P2P_PORT), "P2P traffic, consensus client"),
        IngressRule::from_any_ipv4(Port::udp(CONSENSUS_QUIC_PORT), "P2P traffic, consensus client"),
        IngressRule::from_any_ipv4(Port::tcp(EXECUTION_P2P_PORT), "P2P traffic, execution client"),
        IngressRule::from_any_ipv4(Port::udp(EXECUTION_P2P_PORT), "P2P traffic, execution client"),
        IngressRule::from_cidr(private_range, Port::tcp(RPC_PORT), "RPC queries, execution client"),
        IngressRule::from_cidr(private_range, Port::tcp(WS_RPC_PORT), "WS queries, execution client"),
        IngressRule::from_cidr(private_range, Port::tcp(METRICS_PORT), "metrics, execution client"),
    ]
}
