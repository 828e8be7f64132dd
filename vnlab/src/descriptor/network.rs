//! Network descriptors

use crate::models::records::NewNetwork;
use crate::models::template::NetworkDef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSpec {
    pub name: String,
    pub stp: bool,
    pub delay: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpRange {
    pub start: String,
    pub end: String,
}

/// Everything the backend needs to define a virtual network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub name: String,
    pub forward_mode: String,
    pub bridge: BridgeSpec,
    pub address: String,
    pub netmask: String,
    pub dhcp: DhcpRange,
}

pub fn network_descriptor(def: &NetworkDef) -> NetworkDescriptor {
    NetworkDescriptor {
        name: def.name.clone(),
        forward_mode: def.forward.clone(),
        bridge: BridgeSpec {
            name: def.name.clone(),
            stp: true,
            delay: 0,
        },
        address: def.netaddr.clone(),
        netmask: def.netmask.clone(),
        dhcp: DhcpRange {
            start: def.dhcplower.clone(),
            end: def.dhcpupper.clone(),
        },
    }
}

pub fn network_record(def: &NetworkDef) -> NewNetwork {
    NewNetwork {
        name: def.name.clone(),
        ip: def.netaddr.clone(),
        dhcp_lower: def.dhcplower.clone(),
        dhcp_upper: def.dhcpupper.clone(),
        netmask: def.netmask.clone(),
        net_type: def.forward.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net1() -> NetworkDef {
        NetworkDef {
            name: "net1".into(),
            netaddr: "10.0.0.0".into(),
            dhcplower: "10.0.0.10".into(),
            dhcpupper: "10.0.0.100".into(),
            netmask: "255.255.255.0".into(),
            forward: "nat".into(),
        }
    }

    #[test]
    fn test_bridge_is_named_after_network() {
        let descriptor = network_descriptor(&net1());
        assert_eq!(descriptor.bridge.name, "net1");
        assert!(descriptor.bridge.stp);
        assert_eq!(descriptor.forward_mode, "nat");
        assert_eq!(descriptor.dhcp.start, "10.0.0.10");
    }

    #[test]
    fn test_translation_is_deterministic() {
        assert_eq!(network_descriptor(&net1()), network_descriptor(&net1()));
        let record = network_record(&net1());
        assert_eq!(record.ip, "10.0.0.0");
        assert_eq!(record.net_type, "nat");
    }
}
