//! Host (domain) descriptors

use std::path::PathBuf;

use crate::models::records::NewHost;
use crate::models::template::HostDef;
use crate::provision::DiskSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskFormat {
    Qcow2,
    Raw,
}

impl DiskFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskFormat::Qcow2 => "qcow2",
            DiskFormat::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSpec {
    pub source: PathBuf,
    pub format: DiskFormat,
    pub target_dev: String,
    pub bus: String,
}

/// A guest NIC attached to a backend network by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub network: String,
    pub model: String,
}

/// Serial port and console settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSpec {
    pub serial_target: String,
    pub console_target: String,
    pub port: u32,
}

/// Everything the backend needs to define a virtual host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDescriptor {
    pub name: String,
    pub domain_type: String,
    pub memory_mb: u32,
    pub vcpus: u32,
    pub arch: String,
    pub os_type: String,
    pub boot_dev: String,
    pub on_poweroff: String,
    pub on_reboot: String,
    pub on_crash: String,
    pub emulator: String,
    pub disks: Vec<DiskSpec>,
    pub interfaces: Vec<InterfaceSpec>,
    pub console: ConsoleSpec,
}

impl HostDescriptor {
    /// Names of the networks this host attaches to, in declared order
    pub fn network_names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(|i| i.network.as_str())
    }
}

/// Translate a host definition and its materialized disks into a descriptor
pub fn host_descriptor(def: &HostDef, disks: &DiskSet, emulator: &str) -> HostDescriptor {
    let virtio_disk = |source: &PathBuf, format, dev: &str| DiskSpec {
        source: source.clone(),
        format,
        target_dev: dev.to_string(),
        bus: "virtio".to_string(),
    };

    HostDescriptor {
        name: def.name.clone(),
        domain_type: "kvm".to_string(),
        memory_mb: def.ram,
        vcpus: def.cpus,
        arch: "x86_64".to_string(),
        os_type: "hvm".to_string(),
        boot_dev: "hd".to_string(),
        on_poweroff: "destroy".to_string(),
        on_reboot: "restart".to_string(),
        on_crash: "restart".to_string(),
        emulator: emulator.to_string(),
        disks: vec![
            virtio_disk(&disks.main_disk, DiskFormat::Qcow2, "vda"),
            virtio_disk(&disks.seed_disk, DiskFormat::Raw, "vdb"),
        ],
        interfaces: def
            .networks
            .iter()
            .map(|network| InterfaceSpec {
                network: network.clone(),
                model: "virtio".to_string(),
            })
            .collect(),
        console: ConsoleSpec {
            serial_target: "isa-serial".to_string(),
            console_target: "serial".to_string(),
            port: 0,
        },
    }
}

pub fn host_record(def: &HostDef) -> NewHost {
    NewHost {
        name: def.name.clone(),
        image: def.image.clone(),
        ram: def.ram,
        cpus: def.cpus,
        username: def.username.clone(),
        password: def.password.clone(),
        hd_space: def.hd.clone(),
    }
}
