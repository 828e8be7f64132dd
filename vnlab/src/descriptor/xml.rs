//! libvirt XML rendering of descriptors

use std::fmt;

use crate::descriptor::host::HostDescriptor;
use crate::descriptor::network::NetworkDescriptor;

/// Escape text for use in XML content and double-quoted attributes
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a `<network>` definition
pub fn render_network(network: &NetworkDescriptor) -> String {
    NetworkXml(network).to_string()
}

/// Render a `<domain>` definition
pub fn render_domain(host: &HostDescriptor) -> String {
    DomainXml(host).to_string()
}

struct NetworkXml<'a>(&'a NetworkDescriptor);

impl fmt::Display for NetworkXml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let network = self.0;
        writeln!(f, "<network>")?;
        writeln!(f, "  <name>{}</name>", escape(&network.name))?;
        writeln!(f, "  <forward mode=\"{}\"/>", escape(&network.forward_mode))?;
        writeln!(
            f,
            "  <bridge name=\"{}\" stp=\"{}\" delay=\"{}\"/>",
            escape(&network.bridge.name),
            if network.bridge.stp { "on" } else { "off" },
            network.bridge.delay
        )?;
        writeln!(
            f,
            "  <ip address=\"{}\" netmask=\"{}\">",
            escape(&network.address),
            escape(&network.netmask)
        )?;
        writeln!(f, "    <dhcp>")?;
        writeln!(
            f,
            "      <range start=\"{}\" end=\"{}\"/>",
            escape(&network.dhcp.start),
            escape(&network.dhcp.end)
        )?;
        writeln!(f, "    </dhcp>")?;
        writeln!(f, "  </ip>")?;
        writeln!(f, "</network>")
    }
}

struct DomainXml<'a>(&'a HostDescriptor);

impl DomainXml<'_> {
    fn write_disks(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for disk in &self.0.disks {
            writeln!(f, "    <disk type=\"file\" device=\"disk\">")?;
            writeln!(f, "      <driver name=\"qemu\" type=\"{}\"/>", disk.format.as_str())?;
            writeln!(
                f,
                "      <source file=\"{}\"/>",
                escape(&disk.source.to_string_lossy())
            )?;
            writeln!(
                f,
                "      <target dev=\"{}\" bus=\"{}\"/>",
                escape(&disk.target_dev),
                escape(&disk.bus)
            )?;
            writeln!(f, "    </disk>")?;
        }
        Ok(())
    }

    fn write_interfaces(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for iface in &self.0.interfaces {
            writeln!(f, "    <interface type=\"network\">")?;
            writeln!(f, "      <source network=\"{}\"/>", escape(&iface.network))?;
            writeln!(f, "      <model type=\"{}\"/>", escape(&iface.model))?;
            writeln!(f, "    </interface>")?;
        }
        Ok(())
    }

    fn write_console(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let console = &self.0.console;
        for (kind, target) in [
            ("serial", &console.serial_target),
            ("console", &console.console_target),
        ] {
            writeln!(f, "    <{kind} type=\"pty\">")?;
            writeln!(
                f,
                "      <target type=\"{}\" port=\"{}\"/>",
                escape(target),
                console.port
            )?;
            writeln!(f, "    </{kind}>")?;
        }
        Ok(())
    }
}

impl fmt::Display for DomainXml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = self.0;
        writeln!(f, "<domain type=\"{}\">", escape(&host.domain_type))?;
        writeln!(f, "  <name>{}</name>", escape(&host.name))?;
        writeln!(f, "  <memory unit=\"MB\">{}</memory>", host.memory_mb)?;
        writeln!(f, "  <vcpu placement=\"static\">{}</vcpu>", host.vcpus)?;
        writeln!(f, "  <os>")?;
        writeln!(
            f,
            "    <type arch=\"{}\">{}</type>",
            escape(&host.arch),
            escape(&host.os_type)
        )?;
        writeln!(f, "    <boot dev=\"{}\"/>", escape(&host.boot_dev))?;
        writeln!(f, "  </os>")?;
        writeln!(f, "  <on_poweroff>{}</on_poweroff>", escape(&host.on_poweroff))?;
        writeln!(f, "  <on_reboot>{}</on_reboot>", escape(&host.on_reboot))?;
        writeln!(f, "  <on_crash>{}</on_crash>", escape(&host.on_crash))?;
        writeln!(f, "  <devices>")?;
        writeln!(f, "    <emulator>{}</emulator>", escape(&host.emulator))?;
        self.write_disks(f)?;
        self.write_interfaces(f)?;
        self.write_console(f)?;
        writeln!(f, "  </devices>")?;
        writeln!(f, "</domain>")
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::descriptor::{host_descriptor, network_descriptor};
    use crate::models::template::{HostDef, NetworkDef};
    use crate::provision::DiskSet;

    #[test]
    fn test_render_network() {
        let def = NetworkDef {
            name: "net1".into(),
            netaddr: "10.0.0.1".into(),
            dhcplower: "10.0.0.10".into(),
            dhcpupper: "10.0.0.100".into(),
            netmask: "255.255.255.0".into(),
            forward: "nat".into(),
        };
        let xml = render_network(&network_descriptor(&def));

        assert!(xml.starts_with("<network>\n  <name>net1</name>\n"));
        assert!(xml.contains("<forward mode=\"nat\"/>"));
        assert!(xml.contains("<bridge name=\"net1\" stp=\"on\" delay=\"0\"/>"));
        assert!(xml.contains("<ip address=\"10.0.0.1\" netmask=\"255.255.255.0\">"));
        assert!(xml.contains("<range start=\"10.0.0.10\" end=\"10.0.0.100\"/>"));
        assert!(xml.ends_with("</network>\n"));
    }

    #[test]
    fn test_render_domain() {
        let def = HostDef {
            name: "vm1".into(),
            image: "ubuntu".into(),
            ram: 2048,
            cpus: 2,
            username: "u".into(),
            password: "p".into(),
            networks: vec!["net1".into()],
            hd: "10G".into(),
        };
        let disks = DiskSet::for_host(Path::new("/srv/machines"), "vm1");
        let xml = render_domain(&host_descriptor(&def, &disks, "/usr/bin/qemu-system-x86_64"));

        assert!(xml.starts_with("<domain type=\"kvm\">"));
        assert!(xml.contains("<memory unit=\"MB\">2048</memory>"));
        assert!(xml.contains("<vcpu placement=\"static\">2</vcpu>"));
        assert!(xml.contains("<source file=\"/srv/machines/vm1/vm1.qcow2\"/>"));
        assert!(xml.contains("<driver name=\"qemu\" type=\"raw\"/>"));
        assert!(xml.contains("<source network=\"net1\"/>"));
        assert!(xml.contains("<target type=\"isa-serial\" port=\"0\"/>"));
        assert!(xml.contains("<console type=\"pty\">"));
        assert!(xml.ends_with("  </devices>\n</domain>\n"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
