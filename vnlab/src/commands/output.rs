//! Terminal output helpers

use colored::Colorize;
use comfy_table::{Cell, Color, Table};
use vnlab::models::state::HostState;
use vnlab::orchestrator::inspect::{DeploymentView, HostInterfacesView, HostView, NetworkView};

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", "!".yellow(), message);
}

fn state_cell(state: &HostState) -> Cell {
    let color = match state {
        HostState::Running => Color::Green,
        HostState::Off => Color::DarkGrey,
        HostState::Unknown(_) => Color::Yellow,
    };
    Cell::new(state.to_string()).fg(color)
}

pub fn hosts_table(hosts: &[HostView]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "NAME", "IMAGE", "STATE", "RAM", "CPUS", "USERNAME", "PASSWORD", "HD", "DEPLOYMENT",
    ]);
    for host in hosts {
        table.add_row(vec![
            Cell::new(&host.record.name),
            Cell::new(&host.record.image),
            state_cell(&host.state),
            Cell::new(host.record.ram),
            Cell::new(host.record.cpus),
            Cell::new(&host.record.username),
            Cell::new(&host.record.password),
            Cell::new(&host.record.hd_space),
            Cell::new(&host.deployment),
        ]);
    }
    table
}

pub fn networks_table(networks: &[NetworkView]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "NAME", "TYPE", "IP", "NETMASK", "DHCP LOWER", "DHCP UPPER", "DEPLOYMENT",
    ]);
    for network in networks {
        table.add_row(vec![
            Cell::new(&network.record.name),
            Cell::new(&network.record.net_type),
            Cell::new(&network.record.ip),
            Cell::new(&network.record.netmask),
            Cell::new(&network.record.dhcp_lower),
            Cell::new(&network.record.dhcp_upper),
            Cell::new(&network.deployment),
        ]);
    }
    table
}

/// One row per interface
pub fn ips_table(hosts: &[HostInterfacesView]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["NAME", "INTERFACE", "MAC", "IPS", "DEPLOYMENT"]);
    for host in hosts {
        for (name, iface) in &host.interfaces {
            table.add_row(vec![
                Cell::new(&host.host),
                Cell::new(name),
                Cell::new(&iface.mac),
                Cell::new(iface.addresses.join(", ")),
                Cell::new(&host.deployment),
            ]);
        }
    }
    table
}

pub fn deployments_table(deployments: &[DeploymentView]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["NAME", "HOSTS", "NETWORKS", "CREATED"]);
    for deployment in deployments {
        table.add_row(vec![
            Cell::new(&deployment.record.name),
            Cell::new(deployment.hosts.join(", ")),
            Cell::new(deployment.networks.join(", ")),
            Cell::new(deployment.record.created_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    table
}
