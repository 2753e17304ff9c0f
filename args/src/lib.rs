// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Command line of the node orchestrator

pub use clap::Parser;
use lsi::NfType;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Kind of the simulated physical ports given without one
pub const DEFAULT_PORT_KIND: &str = "ethernet";

/// A simulated physical port, as `NAME[=KIND]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPortArg {
    pub name: String,
    pub kind: String,
}

impl FromStr for SimPortArg {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (name, kind) = match input.split_once('=') {
            Some((name, kind)) if !kind.is_empty() => (name, kind),
            Some((name, _)) => (name, DEFAULT_PORT_KIND),
            None => (input, DEFAULT_PORT_KIND),
        };
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(format!("Bad port name '{name}'"));
        }
        Ok(SimPortArg {
            name: name.to_owned(),
            kind: kind.to_owned(),
        })
    }
}

/// A network function known to the simulated repository, as `NAME[=TYPE]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimNfArg {
    pub name: String,
    pub nf_type: NfType,
}

impl FromStr for SimNfArg {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (name, nf_type) = match input.split_once('=') {
            Some((name, nf_type)) => {
                let nf_type = NfType::from_str(nf_type)
                    .map_err(|_| format!("Unknown network function type '{nf_type}'"))?;
                (name, nf_type)
            }
            None => (input, NfType::default()),
        };
        if name.is_empty() {
            return Err("Missing network function name".to_owned());
        }
        Ok(SimNfArg {
            name: name.to_owned(),
            nf_type,
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "Node orchestrator")]
#[command(version = "0.1")]
#[command(about = "Deploys network function graphs on the logical switches of a node", long_about = None)]
pub struct CmdArgs {
    #[arg(
        long,
        value_name = "PATH",
        help = "Graph document (JSON) to deploy at start. May be given several times"
    )]
    file: Vec<PathBuf>,

    #[arg(
        long,
        value_name = "IFACE",
        help = "Wireless interface to bridge with the wireless port of switch-0"
    )]
    wireless: Option<String>,

    #[arg(
        long,
        value_name = "ADDRESS",
        default_value = "127.0.0.1",
        help = "Address the flow controllers listen on"
    )]
    controller_address: String,

    #[arg(
        long,
        value_name = "PORT",
        default_value_t = 6653,
        help = "Port of the controller of switch-0. Tenant switches get the following ones"
    )]
    first_controller_port: u16,

    #[arg(
        long,
        value_name = "N",
        default_value_t = 8,
        value_parser = clap::value_parser!(u16).range(1..=256),
        help = "Number of network functions started concurrently, in [1..256]"
    )]
    nf_parallelism: u16,

    #[arg(
        long,
        value_name = "NAME[=KIND]",
        value_parser = SimPortArg::from_str,
        value_delimiter = ',',
        help = "Physical port of the simulated node, of kind ethernet unless given.
E.g. --sim-port eth0 --sim-port eth1=fiber, or --sim-port eth0,eth1=fiber"
    )]
    sim_port: Vec<SimPortArg>,

    #[arg(
        long,
        value_name = "NAME[=TYPE]",
        value_parser = SimNfArg::from_str,
        value_delimiter = ',',
        help = "Network function known to the simulated repository, with type one of
dpdk, docker, kvm, native (dpdk unless given). E.g. --sim-nf firewall=docker,nat"
    )]
    sim_nf: Vec<SimNfArg>,

    #[arg(
        long,
        default_value_t = false,
        help = "Show the available tracing tags and exit"
    )]
    show_tracing_tags: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Show configurable tracing targets and exit"
    )]
    show_tracing_targets: bool,

    #[arg(
        long,
        value_name = "tracing configuration",
        help = "Tracing config string as comma-separated sequence of tag=level, with level one in [off,error,warn,info,debug,trace].
Passing default=level sets the default log-level.
Passing all=level allows setting the log-level of all targets to level.
E.g. default=error,all=info,graph-manager=debug"
    )]
    tracing: Option<String>,
}

impl CmdArgs {
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.file.iter()
    }
    #[must_use]
    pub fn wireless(&self) -> Option<&str> {
        self.wireless.as_deref()
    }
    #[must_use]
    pub fn controller_address(&self) -> &str {
        &self.controller_address
    }
    #[must_use]
    pub fn first_controller_port(&self) -> u16 {
        self.first_controller_port
    }
    #[must_use]
    pub fn nf_parallelism(&self) -> usize {
        self.nf_parallelism.into()
    }

    /// Ports of the simulated node: `eth0` and `eth1` unless given
    #[must_use]
    pub fn sim_ports(&self) -> Vec<(String, String)> {
        let ports: Vec<(String, String)> = if self.sim_port.is_empty() {
            ["eth0", "eth1"]
                .iter()
                .map(|name| ((*name).to_owned(), DEFAULT_PORT_KIND.to_owned()))
                .collect()
        } else {
            self.sim_port
                .iter()
                .map(|port| (port.name.clone(), port.kind.clone()))
                .collect()
        };
        debug!("Simulated ports: {ports:?}");
        ports
    }
    pub fn sim_nfs(&self) -> impl Iterator<Item = &SimNfArg> {
        self.sim_nf.iter()
    }

    #[must_use]
    pub fn show_tracing_tags(&self) -> bool {
        self.show_tracing_tags
    }
    #[must_use]
    pub fn show_tracing_targets(&self) -> bool {
        self.show_tracing_targets
    }
    #[must_use]
    pub fn tracing(&self) -> Option<&String> {
        self.tracing.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_sim_port() {
        let port = SimPortArg::from_str("eth1=fiber").expect("Should succeed");
        assert_eq!(port.name, "eth1");
        assert_eq!(port.kind, "fiber");

        let port = SimPortArg::from_str("eth0").expect("Should succeed");
        assert_eq!(port.kind, DEFAULT_PORT_KIND);
        // eth0= we treat as no kind
        let port = SimPortArg::from_str("eth0=").expect("Should succeed");
        assert_eq!(port.kind, DEFAULT_PORT_KIND);

        assert!(SimPortArg::from_str("=fiber").is_err());
        assert!(SimPortArg::from_str("eth 0").is_err());
    }

    #[test]
    fn test_parse_sim_nf() {
        let nf = SimNfArg::from_str("firewall=docker").expect("Should succeed");
        assert_eq!(nf.name, "firewall");
        assert_eq!(nf.nf_type, NfType::Docker);

        let nf = SimNfArg::from_str("nat").expect("Should succeed");
        assert_eq!(nf.nf_type, NfType::Dpdk);

        assert!(SimNfArg::from_str("nat=container").is_err());
        assert!(SimNfArg::from_str("=kvm").is_err());
    }

    #[test]
    fn test_command_line() {
        let args = CmdArgs::try_parse_from([
            "node-orchestrator",
            "--file",
            "g1.json",
            "--file",
            "g2.json",
            "--wireless",
            "wlan0",
            "--sim-port",
            "eth0,eth1=fiber",
            "--sim-nf",
            "fw=docker",
            "--sim-nf",
            "nat",
            "--nf-parallelism",
            "2",
            "--tracing",
            "graph=debug",
        ])
        .expect("Should succeed");
        assert_eq!(args.files().count(), 2);
        assert_eq!(args.wireless(), Some("wlan0"));
        assert_eq!(args.controller_address(), "127.0.0.1");
        assert_eq!(args.first_controller_port(), 6653);
        assert_eq!(args.nf_parallelism(), 2);
        assert_eq!(
            args.sim_ports(),
            vec![
                ("eth0".to_owned(), "ethernet".to_owned()),
                ("eth1".to_owned(), "fiber".to_owned()),
            ]
        );
        let nfs: Vec<_> = args.sim_nfs().map(|nf| nf.name.as_str()).collect();
        assert_eq!(nfs, vec!["fw", "nat"]);
        assert_eq!(args.tracing().map(String::as_str), Some("graph=debug"));

        let defaults = CmdArgs::try_parse_from(["node-orchestrator"]).expect("Should succeed");
        assert_eq!(defaults.sim_ports().len(), 2);
        assert!(defaults.wireless().is_none());

        assert!(CmdArgs::try_parse_from(["node-orchestrator", "--nf-parallelism", "0"]).is_err());
    }
}
