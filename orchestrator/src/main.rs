// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]

mod documents;

use args::{CmdArgs, Parser};
use fabric::sim::{SimControllers, SimFabric, SimNfRuntimes, SimWireless};
use graph_manager::{Collaborators, GraphManager, GraphManagerParamsBuilder};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use tracectl::{get_trace_ctl, trace_target};
use tracing::{error, info, level_filters::LevelFilter, warn};

trace_target!("node-orchestrator", LevelFilter::INFO, &["graph"]);

fn init_logging() {
    let tctl = get_trace_ctl();
    tctl.set_default_level(LevelFilter::INFO);
}

/// Collaborators simulating the node described on the command line
fn sim_collaborators(args: &CmdArgs) -> Collaborators {
    let ports = args.sim_ports();
    let ports: Vec<(&str, &str)> = ports
        .iter()
        .map(|(name, kind)| (name.as_str(), kind.as_str()))
        .collect();
    let runtimes = SimNfRuntimes::new(&[]);
    for nf in args.sim_nfs() {
        runtimes.add_nf(&nf.name, nf.nf_type);
    }
    Collaborators {
        fabric: Arc::new(SimFabric::new(&ports)),
        controllers: Arc::new(SimControllers::new()),
        runtimes: Arc::new(runtimes),
        wireless: Arc::new(SimWireless::new()),
    }
}

async fn deploy_documents(manager: &GraphManager, args: &CmdArgs) {
    for path in args.files() {
        let graph = match documents::load(path) {
            Ok(graph) => graph,
            Err(e) => {
                error!("{e}");
                continue;
            }
        };
        let id = graph.id().clone();
        match manager.create_graph(graph).await {
            Ok(()) => match manager.graph_json(&id).await {
                Ok(snapshot) => info!("Deployed graph {id}: {snapshot}"),
                Err(e) => warn!("Deployed graph {id} but cannot show it: {e}"),
            },
            Err(e) if e.is_fatal() => error!("Failed to deploy graph {id}: {e}"),
            Err(e) => warn!("Graph {id} was not deployed: {e}"),
        }
    }
}

async fn run(args: CmdArgs, stop_rx: Receiver<()>) {
    /* graph manager parameters */
    let Ok(params) = GraphManagerParamsBuilder::default()
        .controller_address(args.controller_address())
        .first_controller_port(args.first_controller_port())
        .wireless(args.wireless().map(str::to_owned))
        .max_parallel_nf_starts(args.nf_parallelism())
        .build()
    else {
        error!("Bad graph manager configuration");
        panic!("Bad graph manager configuration");
    };
    info!("{params}");

    let manager = match GraphManager::new(params, sim_collaborators(&args)).await {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to start graph manager: {e}");
            panic!("Graph manager failed to start. Aborting...");
        }
    };
    info!("Node interfaces: {}", manager.physical_interfaces_json());

    deploy_documents(&manager, &args).await;

    match tokio::task::spawn_blocking(move || stop_rx.recv()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Stop signal channel closed: {e}"),
        Err(e) => error!("Failed to wait for stop signal: {e}"),
    }
    info!("Shutting down node orchestrator");
    manager.shutdown().await;
}

fn main() {
    /* parse cmd line args */
    let args = CmdArgs::parse();

    /* initialize logging */
    init_logging();
    if let Some(tracing) = args.tracing()
        && let Err(e) = get_trace_ctl().setup_from_string(tracing)
    {
        error!("Invalid tracing configuration: {e}");
        panic!("Invalid tracing configuration: {e}");
    }
    if args.show_tracing_tags() {
        get_trace_ctl().dump_targets_by_tag();
        std::process::exit(0);
    }
    if args.show_tracing_targets() {
        get_trace_ctl().dump();
        std::process::exit(0);
    }
    info!("Starting node orchestrator...");

    let (stop_tx, stop_rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || stop_tx.send(()).expect("Error sending SIGINT signal"))
        .expect("failed to set SIGINT handler");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("orchestrator")
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");
    runtime.block_on(run(args, stop_rx));
    info!("Node orchestrator stopped");
}
