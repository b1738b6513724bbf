// Replicast: Simulating Service-Anycast Routing
// Copyright (C) 2022  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Command-line driver for the service-anycast simulator: load or build a
//! topology, attach replicas and clients, run, and dump the tables.

use clap::Parser;
use replicast::printer;
use replicast::traffic::{RequestSource, SizeDistribution};
use replicast::types::NetworkDevice;
use replicast::{Config, Network, NetworkError, ServiceId};
use std::fs::File;

#[derive(Parser, Debug)]
#[command(name = "replicast", about = "Discrete-event simulator for service-anycast routing")]
struct Args {
    /// GML topology file for the router backbone. Without it, a small
    /// built-in demo topology is used.
    #[arg(long)]
    topology: Option<String>,
    /// Attach a server replica: ROUTER:SERVICE (e.g. "a:§video"). May be
    /// given multiple times.
    #[arg(long = "server", value_name = "ROUTER:SERVICE")]
    servers: Vec<String>,
    /// Attach a request-generating client: ROUTER:SERVICE. May be given
    /// multiple times.
    #[arg(long = "client", value_name = "ROUTER:SERVICE")]
    clients: Vec<String>,
    /// Weight between load and delay in the utility function (0..=1)
    #[arg(long, default_value_t = 0.0)]
    alpha: f64,
    /// Per-server slot capacity
    #[arg(long, default_value_t = 10)]
    slots: u32,
    /// Simulated time to run until
    #[arg(long, default_value_t = 100.0)]
    until: f64,
    /// Arrival rate of each client's Poisson request source
    #[arg(long, default_value_t = 1.0)]
    lambda: f64,
    /// Fixed request size in service time units
    #[arg(long, default_value_t = 10)]
    size: u64,
    /// RNG seed for the traffic sources
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Write the topology as a graphviz file
    #[arg(long, value_name = "FILE")]
    graphviz: Option<String>,
}

fn main() {
    pretty_env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        alpha: args.alpha,
        server_slots: args.slots,
        ..Config::default()
    };

    let mut net = match &args.topology {
        Some(file) => Network::from_gml_file(file, config)?,
        None => demo_topology(config)?,
    };

    let server_specs = if args.servers.is_empty() && args.topology.is_none() {
        vec!["a:\u{a7}a".to_string()]
    } else {
        args.servers.clone()
    };
    let client_specs = if args.clients.is_empty() && args.topology.is_none() {
        vec!["e:\u{a7}a".to_string()]
    } else {
        args.clients.clone()
    };

    let mut servers = Vec::new();
    for (i, spec) in server_specs.iter().enumerate() {
        let (router, service) = parse_spec(spec)?;
        let router_id = net.get_node_id(&router)?;
        let server = net.add_server(format!("s{}", i + 1), service);
        net.add_link(server, router_id, 1.0)?;
        servers.push(server);
    }

    let mut clients = Vec::new();
    for (i, spec) in client_specs.iter().enumerate() {
        let (router, service) = parse_spec(spec)?;
        let router_id = net.get_node_id(&router)?;
        let client = net.add_client(format!("c{}", i + 1));
        net.add_link(client, router_id, 1.0)?;
        clients.push((client, service));
    }

    if let Some(file) = &args.graphviz {
        let mut out = File::create(file)?;
        printer::graphviz(&net, &mut out)?;
        println!("graphviz written to {}", file);
    }

    for server in servers.iter() {
        net.announce_service(*server)?;
    }
    for (i, (client, service)) in clients.iter().enumerate() {
        net.add_request_source(RequestSource::new(
            *client,
            service.clone(),
            args.lambda,
            SizeDistribution::Fixed(args.size),
            args.seed + i as u64,
        )?)?;
    }

    net.run_until(args.until)?;

    println!("=== simulation finished at t={} ===", args.until);
    for node in net.nodes() {
        let router = match net.get_device(node) {
            NetworkDevice::Router(r) => r,
            _ => continue,
        };
        println!("Router '{}'", router.name());
        for line in printer::metric_table(&net, node)? {
            println!("  {}", line);
        }
        println!("  service forwarding: {}", printer::service_forwarding_table(&net, node)?);
    }
    for server in servers.iter() {
        let s = net.get_device(*server).unwrap_server();
        println!(
            "Server '{}': load {} flows {} free slots {}",
            s.name(),
            s.calculate_load(),
            s.calculate_flows(),
            s.calculate_slots()
        );
    }
    Ok(())
}

/// The built-in demo: a ring of five routers with one chord.
fn demo_topology(config: Config) -> Result<Network, NetworkError> {
    let adj = vec![
        ("a", vec![("b", 1.0), ("c", 4.0)]),
        ("b", vec![("c", 3.0), ("d", 2.0), ("e", 2.0)]),
        ("c", vec![("d", 1.0)]),
        ("d", vec![("e", 5.0)]),
        ("e", vec![]),
    ];
    Network::from_adjacency(&adj, config)
}

fn parse_spec(spec: &str) -> Result<(String, ServiceId), String> {
    let mut parts = spec.splitn(2, ':');
    match (parts.next(), parts.next()) {
        (Some(router), Some(service)) if !router.is_empty() && !service.is_empty() => {
            Ok((router.to_string(), ServiceId::new(service)))
        }
        _ => Err(format!("invalid ROUTER:SERVICE spec: '{}'", spec)),
    }
}
