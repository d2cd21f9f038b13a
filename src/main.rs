use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use std::rc::Rc;

use signal_router::control::signals::{IntersectionControllerContainer, MaxQueue, MinMax};
use signal_router::control::{ControllerConfig, JunctionPathTable, Metric, Network, NetworkDescription};

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Time,
    Distance,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Time => Metric::TravelTime,
            MetricArg::Distance => Metric::Distance,
        }
    }
}

#[derive(Parser)]
#[command(name = "signal_router")]
#[command(about = "Builds shortest-path tables and signal controllers for a road network")]
struct Cli {
    /// Network description (JSON)
    #[arg(long)]
    network: PathBuf,

    /// Edge weight of the shortest-path table
    #[arg(long, value_enum, default_value = "time")]
    metric: MetricArg,

    /// Where to write the shortest-path table (JSON)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the controllers and table statistics
    #[arg(long)]
    summary: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let description = NetworkDescription::load(&cli.network)?;
    let network = Network::from_description(&description)
        .with_context(|| format!("Invalid network {}", cli.network.display()))?;
    info!(
        "Loaded {} junctions, {} edges and {} signalised junctions",
        network.junction_count(),
        network.edge_count(),
        network.signals().len()
    );

    let table = JunctionPathTable::build(&network, cli.metric.into());
    if let Some(output) = &cli.output {
        table.save(output)?;
        info!("Wrote shortest-path table to {}", output.display());
    }

    if cli.summary {
        print_summary(&network, &table)?;
    }
    Ok(())
}

fn print_summary(network: &Network, table: &JunctionPathTable) -> Result<()> {
    let nodes = table.node_count();
    let reachable = network
        .junctions()
        .iter()
        .flat_map(|a| network.junctions().iter().map(move |b| (a.id, b.id)))
        .filter(|(a, b)| a != b && table.is_reachable(*a, *b))
        .count();

    println!("=== Shortest-path table ===");
    println!("Metric: {:?}", table.metric());
    println!("Junctions: {}", nodes);
    println!("Reachable pairs: {} of {}", reachable, nodes * nodes.saturating_sub(1));
    println!("Max path cost: {:.2}", table.max_path_cost());
    println!("Max element cost: {:.2}", table.max_element_cost());

    let config = ControllerConfig::default();
    let controllers = IntersectionControllerContainer::from_network(
        network,
        &config,
        Rc::new(MinMax::new(10.0, 60.0)),
        Rc::new(MaxQueue),
    )?;

    println!();
    println!("=== Signal controllers ===");
    for controller in controllers.iter() {
        println!(
            "{}: {} links, {} phases",
            controller.name(),
            controller.link_count(),
            controller.phase_count()
        );
        for (index, phase) in controller.phases().iter().enumerate() {
            println!("  {}: {}", index, phase);
        }
    }
    Ok(())
}
