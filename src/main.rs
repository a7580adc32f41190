use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use toml::Table;

use chiplink::topo::{
    build_topology, Config, Endpoints, TimingConfig, TopologyConfig, TopologyKind,
};

#[derive(Parser)]
#[command(version, about)]
struct ChiplinkArgs {
    #[arg(help = "Path to config.toml")]
    config_path: PathBuf,
    #[arg(long, value_parser = TopologyKind::from_str,
          help = "Override topology kind (flat_mesh, chiplet_mesh, kite)")]
    topology: Option<TopologyKind>,
    #[arg(long, help = "Override number of compute cores")]
    num_cpus: Option<usize>,
    #[arg(long, help = "Override number of chiplets")]
    num_chiplets: Option<usize>,
    #[arg(long, help = "Override number of memory controllers")]
    num_mem_ctrls: Option<usize>,
    #[arg(long, help = "Write the built topology as JSON to this path")]
    dump: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let argv = ChiplinkArgs::parse();
    let config = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;
    let config_table: Table = toml::from_str(&config).context("cannot parse config toml")?;
    let mut topo_config = TopologyConfig::from_section(config_table.get("topology"));
    let timing_config = TimingConfig::from_section(config_table.get("timing"));

    // override toml configs with argv
    topo_config.kind = argv.topology.unwrap_or(topo_config.kind);
    topo_config.num_cpus = argv.num_cpus.unwrap_or(topo_config.num_cpus);
    topo_config.num_chiplets = argv.num_chiplets.unwrap_or(topo_config.num_chiplets);
    topo_config.num_mem_ctrls = argv.num_mem_ctrls.unwrap_or(topo_config.num_mem_ctrls);

    let endpoints = Endpoints::generate(topo_config.num_cpus, topo_config.num_mem_ctrls, 0);
    let graph = build_topology(&topo_config, &timing_config, &endpoints)?;
    graph.log_summary();

    if let Some(path) = &argv.dump {
        let json = serde_json::to_string_pretty(&graph).context("cannot serialize topology")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write dump to {}", path.display()))?;
    }
    Ok(())
}
