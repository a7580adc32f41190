use anyhow::{ensure, Result};
use log::debug;

use crate::topo::TopologyConfig;

/// Sink for the per-core address partitions computed after a successful
/// build. The production registry lives in the consuming simulator; tests
/// use [`InMemoryRegistry`].
pub trait NodeRegistry {
    fn register_node(&mut self, core: usize, partition_bytes: u64);
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    pub partitions: Vec<(usize, u64)>,
}

impl NodeRegistry for InMemoryRegistry {
    fn register_node(&mut self, core: usize, partition_bytes: u64) {
        self.partitions.push((core, partition_bytes));
    }
}

/// Splits the total memory size evenly over the compute nodes and registers
/// one partition per core, in core order.
pub fn register_partitions<R: NodeRegistry>(cfg: &TopologyConfig, registry: &mut R) -> Result<()> {
    ensure!(cfg.num_cpus > 0, "num_cpus must be positive");
    ensure!(
        cfg.mem_size_bytes % cfg.num_cpus as u64 == 0,
        "mem_size_bytes ({}) must divide evenly over {} cores",
        cfg.mem_size_bytes,
        cfg.num_cpus
    );
    let partition = cfg.mem_size_bytes / cfg.num_cpus as u64;
    for core in 0..cfg.num_cpus {
        registry.register_node(core, partition);
    }
    debug!("registered {} partitions of {} bytes", cfg.num_cpus, partition);
    Ok(())
}
