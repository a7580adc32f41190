use anyhow::{ensure, Result};
use log::debug;

use crate::topo::config::TopologyDims;
use crate::topo::link::{ExternalLink, LinkParams};
use crate::topo::router::Router;
use crate::topo::types::{LinkIdAlloc, Node, RouterId};

/// Attaches the compute nodes and their co-located directory nodes of one
/// chiplet: first a compute ExternalLink per core router, then a directory
/// ExternalLink per core router, in row-major order. The compute pass
/// late-binds the top-tier VC depth onto each router.
pub fn attach_chiplet_nodes(
    dims: &TopologyDims,
    chiplet_x: usize,
    chiplet_y: usize,
    cores: &[Node],
    core_dirs: &[Node],
    top_vc: usize,
    params: &LinkParams,
    routers: &mut [Router],
    ids: &mut LinkIdAlloc,
) -> Result<Vec<ExternalLink>> {
    ensure!(
        cores.len() == dims.num_noc_routers && core_dirs.len() == dims.num_noc_routers,
        "need {} compute and {} directory nodes, got {} and {}",
        dims.num_noc_routers,
        dims.num_noc_routers,
        cores.len(),
        core_dirs.len()
    );

    let router_base =
        chiplet_x * dims.cores_x + chiplet_y * dims.chiplets_x * dims.cpus_per_chiplet;
    let mut links = Vec::with_capacity(2 * dims.cpus_per_chiplet);
    for nodes in [cores, core_dirs] {
        for y in 0..dims.cores_y {
            for x in 0..dims.cores_x {
                let router: RouterId = router_base + x + y * dims.noc_total_cols;
                ensure!(
                    router < routers.len(),
                    "chiplet ({}, {}) attachment indexes router {} outside range {}",
                    chiplet_x,
                    chiplet_y,
                    router,
                    routers.len()
                );
                links.push(params.external(ids.next_id(), nodes[router], router));
                routers[router].vcs_per_vnet = top_vc;
            }
        }
    }
    Ok(links)
}

/// Distributes memory-controller nodes round-robin over the interposer edge
/// routers: `mc_per_router` (controller, directory) pairs on each east-edge
/// router (column 0) row by row, then the same on each west-edge router
/// (last column).
pub fn attach_mem_ctrls(
    dims: &TopologyDims,
    mem_ctrls: &[Node],
    mem_dirs: &[Node],
    params: &LinkParams,
    ids: &mut LinkIdAlloc,
) -> Result<Vec<ExternalLink>> {
    if mem_ctrls.is_empty() && mem_dirs.is_empty() {
        return Ok(Vec::new());
    }
    ensure!(
        dims.noi_rows > 0,
        "{} memory controllers supplied but the topology has no interposer tier",
        mem_ctrls.len()
    );
    ensure!(
        mem_ctrls.len() == mem_dirs.len(),
        "need one directory node per memory controller, got {} and {}",
        mem_ctrls.len(),
        mem_dirs.len()
    );
    ensure!(
        mem_ctrls.len() % (2 * dims.noi_rows) == 0,
        "{} memory controllers do not divide over 2 * {} interposer rows",
        mem_ctrls.len(),
        dims.noi_rows
    );
    let mc_per_router = mem_ctrls.len() / (2 * dims.noi_rows);

    let mut links = Vec::with_capacity(2 * mem_ctrls.len());
    let mut attach_edge = |edge_router: fn(&TopologyDims, usize) -> RouterId, index_base: usize| {
        for row in 0..dims.noi_rows {
            let router = edge_router(dims, row);
            for mc in 0..mc_per_router {
                let mc_index = index_base + row * mc_per_router + mc;
                links.push(params.external(ids.next_id(), mem_ctrls[mc_index], router));
                links.push(params.external(ids.next_id(), mem_dirs[mc_index], router));
            }
        }
    };

    // east edge: first column of each interposer row
    attach_edge(|dims, row| dims.noi_base() + row * dims.noi_cols, 0);
    // west edge: last column of each interposer row
    attach_edge(
        |dims, row| dims.noi_base() + (row + 1) * dims.noi_cols - 1,
        dims.noi_rows * mc_per_router,
    );

    debug!(
        "attached {} memory controllers, {} per edge router",
        mem_ctrls.len(),
        mc_per_router
    );
    Ok(links)
}

/// Any node left over by the regular structure lands on the single overflow
/// router so that every supplied node gets exactly one attachment.
pub fn attach_overflow_dirs(
    dims: &TopologyDims,
    extra_dirs: &[Node],
    params: &LinkParams,
    ids: &mut LinkIdAlloc,
) -> Result<Vec<ExternalLink>> {
    if extra_dirs.is_empty() {
        return Ok(Vec::new());
    }
    let overflow = dims.overflow_router.ok_or_else(|| {
        anyhow::anyhow!(
            "{} leftover nodes but this topology allocates no overflow router",
            extra_dirs.len()
        )
    })?;
    Ok(extra_dirs
        .iter()
        .map(|&node| params.external(ids.next_id(), node, overflow))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topo::config::{TimingConfig, TopologyConfig};
    use crate::topo::router::allocate_routers;
    use crate::topo::types::Endpoints;

    fn setup() -> (TopologyDims, TimingConfig, Vec<Router>, Endpoints) {
        let cfg = TopologyConfig::default();
        let dims = cfg.validate().unwrap();
        let timing = TimingConfig::default();
        let routers = allocate_routers(&dims, &timing);
        let endpoints = Endpoints::generate(cfg.num_cpus, cfg.num_mem_ctrls, 2);
        (dims, timing, routers, endpoints)
    }

    fn params(timing: &TimingConfig) -> LinkParams {
        LinkParams {
            latency: timing.link_latency,
            width: timing.noi_width,
            clk_domain: timing.mem_clk(),
        }
    }

    #[test]
    fn chiplet_attachment_covers_each_router_twice() {
        let (dims, timing, mut routers, eps) = setup();
        let mut ids = LinkIdAlloc::new();
        let mut links = Vec::new();
        for cy in 0..dims.chiplets_y {
            for cx in 0..dims.chiplets_x {
                links.extend(
                    attach_chiplet_nodes(
                        &dims,
                        cx,
                        cy,
                        &eps.cores,
                        &eps.core_dirs,
                        timing.top_vc,
                        &params(&timing),
                        &mut routers,
                        &mut ids,
                    )
                    .unwrap(),
                );
            }
        }
        assert_eq!(2 * dims.num_noc_routers, links.len());
        for router in 0..dims.num_noc_routers {
            let count = links.iter().filter(|l| l.router == router).count();
            assert_eq!(2, count, "router {router}");
        }
        // each compute node lands on the router matching its index
        for link in links.iter().filter(|l| l.node.role == crate::topo::types::NodeRole::Core) {
            assert_eq!(link.node.index, link.router);
        }
    }

    #[test]
    fn mem_ctrls_round_robin_over_both_edges() {
        // 8 controllers over 4 rows: one controller and one directory per
        // east-edge router and per west-edge router.
        let (dims, timing, _, eps) = setup();
        let mut ids = LinkIdAlloc::new();
        let links =
            attach_mem_ctrls(&dims, &eps.mem_ctrls, &eps.mem_dirs, &params(&timing), &mut ids)
                .unwrap();
        assert_eq!(16, links.len());
        let east: Vec<RouterId> = (0..4).map(|r| dims.noi_base() + r * dims.noi_cols).collect();
        let west: Vec<RouterId> =
            (0..4).map(|r| dims.noi_base() + (r + 1) * dims.noi_cols - 1).collect();
        for router in east.iter().chain(west.iter()) {
            let count = links.iter().filter(|l| l.router == *router).count();
            assert_eq!(2, count, "router {router}");
        }
    }

    #[test]
    fn mem_ctrls_without_interposer_fail_before_attachment() {
        let cfg = TopologyConfig {
            kind: crate::topo::config::TopologyKind::FlatMesh,
            num_cpus: 16,
            num_chiplets: 1,
            num_mem_ctrls: 0,
            ..TopologyConfig::default()
        };
        let dims = cfg.validate().unwrap();
        let timing = TimingConfig::default();
        let eps = Endpoints::generate(16, 8, 0);
        let mut ids = LinkIdAlloc::new();
        let result =
            attach_mem_ctrls(&dims, &eps.mem_ctrls, &eps.mem_dirs, &params(&timing), &mut ids);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("interposer"), "{err}");
        assert_eq!(0, ids.allocated());
    }

    #[test]
    fn missing_directory_nodes_fail_before_attachment() {
        let (dims, timing, _, eps) = setup();
        let mut ids = LinkIdAlloc::new();
        let result = attach_mem_ctrls(
            &dims,
            &eps.mem_ctrls,
            &eps.mem_dirs[..4],
            &params(&timing),
            &mut ids,
        );
        assert!(result.is_err());
        assert_eq!(0, ids.allocated());
    }

    #[test]
    fn short_compute_node_list_fails_before_attachment() {
        let (dims, timing, mut routers, eps) = setup();
        let mut ids = LinkIdAlloc::new();
        let result = attach_chiplet_nodes(
            &dims,
            0,
            0,
            &eps.cores[..8],
            &eps.core_dirs,
            timing.top_vc,
            &params(&timing),
            &mut routers,
            &mut ids,
        );
        assert!(result.is_err());
        assert_eq!(0, ids.allocated());
    }

    #[test]
    fn leftover_nodes_land_on_the_overflow_router() {
        let (dims, timing, _, eps) = setup();
        let mut ids = LinkIdAlloc::new();
        let links =
            attach_overflow_dirs(&dims, &eps.extra_dirs, &params(&timing), &mut ids).unwrap();
        assert_eq!(2, links.len());
        for link in &links {
            assert_eq!(dims.overflow_router.unwrap(), link.router);
        }
    }

    #[test]
    fn leftovers_without_overflow_router_are_fatal() {
        let cfg = TopologyConfig {
            kind: crate::topo::config::TopologyKind::FlatMesh,
            num_cpus: 16,
            num_chiplets: 1,
            num_mem_ctrls: 0,
            ..TopologyConfig::default()
        };
        let dims = cfg.validate().unwrap();
        let timing = TimingConfig::default();
        let eps = Endpoints::generate(16, 0, 1);
        let mut ids = LinkIdAlloc::new();
        assert!(attach_overflow_dirs(&dims, &eps.extra_dirs, &params(&timing), &mut ids).is_err());
    }
}
