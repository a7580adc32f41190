use anyhow::{ensure, Result};
use log::{debug, info};

use crate::topo::bridge::{build_bridges, BridgeParams, BridgeTaps};
use crate::topo::config::{TimingConfig, TopologyConfig, TopologyDims, TopologyKind};
use crate::topo::endpoints::{attach_chiplet_nodes, attach_mem_ctrls, attach_overflow_dirs};
use crate::topo::graph::TopologyGraph;
use crate::topo::link::{ExternalLink, InternalLink, LinkParams};
use crate::topo::mesh::{generate_mesh_links, MeshBlock};
use crate::topo::overlay::{expand_overlay, KITE_OVERLAY};
use crate::topo::router::allocate_routers;
use crate::topo::types::{Endpoints, LinkIdAlloc};

/// Builds the complete two-tier topology for one configuration. Construction
/// order is fixed so that link ids are reproducible: per chiplet the compute
/// attachments, directory attachments and intra-chiplet mesh; then the
/// vertical bridges; then the interposer fabric; then the memory edge and
/// leftover directories.
pub fn build_topology(
    cfg: &TopologyConfig,
    timing: &TimingConfig,
    endpoints: &Endpoints,
) -> Result<TopologyGraph> {
    let dims = cfg.validate()?;
    ensure!(
        endpoints.cores.len() == cfg.num_cpus,
        "expected {} compute nodes, got {}",
        cfg.num_cpus,
        endpoints.cores.len()
    );
    ensure!(
        endpoints.mem_ctrls.len() == cfg.num_mem_ctrls,
        "expected {} memory-controller nodes, got {}",
        cfg.num_mem_ctrls,
        endpoints.mem_ctrls.len()
    );

    let mut routers = allocate_routers(&dims, timing);
    let mut ids = LinkIdAlloc::new();
    let mut int_links: Vec<InternalLink> = Vec::new();
    let mut ext_links: Vec<ExternalLink> = Vec::new();

    let chiplet_params = LinkParams {
        latency: timing.link_latency,
        width: timing.chiplet_width,
        clk_domain: timing.chiplet_clk(),
    };
    for cy in 0..dims.chiplets_y {
        for cx in 0..dims.chiplets_x {
            ext_links.extend(attach_chiplet_nodes(
                &dims,
                cx,
                cy,
                &endpoints.cores,
                &endpoints.core_dirs,
                timing.top_vc,
                &chiplet_params,
                &mut routers,
                &mut ids,
            )?);
            let block = MeshBlock {
                base: cx * dims.cores_x + cy * dims.chiplets_x * dims.cpus_per_chiplet,
                rows: dims.cores_y,
                cols: dims.cores_x,
                row_stride: dims.noc_total_cols,
            };
            int_links.extend(generate_mesh_links(
                &block,
                &chiplet_params,
                &mut routers,
                &mut ids,
            )?);
        }
    }
    debug!(
        "compute tier done: {} internal, {} external links",
        int_links.len(),
        ext_links.len()
    );

    if !matches!(cfg.kind, TopologyKind::FlatMesh) {
        let noi_params = LinkParams {
            latency: timing.link_latency,
            width: timing.noi_width,
            clk_domain: timing.mem_clk(),
        };

        let (taps, bridge_params) = bridge_plan(cfg, &dims);
        int_links.extend(build_bridges(
            &dims,
            &taps,
            &bridge_params,
            timing,
            &mut routers,
            &mut ids,
        )?);

        match cfg.kind {
            TopologyKind::ChipletMesh => {
                let block =
                    MeshBlock::contiguous(dims.noi_base(), dims.noi_rows, dims.noi_cols);
                int_links.extend(generate_mesh_links(
                    &block,
                    &noi_params,
                    &mut routers,
                    &mut ids,
                )?);
            }
            TopologyKind::Kite => {
                int_links.extend(expand_overlay(
                    KITE_OVERLAY,
                    dims.noi_base(),
                    dims.noi_rows,
                    dims.noi_cols,
                    &noi_params,
                    &mut ids,
                )?);
            }
            TopologyKind::FlatMesh => unreachable!(),
        }

        ext_links.extend(attach_mem_ctrls(
            &dims,
            &endpoints.mem_ctrls,
            &endpoints.mem_dirs,
            &noi_params,
            &mut ids,
        )?);
        ext_links.extend(attach_overflow_dirs(
            &dims,
            &endpoints.extra_dirs,
            &noi_params,
            &mut ids,
        )?);
    } else {
        ensure!(
            endpoints.extra_dirs.is_empty(),
            "flat mesh cannot absorb {} leftover nodes",
            endpoints.extra_dirs.len()
        );
    }

    let graph = TopologyGraph {
        routers,
        int_links,
        ext_links,
        noc_router_count: dims.num_noc_routers,
    };
    graph.verify()?;
    info!("built {:?} topology, {} link ids", cfg.kind, ids.allocated());
    Ok(graph)
}

/// The Kite interposer taps every compute router and sits one column wider
/// than the concentrated grid. The regular chiplet mesh taps only the
/// configured row/column intersection; an empty axis means the whole axis.
fn bridge_plan(cfg: &TopologyConfig, dims: &TopologyDims) -> (BridgeTaps, BridgeParams) {
    match cfg.kind {
        TopologyKind::Kite => (BridgeTaps::FullGrid, BridgeParams { col_shift: 1 }),
        _ => {
            if cfg.bridge_rows.is_empty() && cfg.bridge_cols.is_empty() {
                return (BridgeTaps::FullGrid, BridgeParams { col_shift: 0 });
            }
            let rows = if cfg.bridge_rows.is_empty() {
                (0..dims.noc_total_rows).collect()
            } else {
                cfg.bridge_rows.clone()
            };
            let cols = if cfg.bridge_cols.is_empty() {
                (0..dims.noc_total_cols).collect()
            } else {
                cfg.bridge_cols.clone()
            };
            (
                BridgeTaps::SparseGrid { rows, cols },
                BridgeParams { col_shift: 0 },
            )
        }
    }
}
