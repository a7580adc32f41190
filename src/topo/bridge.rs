use anyhow::{ensure, Result};
use log::{debug, trace};

use crate::topo::config::{TimingConfig, TopologyDims};
use crate::topo::link::InternalLink;
use crate::topo::router::Router;
use crate::topo::types::{LinkIdAlloc, PortDir, RouterId};

pub const BRIDGE_WEIGHT: u32 = 1;

/// Selects which compute-tier routers carry a vertical bridge (TSV) down to
/// the interposer.
#[derive(Debug, Clone)]
pub enum BridgeTaps {
    /// Every compute-tier router bridges.
    FullGrid,
    /// Only routers whose global (row, col) lies in both membership sets,
    /// e.g. the restricted tap pattern of the concentrated chiplet mesh.
    SparseGrid { rows: Vec<usize>, cols: Vec<usize> },
}

impl BridgeTaps {
    fn contains(&self, row: usize, col: usize) -> bool {
        match self {
            BridgeTaps::FullGrid => true,
            BridgeTaps::SparseGrid { rows, cols } => rows.contains(&row) && cols.contains(&col),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BridgeParams {
    /// Column shift applied before concentration, to center an interposer
    /// wider than the concentrated compute grid (1 for the 5-column Kite).
    pub col_shift: usize,
}

/// Emits the Down/Up bridge pair for every tapped compute router. The
/// interposer target concentrates `conc_x * conc_y` compute routers:
/// `noi_base + (row / conc_y) * noi_cols + (col + col_shift) / conc_x`.
///
/// SerDes and CDC are decided per link, per side: a SerDes stage whenever
/// that side's tier width differs from the TSV width, a CDC flag whenever
/// that side's tier clock differs from the TSV clock. The interposer
/// endpoint's VC depth is late-bound to the bottom-tier value here.
pub fn build_bridges(
    dims: &TopologyDims,
    taps: &BridgeTaps,
    params: &BridgeParams,
    timing: &TimingConfig,
    routers: &mut [Router],
    ids: &mut LinkIdAlloc,
) -> Result<Vec<InternalLink>> {
    let chip_serdes = timing.chiplet_width != timing.tsv_width;
    let noi_serdes = timing.noi_width != timing.tsv_width;
    let chip_cdc = timing.chiplet_clk() != timing.tsv_clk();
    let noi_cdc = timing.mem_clk() != timing.tsv_clk();
    let tsv_clk = timing.tsv_clk();

    let mut links = Vec::new();
    for row in 0..dims.noc_total_rows {
        for col in 0..dims.noc_total_cols {
            if !taps.contains(row, col) {
                continue;
            }
            let noc_router = col + row * dims.noc_total_cols;
            let noi_col = (col + params.col_shift) / dims.conc_x;
            let noi_row = row / dims.conc_y;
            ensure!(
                noi_col < dims.noi_cols && noi_row < dims.noi_rows,
                "bridge tap at ({}, {}) concentrates to interposer ({}, {}) outside the {}x{} grid",
                row,
                col,
                noi_row,
                noi_col,
                dims.noi_rows,
                dims.noi_cols
            );
            let noi_router: RouterId = dims.noi_base() + noi_col + noi_row * dims.noi_cols;
            ensure!(
                noc_router < routers.len() && noi_router < routers.len(),
                "bridge ({} -> {}) indexes outside allocated router range {}",
                noc_router,
                noi_router,
                routers.len()
            );

            let down = InternalLink {
                id: ids.next_id(),
                src: noc_router,
                dst: noi_router,
                src_outport: Some(PortDir::Down),
                dst_inport: Some(PortDir::Up),
                latency: timing.link_latency,
                width: timing.tsv_width,
                weight: BRIDGE_WEIGHT,
                clk_domain: tsv_clk,
                src_serdes: chip_serdes,
                dst_serdes: noi_serdes,
                src_cdc: chip_cdc,
                dst_cdc: noi_cdc,
            };
            trace!(
                "IntLink {}: NoCRouter[{}]->NoIRouter[{}]",
                down.id,
                noc_router,
                noi_router
            );
            let up = InternalLink {
                id: ids.next_id(),
                src: noi_router,
                dst: noc_router,
                src_outport: Some(PortDir::Up),
                dst_inport: Some(PortDir::Down),
                latency: timing.link_latency,
                width: timing.tsv_width,
                weight: BRIDGE_WEIGHT,
                clk_domain: tsv_clk,
                src_serdes: noi_serdes,
                dst_serdes: chip_serdes,
                src_cdc: noi_cdc,
                dst_cdc: chip_cdc,
            };
            trace!(
                "IntLink {}: NoIRouter[{}]->NoCRouter[{}]",
                up.id,
                noi_router,
                noc_router
            );
            links.push(down);
            links.push(up);
            routers[noi_router].vcs_per_vnet = timing.bottom_vc;
        }
    }
    debug!("bridged {} compute routers to the interposer", links.len() / 2);
    Ok(links)
}
