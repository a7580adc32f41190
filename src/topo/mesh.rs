use anyhow::{ensure, Result};
use log::debug;

use crate::topo::link::{symmetric_pair, InternalLink, LinkParams};
use crate::topo::router::Router;
use crate::topo::types::{LinkIdAlloc, PortDir, RouterId};

/// Weight class for links traversing the X dimension (East/West). Strictly
/// below [`Y_WEIGHT`] so dimension-order routing exhausts X before Y,
/// which keeps the mesh deadlock-free.
pub const X_WEIGHT: u32 = 1;
/// Weight class for links traversing the Y dimension (North/South).
pub const Y_WEIGHT: u32 = 2;

/// A rectangular block of routers inside the global id space. The router at
/// `(x, y)` is `base + x + y * row_stride`. Chiplet blocks are interleaved
/// row-wise across the die, so `row_stride` is the full-die column count and
/// exceeds `cols` whenever several chiplets share a row.
#[derive(Debug, Clone, Copy)]
pub struct MeshBlock {
    pub base: RouterId,
    pub rows: usize,
    pub cols: usize,
    pub row_stride: usize,
}

impl MeshBlock {
    /// A self-contained block whose rows are contiguous.
    pub fn contiguous(base: RouterId, rows: usize, cols: usize) -> Self {
        Self {
            base,
            rows,
            cols,
            row_stride: cols,
        }
    }

    pub fn router_at(&self, x: usize, y: usize) -> RouterId {
        self.base + x + y * self.row_stride
    }
}

/// Generates the four directional link families for one rectangular block:
/// `rows*(cols-1)` East->West plus the mirror West->East family at
/// [`X_WEIGHT`], then `cols*(rows-1)` North->South plus South->North at
/// [`Y_WEIGHT`]. A degenerate `1xN` or `Nx1` block simply emits nothing for
/// the missing dimension. Routers touched by a link get the pass's clock
/// domain and width late-bound onto them.
pub fn generate_mesh_links(
    block: &MeshBlock,
    params: &LinkParams,
    routers: &mut [Router],
    ids: &mut LinkIdAlloc,
) -> Result<Vec<InternalLink>> {
    if block.rows > 0 && block.cols > 0 {
        let last = block.router_at(block.cols - 1, block.rows - 1);
        ensure!(
            last < routers.len(),
            "mesh block {:?} indexes router {} outside allocated range {}",
            block,
            last,
            routers.len()
        );
    }

    let mut links = Vec::new();
    let bind = |routers: &mut [Router], id: RouterId| {
        routers[id].clk_domain = params.clk_domain;
        routers[id].width = params.width;
    };

    // East output to West input, then the reverse family.
    for y in 0..block.rows {
        for x in 0..block.cols.saturating_sub(1) {
            let east_out = block.router_at(x, y);
            let west_in = block.router_at(x + 1, y);
            links.extend(symmetric_pair(
                ids,
                params,
                east_out,
                west_in,
                Some((PortDir::East, PortDir::West)),
                X_WEIGHT,
            ));
            bind(routers, east_out);
            bind(routers, west_in);
        }
    }

    // North output to South input, then the reverse family.
    for y in 0..block.rows.saturating_sub(1) {
        for x in 0..block.cols {
            let north_out = block.router_at(x, y);
            let south_in = block.router_at(x, y + 1);
            links.extend(symmetric_pair(
                ids,
                params,
                north_out,
                south_in,
                Some((PortDir::North, PortDir::South)),
                Y_WEIGHT,
            ));
            bind(routers, north_out);
            bind(routers, south_in);
        }
    }

    debug!(
        "mesh block base {} ({}x{}): {} links",
        block.base,
        block.rows,
        block.cols,
        links.len()
    );
    Ok(links)
}
