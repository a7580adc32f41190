use anyhow::{ensure, Result};
use log::debug;

use crate::topo::link::{symmetric_pair, InternalLink, LinkParams};
use crate::topo::types::{LinkIdAlloc, PortDir, RouterId};

/// One hand-designed interposer shortcut in grid coordinates. Each entry
/// expands into the standard two opposite-direction links. Ports are left
/// to the table because non-grid edges have no canonical mesh direction;
/// `None` defers port naming to the consumer.
#[derive(Debug, Clone, Copy)]
pub struct ShortcutEdge {
    pub a: (usize, usize),
    pub b: (usize, usize),
    pub ports: Option<(PortDir, PortDir)>,
    pub weight: u32,
}

const fn edge(a: (usize, usize), b: (usize, usize)) -> ShortcutEdge {
    ShortcutEdge {
        a,
        b,
        ports: None,
        weight: 2,
    }
}

/// The Kite interposer wiring for a 4x5 grid. This table *replaces* the
/// regular interposer mesh: partial latitudes along the memory edges, short
/// meridians on the outer columns, and the diagonal spoke families that give
/// the layout its name. Coordinates are (row, col).
pub const KITE_OVERLAY: &[ShortcutEdge] = &[
    // latitudes: outer column pairs of every row
    edge((0, 0), (0, 1)),
    edge((0, 3), (0, 4)),
    edge((1, 0), (1, 1)),
    edge((1, 3), (1, 4)),
    edge((2, 0), (2, 1)),
    edge((2, 3), (2, 4)),
    edge((3, 0), (3, 1)),
    edge((3, 3), (3, 4)),
    // meridians: outer columns, split at the die midline
    edge((0, 0), (1, 0)),
    edge((2, 0), (3, 0)),
    edge((0, 4), (1, 4)),
    edge((2, 4), (3, 4)),
    // 60-degree spokes
    edge((0, 0), (2, 1)),
    edge((3, 0), (1, 1)),
    edge((0, 4), (2, 3)),
    edge((3, 4), (1, 3)),
    // 30-degree spokes
    edge((0, 0), (1, 2)),
    edge((3, 0), (2, 2)),
    edge((0, 4), (1, 2)),
    edge((3, 4), (2, 2)),
    // 30-degree spokes, middle rows
    edge((1, 0), (2, 2)),
    edge((2, 0), (1, 2)),
    edge((1, 4), (2, 2)),
    edge((2, 4), (1, 2)),
    // 30-degree spokes, center columns
    edge((0, 1), (1, 3)),
    edge((1, 1), (0, 3)),
    edge((2, 1), (3, 3)),
    edge((3, 1), (2, 3)),
    // spider: top-center hub fanning down
    edge((0, 2), (1, 0)),
    edge((0, 2), (2, 1)),
    edge((0, 2), (2, 3)),
    edge((0, 2), (1, 4)),
    // spider: bottom-center hub fanning up
    edge((3, 2), (2, 0)),
    edge((3, 2), (1, 1)),
    edge((3, 2), (1, 3)),
    edge((3, 2), (2, 4)),
];

/// Expands a shortcut table into symmetric link pairs over the interposer
/// block starting at `base`. Every coordinate is bounds-checked against the
/// grid before any link is emitted.
pub fn expand_overlay(
    table: &[ShortcutEdge],
    base: RouterId,
    noi_rows: usize,
    noi_cols: usize,
    params: &LinkParams,
    ids: &mut LinkIdAlloc,
) -> Result<Vec<InternalLink>> {
    for shortcut in table {
        for (row, col) in [shortcut.a, shortcut.b] {
            ensure!(
                row < noi_rows && col < noi_cols,
                "overlay edge {:?} references ({}, {}) outside the {}x{} interposer grid",
                shortcut,
                row,
                col,
                noi_rows,
                noi_cols
            );
        }
    }

    let router_at = |(row, col): (usize, usize)| base + col + row * noi_cols;
    let mut links = Vec::with_capacity(table.len() * 2);
    for shortcut in table {
        links.extend(symmetric_pair(
            ids,
            params,
            router_at(shortcut.a),
            router_at(shortcut.b),
            shortcut.ports,
            shortcut.weight,
        ));
    }
    debug!("overlay expanded {} shortcut pairs", table.len());
    Ok(links)
}
