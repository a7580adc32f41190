use log::trace;
use serde::Serialize;

use crate::topo::types::{ClockDomain, LinkId, LinkIdAlloc, Node, PortDir, RouterId};

/// A directed router-to-router edge. Two opposite-direction instances make
/// up one logical bidirectional channel; they are independent records and
/// may carry different weights or SerDes flags per direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalLink {
    pub id: LinkId,
    pub src: RouterId,
    pub dst: RouterId,
    /// `None` leaves port naming to the consumer (plain interposer links and
    /// overlay shortcuts, as in the reference platform).
    pub src_outport: Option<PortDir>,
    pub dst_inport: Option<PortDir>,
    pub latency: u32,
    pub width: u32,
    pub weight: u32,
    pub clk_domain: ClockDomain,
    pub src_serdes: bool,
    pub dst_serdes: bool,
    pub src_cdc: bool,
    pub dst_cdc: bool,
}

/// A node-to-router attachment edge. Ports are implicit on the node side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalLink {
    pub id: LinkId,
    pub node: Node,
    pub router: RouterId,
    pub width: u32,
    pub latency: u32,
    pub clk_domain: ClockDomain,
}

/// Shared fields of one generation pass.
#[derive(Debug, Clone, Copy)]
pub struct LinkParams {
    pub latency: u32,
    pub width: u32,
    pub clk_domain: ClockDomain,
}

impl LinkParams {
    pub fn internal(
        &self,
        id: LinkId,
        src: RouterId,
        dst: RouterId,
        ports: Option<(PortDir, PortDir)>,
        weight: u32,
    ) -> InternalLink {
        let (src_outport, dst_inport) = match ports {
            Some((out, inp)) => (Some(out), Some(inp)),
            None => (None, None),
        };
        InternalLink {
            id,
            src,
            dst,
            src_outport,
            dst_inport,
            latency: self.latency,
            width: self.width,
            weight,
            clk_domain: self.clk_domain,
            src_serdes: false,
            dst_serdes: false,
            src_cdc: false,
            dst_cdc: false,
        }
    }

    pub fn external(&self, id: LinkId, node: Node, router: RouterId) -> ExternalLink {
        trace!("ExtLink {}: {:?}[{}] <-> Router[{}]", id, node.role, node.index, router);
        ExternalLink {
            id,
            node,
            router,
            width: self.width,
            latency: self.latency,
            clk_domain: self.clk_domain,
        }
    }
}

/// Emits one bidirectional channel as two opposite-direction links with
/// swapped endpoints and ports, drawing consecutive ids.
pub fn symmetric_pair(
    ids: &mut LinkIdAlloc,
    params: &LinkParams,
    a: RouterId,
    b: RouterId,
    ports: Option<(PortDir, PortDir)>,
    weight: u32,
) -> [InternalLink; 2] {
    let fwd = params.internal(ids.next_id(), a, b, ports, weight);
    let rev = params.internal(
        ids.next_id(),
        b,
        a,
        ports.map(|(out, inp)| (inp, out)),
        weight,
    );
    trace!("IntLink {}: Router[{}]->Router[{}]", fwd.id, a, b);
    trace!("IntLink {}: Router[{}]->Router[{}]", rev.id, b, a);
    [fwd, rev]
}
