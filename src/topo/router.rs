use log::debug;
use serde::Serialize;

use crate::topo::config::{TimingConfig, TopologyDims};
use crate::topo::types::{ClockDomain, RouterId};

/// A switch point in the interconnect. Allocated once with tier defaults;
/// `vcs_per_vnet`, `clk_domain` and `width` are patched in place by later
/// link-generation passes when the router joins a mesh or a bridge (Phase 2
/// of the two-phase build).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Router {
    pub id: RouterId,
    pub latency: u32,
    pub vcs_per_vnet: usize,
    pub clk_domain: ClockDomain,
    pub width: u32,
}

/// Phase 1: instantiates the full router range `[0, total_routers)`.
/// Compute-tier routers come first, then interposer-tier routers, then the
/// overflow router (when present). Counts are validated by the caller.
pub fn allocate_routers(dims: &TopologyDims, timing: &TimingConfig) -> Vec<Router> {
    let mut routers = Vec::with_capacity(dims.total_routers);
    for id in 0..dims.total_routers {
        let compute_tier = id < dims.num_noc_routers;
        routers.push(Router {
            id,
            latency: timing.router_latency,
            vcs_per_vnet: if compute_tier {
                timing.top_vc
            } else {
                timing.bottom_vc
            },
            clk_domain: if compute_tier {
                timing.chiplet_clk()
            } else {
                timing.mem_clk()
            },
            width: if compute_tier {
                timing.chiplet_width
            } else {
                timing.noi_width
            },
        });
    }
    debug!(
        "allocated {} routers ({} NoC, {} NoI, overflow: {:?})",
        routers.len(),
        dims.num_noc_routers,
        dims.num_noi_routers,
        dims.overflow_router
    );
    routers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topo::config::TopologyConfig;

    #[test]
    fn router_ids_are_dense() {
        let cfg = TopologyConfig::default();
        let dims = cfg.validate().unwrap();
        let routers = allocate_routers(&dims, &TimingConfig::default());
        assert_eq!(dims.total_routers, routers.len());
        for (i, router) in routers.iter().enumerate() {
            assert_eq!(i, router.id);
        }
    }

    #[test]
    fn tiers_get_their_defaults() {
        let cfg = TopologyConfig::default();
        let dims = cfg.validate().unwrap();
        let timing = TimingConfig::default();
        let routers = allocate_routers(&dims, &timing);

        let noc = &routers[0];
        assert_eq!(timing.top_vc, noc.vcs_per_vnet);
        assert_eq!(timing.chiplet_clk(), noc.clk_domain);
        assert_eq!(timing.chiplet_width, noc.width);

        let noi = &routers[dims.noi_base()];
        assert_eq!(timing.bottom_vc, noi.vcs_per_vnet);
        assert_eq!(timing.mem_clk(), noi.clk_domain);
        assert_eq!(timing.noi_width, noi.width);

        let overflow = &routers[dims.overflow_router.unwrap()];
        assert_eq!(timing.bottom_vc, overflow.vcs_per_vnet);
    }
}
