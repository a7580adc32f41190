use anyhow::{ensure, Result};
use log::info;
use serde::Serialize;

use crate::topo::link::{ExternalLink, InternalLink};
use crate::topo::router::Router;
use crate::topo::types::PortDir;

/// The finished topology: every router and every directed link of both
/// tiers. Serializable as-is for dumping.
#[derive(Debug, Serialize)]
pub struct TopologyGraph {
    pub routers: Vec<Router>,
    pub int_links: Vec<InternalLink>,
    pub ext_links: Vec<ExternalLink>,
    /// Routers below this id are compute-tier, the rest interposer-tier
    /// (including the overflow router).
    pub noc_router_count: usize,
}

impl TopologyGraph {
    pub fn log_summary(&self) {
        info!(
            "topology: {} routers ({} compute-tier), {} internal links, {} external links",
            self.routers.len(),
            self.noc_router_count,
            self.int_links.len(),
            self.ext_links.len()
        );
    }

    /// Structural self-check run after every build. Catches id gaps,
    /// dangling references, weight-order violations that would deadlock
    /// dimension-order routing, and asymmetric bridges.
    pub fn verify(&self) -> Result<()> {
        for (pos, router) in self.routers.iter().enumerate() {
            ensure!(
                router.id == pos,
                "router id {} found at position {}",
                router.id,
                pos
            );
        }

        let mut link_ids: Vec<usize> = self
            .int_links
            .iter()
            .map(|l| l.id)
            .chain(self.ext_links.iter().map(|l| l.id))
            .collect();
        link_ids.sort_unstable();
        for (pos, id) in link_ids.iter().enumerate() {
            ensure!(
                *id == pos,
                "link ids are not dense: expected {} at position {}, found {}",
                pos,
                pos,
                id
            );
        }

        let n = self.routers.len();
        for link in &self.int_links {
            ensure!(
                link.src < n && link.dst < n,
                "internal link {} references router outside range {}",
                link.id,
                n
            );
        }
        for link in &self.ext_links {
            ensure!(
                link.router < n,
                "external link {} references router {} outside range {}",
                link.id,
                link.router,
                n
            );
        }

        self.verify_weight_order()?;
        self.verify_bridge_symmetry()
    }

    /// Within each tier, every X-dimension link must weigh strictly less
    /// than every Y-dimension link. Only links with mesh ports participate;
    /// portless interposer shortcuts carry no dimension. Bridges (Up/Down)
    /// span tiers and are exempt.
    fn verify_weight_order(&self) -> Result<()> {
        let tier = |router: usize| usize::from(router >= self.noc_router_count);
        let mut max_x = [None::<u32>; 2];
        let mut min_y = [None::<u32>; 2];
        for link in &self.int_links {
            let Some(port) = link.src_outport else {
                continue;
            };
            if matches!(port, PortDir::Up | PortDir::Down) {
                continue;
            }
            let t = tier(link.src);
            ensure!(
                t == tier(link.dst),
                "mesh link {} crosses tiers without bridge ports",
                link.id
            );
            if port.is_x_dim() {
                max_x[t] = Some(max_x[t].map_or(link.weight, |w| w.max(link.weight)));
            } else {
                min_y[t] = Some(min_y[t].map_or(link.weight, |w| w.min(link.weight)));
            }
        }
        for t in 0..2 {
            if let (Some(x), Some(y)) = (max_x[t], min_y[t]) {
                ensure!(
                    x < y,
                    "tier {} X-dimension weight {} not below Y-dimension weight {}",
                    t,
                    x,
                    y
                );
            }
        }
        Ok(())
    }

    /// Every Down link must have exactly one Up twin with swapped endpoints.
    fn verify_bridge_symmetry(&self) -> Result<()> {
        let downs = self
            .int_links
            .iter()
            .filter(|l| l.src_outport == Some(PortDir::Down));
        let mut down_count = 0;
        for down in downs {
            down_count += 1;
            let twins = self
                .int_links
                .iter()
                .filter(|l| {
                    l.src_outport == Some(PortDir::Up) && l.src == down.dst && l.dst == down.src
                })
                .count();
            ensure!(
                twins == 1,
                "bridge {} ({} -> {}) has {} return links, expected 1",
                down.id,
                down.src,
                down.dst,
                twins
            );
        }
        let up_count = self
            .int_links
            .iter()
            .filter(|l| l.src_outport == Some(PortDir::Up))
            .count();
        ensure!(
            down_count == up_count,
            "{} down-bridges but {} up-bridges",
            down_count,
            up_count
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topo::link::LinkParams;
    use crate::topo::types::ClockDomain;

    fn params() -> LinkParams {
        LinkParams {
            latency: 1,
            width: 64,
            clk_domain: ClockDomain {
                freq_mhz: 1000,
                voltage_mv: 900,
            },
        }
    }

    fn routers(n: usize) -> Vec<Router> {
        (0..n)
            .map(|id| Router {
                id,
                latency: 1,
                vcs_per_vnet: 4,
                clk_domain: ClockDomain {
                    freq_mhz: 1000,
                    voltage_mv: 900,
                },
                width: 64,
            })
            .collect()
    }

    #[test]
    fn empty_graph_verifies() {
        let graph = TopologyGraph {
            routers: routers(2),
            int_links: Vec::new(),
            ext_links: Vec::new(),
            noc_router_count: 2,
        };
        graph.verify().unwrap();
    }

    #[test]
    fn gap_in_link_ids_is_caught() {
        let p = params();
        let graph = TopologyGraph {
            routers: routers(2),
            int_links: vec![p.internal(0, 0, 1, None, 1), p.internal(2, 1, 0, None, 1)],
            ext_links: Vec::new(),
            noc_router_count: 2,
        };
        let err = graph.verify().unwrap_err().to_string();
        assert!(err.contains("dense"), "{err}");
    }

    #[test]
    fn dangling_router_reference_is_caught() {
        let p = params();
        let graph = TopologyGraph {
            routers: routers(2),
            int_links: vec![p.internal(0, 0, 5, None, 1)],
            ext_links: Vec::new(),
            noc_router_count: 2,
        };
        assert!(graph.verify().is_err());
    }

    #[test]
    fn inverted_weight_order_is_caught() {
        let p = params();
        let graph = TopologyGraph {
            routers: routers(4),
            int_links: vec![
                p.internal(0, 0, 1, Some((PortDir::East, PortDir::West)), 3),
                p.internal(1, 0, 2, Some((PortDir::North, PortDir::South)), 2),
            ],
            ext_links: Vec::new(),
            noc_router_count: 4,
        };
        let err = graph.verify().unwrap_err().to_string();
        assert!(err.contains("weight"), "{err}");
    }

    #[test]
    fn weight_order_is_per_tier() {
        // heavy X link on the interposer does not clash with a light Y link
        // on the compute tier
        let p = params();
        let graph = TopologyGraph {
            routers: routers(4),
            int_links: vec![
                p.internal(0, 0, 1, Some((PortDir::North, PortDir::South)), 2),
                p.internal(1, 2, 3, Some((PortDir::East, PortDir::West)), 5),
            ],
            ext_links: Vec::new(),
            noc_router_count: 2,
        };
        graph.verify().unwrap();
    }

    #[test]
    fn missing_bridge_twin_is_caught() {
        let p = params();
        let graph = TopologyGraph {
            routers: routers(2),
            int_links: vec![p.internal(0, 0, 1, Some((PortDir::Down, PortDir::Up)), 1)],
            ext_links: Vec::new(),
            noc_router_count: 1,
        };
        let err = graph.verify().unwrap_err().to_string();
        assert!(err.contains("bridge"), "{err}");
    }

    #[test]
    fn matched_bridge_pair_verifies() {
        let p = params();
        let graph = TopologyGraph {
            routers: routers(2),
            int_links: vec![
                p.internal(0, 0, 1, Some((PortDir::Down, PortDir::Up)), 1),
                p.internal(1, 1, 0, Some((PortDir::Up, PortDir::Down)), 1),
            ],
            ext_links: Vec::new(),
            noc_router_count: 1,
        };
        graph.verify().unwrap();
    }
}
