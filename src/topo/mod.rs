pub mod bridge;
pub mod builder;
pub mod config;
pub mod endpoints;
pub mod graph;
pub mod link;
pub mod mesh;
pub mod overlay;
pub mod router;
pub mod types;


pub use bridge::{build_bridges, BridgeParams, BridgeTaps, BRIDGE_WEIGHT};
pub use builder::build_topology;
pub use config::{Config, TimingConfig, TopologyConfig, TopologyDims, TopologyKind};
pub use graph::TopologyGraph;
pub use link::{symmetric_pair, ExternalLink, InternalLink, LinkParams};
pub use mesh::{generate_mesh_links, MeshBlock, X_WEIGHT, Y_WEIGHT};
pub use overlay::{expand_overlay, ShortcutEdge, KITE_OVERLAY};
pub use router::{allocate_routers, Router};
pub use types::{
    ClockDomain, Endpoints, LinkId, LinkIdAlloc, Node, NodeRole, PortDir, RouterId,
};
