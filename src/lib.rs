pub mod registry;
pub mod topo;
