use std::str::FromStr;

use anyhow::{ensure, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

use crate::topo::types::{ClockDomain, RouterId};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// Compute-tier mesh only, no interposer.
    FlatMesh,
    /// Chiplet meshes over a regular interposer mesh with sparse bridge taps.
    #[default]
    ChipletMesh,
    /// Chiplet meshes over the irregular Kite interposer overlay.
    Kite,
}

impl FromStr for TopologyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "flat_mesh" => Ok(Self::FlatMesh),
            "chiplet_mesh" => Ok(Self::ChipletMesh),
            "kite" => Ok(Self::Kite),
            _ => Err(format!(
                "unsupported topology kind '{}', expected one of: flat_mesh, chiplet_mesh, kite",
                value
            )),
        }
    }
}

/// Structural parameters of one topology build.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TopologyConfig {
    pub kind: TopologyKind,
    pub num_cpus: usize,
    pub num_chiplets: usize,
    /// Mesh rows per chiplet.
    pub mesh_rows: usize,
    /// Compute-tier routers funneled through one interposer attachment.
    pub concentration_factor: usize,
    pub num_mem_ctrls: usize,
    pub noi_rows: usize,
    pub noi_cols: usize,
    /// Global row indices (across all chiplets) of bridged compute routers.
    /// Empty means every row. Ignored by the Kite variant, which bridges the
    /// full grid.
    pub bridge_rows: Vec<usize>,
    /// Global column indices of bridged compute routers. Empty means every
    /// column.
    pub bridge_cols: Vec<usize>,
    pub mem_size_bytes: u64,
}

impl Config for TopologyConfig {}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            kind: TopologyKind::ChipletMesh,
            num_cpus: 64,
            num_chiplets: 4,
            mesh_rows: 4,
            concentration_factor: 4,
            num_mem_ctrls: 8,
            noi_rows: 4,
            noi_cols: 4,
            bridge_rows: vec![0, 3, 4, 7],
            bridge_cols: vec![1, 2, 5, 6],
            mem_size_bytes: 4 << 30,
        }
    }
}

/// Timing and physical parameters. Defaults match the reference platform;
/// all can be overridden per section in the config file.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct TimingConfig {
    pub link_latency: u32,
    pub router_latency: u32,
    pub chiplet_clock_mhz: u32,
    pub tsv_clock_mhz: u32,
    pub mem_clock_mhz: u32,
    pub sys_voltage_mv: u32,
    pub chiplet_width: u32,
    pub noi_width: u32,
    pub tsv_width: u32,
    /// Virtual channels per vnet on compute-tier routers.
    pub top_vc: usize,
    /// Virtual channels per vnet on interposer-tier routers.
    pub bottom_vc: usize,
}

impl Config for TimingConfig {}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            link_latency: 1,
            router_latency: 1,
            chiplet_clock_mhz: 2000,
            tsv_clock_mhz: 1000,
            mem_clock_mhz: 1000,
            sys_voltage_mv: 900,
            chiplet_width: 128,
            noi_width: 64,
            tsv_width: 32,
            top_vc: 4,
            bottom_vc: 8,
        }
    }
}

impl TimingConfig {
    pub fn chiplet_clk(&self) -> ClockDomain {
        ClockDomain {
            freq_mhz: self.chiplet_clock_mhz,
            voltage_mv: self.sys_voltage_mv,
        }
    }

    pub fn tsv_clk(&self) -> ClockDomain {
        ClockDomain {
            freq_mhz: self.tsv_clock_mhz,
            voltage_mv: self.sys_voltage_mv,
        }
    }

    pub fn mem_clk(&self) -> ClockDomain {
        ClockDomain {
            freq_mhz: self.mem_clock_mhz,
            voltage_mv: self.sys_voltage_mv,
        }
    }
}

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

fn exact_sqrt(n: usize) -> Option<usize> {
    let root = (n as f64).sqrt().round() as usize;
    (root * root == n).then_some(root)
}

/// Derived dimensions, computed once by [`TopologyConfig::validate`] before
/// any router or link is allocated.
#[derive(Debug, Clone, Copy)]
pub struct TopologyDims {
    pub chiplets_x: usize,
    pub chiplets_y: usize,
    /// Mesh columns per chiplet.
    pub cores_x: usize,
    /// Mesh rows per chiplet.
    pub cores_y: usize,
    pub cpus_per_chiplet: usize,
    /// Compute-tier mesh columns across all chiplets.
    pub noc_total_cols: usize,
    /// Compute-tier mesh rows across all chiplets.
    pub noc_total_rows: usize,
    pub conc_x: usize,
    pub conc_y: usize,
    pub num_noc_routers: usize,
    pub noi_rows: usize,
    pub noi_cols: usize,
    pub num_noi_routers: usize,
    pub total_routers: usize,
    /// Dedicated router absorbing nodes that do not partition evenly.
    pub overflow_router: Option<RouterId>,
}

impl TopologyDims {
    pub fn noi_base(&self) -> RouterId {
        self.num_noc_routers
    }
}

impl TopologyConfig {
    /// Checks every algebraic property the construction algorithms rely on
    /// and derives the grid dimensions. Fails before anything is allocated,
    /// naming the offending parameter.
    pub fn validate(&self) -> Result<TopologyDims> {
        ensure!(self.num_cpus > 0, "num_cpus must be positive");
        ensure!(self.num_chiplets > 0, "num_chiplets must be positive");
        ensure!(self.mesh_rows > 0, "mesh_rows must be positive");

        let chiplets_x = exact_sqrt(self.num_chiplets).ok_or_else(|| {
            anyhow::anyhow!("num_chiplets must be a perfect square, got {}", self.num_chiplets)
        })?;
        let chiplets_y = chiplets_x;

        ensure!(
            self.num_cpus % self.num_chiplets == 0,
            "num_cpus ({}) must be divisible by num_chiplets ({})",
            self.num_cpus,
            self.num_chiplets
        );
        let cpus_per_chiplet = self.num_cpus / self.num_chiplets;
        ensure!(
            cpus_per_chiplet % self.mesh_rows == 0,
            "cores per chiplet ({}) must be divisible by mesh_rows ({})",
            cpus_per_chiplet,
            self.mesh_rows
        );
        let cores_y = self.mesh_rows;
        let cores_x = cpus_per_chiplet / self.mesh_rows;

        let num_noc_routers = self.num_cpus;
        let flat = matches!(self.kind, TopologyKind::FlatMesh);

        if flat {
            ensure!(
                self.num_mem_ctrls == 0,
                "num_mem_ctrls must be 0 for flat_mesh, got {}",
                self.num_mem_ctrls
            );
            return Ok(TopologyDims {
                chiplets_x,
                chiplets_y,
                cores_x,
                cores_y,
                cpus_per_chiplet,
                noc_total_cols: cores_x * chiplets_x,
                noc_total_rows: cores_y * chiplets_y,
                conc_x: 1,
                conc_y: 1,
                num_noc_routers,
                noi_rows: 0,
                noi_cols: 0,
                num_noi_routers: 0,
                total_routers: num_noc_routers,
                overflow_router: None,
            });
        }

        ensure!(
            self.concentration_factor > 0,
            "concentration_factor must be positive"
        );
        let conc_x = exact_sqrt(self.concentration_factor).ok_or_else(|| {
            anyhow::anyhow!(
                "concentration_factor must be a perfect square, got {}",
                self.concentration_factor
            )
        })?;
        let conc_y = conc_x;

        ensure!(self.noi_rows > 0, "noi_rows must be positive");
        ensure!(self.noi_cols > 0, "noi_cols must be positive");
        if matches!(self.kind, TopologyKind::Kite) {
            ensure!(
                self.noi_rows == 4 && self.noi_cols == 5,
                "kite requires a 4x5 interposer, got {}x{}",
                self.noi_rows,
                self.noi_cols
            );
        }
        ensure!(
            self.num_mem_ctrls % (2 * self.noi_rows) == 0,
            "num_mem_ctrls ({}) must be divisible by 2 * noi_rows ({})",
            self.num_mem_ctrls,
            2 * self.noi_rows
        );

        let num_noi_routers = self.noi_rows * self.noi_cols;
        // One extra router absorbs leftover directory nodes.
        let total_routers = num_noc_routers + num_noi_routers + 1;
        Ok(TopologyDims {
            chiplets_x,
            chiplets_y,
            cores_x,
            cores_y,
            cpus_per_chiplet,
            noc_total_cols: cores_x * chiplets_x,
            noc_total_rows: cores_y * chiplets_y,
            conc_x,
            conc_y,
            num_noc_routers,
            noi_rows: self.noi_rows,
            noi_cols: self.noi_cols,
            num_noi_routers,
            total_routers,
            overflow_router: Some(total_routers - 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let dims = TopologyConfig::default().validate().unwrap();
        assert_eq!(2, dims.chiplets_x);
        assert_eq!(4, dims.cores_x);
        assert_eq!(4, dims.cores_y);
        assert_eq!(16, dims.cpus_per_chiplet);
        assert_eq!(8, dims.noc_total_cols);
        assert_eq!(64, dims.num_noc_routers);
        assert_eq!(16, dims.num_noi_routers);
        assert_eq!(81, dims.total_routers);
        assert_eq!(Some(80), dims.overflow_router);
    }

    #[test]
    fn flat_mesh_has_no_interposer() {
        let cfg = TopologyConfig {
            kind: TopologyKind::FlatMesh,
            num_cpus: 16,
            num_chiplets: 1,
            mesh_rows: 4,
            num_mem_ctrls: 0,
            ..TopologyConfig::default()
        };
        let dims = cfg.validate().unwrap();
        assert_eq!(16, dims.total_routers);
        assert_eq!(0, dims.num_noi_routers);
        assert!(dims.overflow_router.is_none());
    }

    #[test]
    fn rejects_non_square_chiplet_count() {
        let cfg = TopologyConfig {
            num_chiplets: 3,
            num_cpus: 48,
            ..TopologyConfig::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("num_chiplets"), "{err}");
    }

    #[test]
    fn rejects_zero_concentration() {
        let cfg = TopologyConfig {
            concentration_factor: 0,
            ..TopologyConfig::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("concentration_factor"), "{err}");
    }

    #[test]
    fn rejects_non_square_concentration() {
        let cfg = TopologyConfig {
            concentration_factor: 3,
            ..TopologyConfig::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("concentration_factor"), "{err}");
    }

    #[test]
    fn rejects_indivisible_mesh_rows() {
        let cfg = TopologyConfig {
            mesh_rows: 3,
            ..TopologyConfig::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("mesh_rows"), "{err}");
    }

    #[test]
    fn rejects_indivisible_mem_ctrls() {
        let cfg = TopologyConfig {
            num_mem_ctrls: 6,
            ..TopologyConfig::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("num_mem_ctrls"), "{err}");
    }

    #[test]
    fn rejects_mem_ctrls_on_flat_mesh() {
        let cfg = TopologyConfig {
            kind: TopologyKind::FlatMesh,
            num_cpus: 16,
            num_chiplets: 1,
            num_mem_ctrls: 8,
            ..TopologyConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn kite_requires_4x5_interposer() {
        let cfg = TopologyConfig {
            kind: TopologyKind::Kite,
            noi_rows: 4,
            noi_cols: 4,
            ..TopologyConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = TopologyConfig {
            kind: TopologyKind::Kite,
            noi_rows: 4,
            noi_cols: 5,
            num_mem_ctrls: 8,
            ..TopologyConfig::default()
        };
        let dims = cfg.validate().unwrap();
        assert_eq!(20, dims.num_noi_routers);
        assert_eq!(85, dims.total_routers);
    }

    #[test]
    fn kind_parses_from_str() {
        assert_eq!(TopologyKind::Kite, "kite".parse().unwrap());
        assert_eq!(TopologyKind::FlatMesh, "flat_mesh".parse().unwrap());
        assert!("ring".parse::<TopologyKind>().is_err());
    }
}
