use serde::Serialize;

pub type RouterId = usize;
pub type LinkId = usize;

/// Per-build link-id allocator. Every generation pass draws ids from the
/// same allocator so that internal and external link ids together form one
/// dense, gapless range in construction order. Never shared between builds.
#[derive(Debug, Default, Clone)]
pub struct LinkIdAlloc {
    next: LinkId,
}

impl LinkIdAlloc {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next_id(&mut self) -> LinkId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> usize {
        self.next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortDir {
    East,
    West,
    North,
    South,
    Up,
    Down,
}

impl PortDir {
    pub fn is_x_dim(self) -> bool {
        matches!(self, PortDir::East | PortDir::West)
    }

    pub fn is_y_dim(self) -> bool {
        matches!(self, PortDir::North | PortDir::South)
    }
}

/// Clock/voltage domain stamped on routers and links. One instance per
/// tier (chiplet, TSV, interposer/memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockDomain {
    pub freq_mhz: u32,
    pub voltage_mv: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeRole {
    Core,
    Directory,
    MemCtrl,
    Dma,
}

/// Opaque endpoint handle supplied by the caller. The topology builder only
/// references nodes; it never creates or destroys them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Node {
    pub role: NodeRole,
    pub index: usize,
}

impl Node {
    pub fn new(role: NodeRole, index: usize) -> Self {
        Self { role, index }
    }
}

/// Caller-supplied endpoint set, pre-partitioned by role. Replaces the
/// positional index arithmetic of flat controller lists: each vector is
/// addressed by (role, local index) directly.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub cores: Vec<Node>,
    /// Directory controllers co-located with each core.
    pub core_dirs: Vec<Node>,
    pub mem_ctrls: Vec<Node>,
    /// Directory controllers co-located with each memory controller.
    pub mem_dirs: Vec<Node>,
    /// Leftover directory/DMA controllers with no regular attachment point.
    pub extra_dirs: Vec<Node>,
}

impl Endpoints {
    /// Generates a role-tagged endpoint set matching the structural counts.
    /// Indices are stable and contiguous per role, in the same order the
    /// caller of the original scripts packed its controller list.
    pub fn generate(num_cpus: usize, num_mem_ctrls: usize, num_extra_dirs: usize) -> Self {
        let mut dir_index = 0;
        let mut dir = |_: usize| {
            let node = Node::new(NodeRole::Directory, dir_index);
            dir_index += 1;
            node
        };
        let cores = (0..num_cpus).map(|i| Node::new(NodeRole::Core, i)).collect();
        let core_dirs = (0..num_cpus).map(&mut dir).collect();
        let mem_ctrls = (0..num_mem_ctrls)
            .map(|i| Node::new(NodeRole::MemCtrl, i))
            .collect();
        let mem_dirs = (0..num_mem_ctrls).map(&mut dir).collect();
        let extra_dirs = (0..num_extra_dirs).map(&mut dir).collect();
        Self {
            cores,
            core_dirs,
            mem_ctrls,
            mem_dirs,
            extra_dirs,
        }
    }

    pub fn total(&self) -> usize {
        self.cores.len()
            + self.core_dirs.len()
            + self.mem_ctrls.len()
            + self.mem_dirs.len()
            + self.extra_dirs.len()
    }
}
