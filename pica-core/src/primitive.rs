use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Topology {
    #[default]
    List,
    Strip,
    Fan,
}

impl Topology {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::List),
            1 => Some(Self::Strip),
            2 => Some(Self::Fan),
            _ => None,
        }
    }
}

/// Vertex index triples for every triangle formed by `vertex_count` vertices.
///
/// Every other strip triangle swaps its first two vertices so that all triangles in a strip keep
/// the winding of the first one. Trailing vertices that do not complete a triangle are dropped.
#[must_use]
pub fn assemble_triangles(topology: Topology, vertex_count: usize) -> Vec<[usize; 3]> {
    match topology {
        Topology::List => (0..vertex_count / 3).map(|i| [3 * i, 3 * i + 1, 3 * i + 2]).collect(),
        Topology::Strip => (0..vertex_count.saturating_sub(2))
            .map(|i| if i % 2 == 0 { [i, i + 1, i + 2] } else { [i + 1, i, i + 2] })
            .collect(),
        Topology::Fan => (1..vertex_count.saturating_sub(1)).map(|i| [0, i, i + 1]).collect(),
    }
}
