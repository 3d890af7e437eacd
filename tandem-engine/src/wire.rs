//! Fixed-width wire records for the phase protocols
//!
//! Every record is plain old data so exchange buffers can be cast to byte
//! frames without serialization. The variable-length ball protocol does not
//! use records; it encodes `[vertex, eid, len, ball...]` runs in raw `i64`
//! word streams.

use bytemuck::{Pod, Zeroable};

use crate::hashing::{EdgeId, VertexId};

/// An edge announcing one of its endpoints to the endpoint's owner, tagged
/// with the id the reply should be routed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EndpointProbe {
    pub vertex: VertexId,
    pub eid: EdgeId,
}

/// A vertex owner reporting the sparse degree of one endpoint back to an
/// edge owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DegreeReply {
    pub eid: EdgeId,
    pub degree: i64,
}

/// One undirected edge in canonical (u < v) orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EdgePair {
    pub u: VertexId,
    pub v: VertexId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_tightly_packed() {
        assert_eq!(std::mem::size_of::<EndpointProbe>(), 16);
        assert_eq!(std::mem::size_of::<DegreeReply>(), 16);
        assert_eq!(std::mem::size_of::<EdgePair>(), 16);
    }

    #[test]
    fn records_survive_byte_casting() {
        let probes = vec![
            EndpointProbe { vertex: 1, eid: -9 },
            EndpointProbe { vertex: 2, eid: 77 },
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&probes);
        let back: Vec<EndpointProbe> = bytemuck::pod_collect_to_vec(bytes);
        assert_eq!(back, probes);
    }
}
