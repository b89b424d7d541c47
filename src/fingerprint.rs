use std::collections::BTreeMap;

use crate::{
    context::ReductionContext,
    core::ExprId,
    error::{VfxError, VfxResult},
    graph::ExprGraph,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GraphFingerprint {
    pub hi: u64,
    pub lo: u64,
}

impl std::fmt::Display for GraphFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

/// Structural hash of every reduced root, in root order. Arena ids do not contribute, so two
/// compilations that produce the same shapes hash equal even if one allocated more nodes.
pub fn fingerprint_reduced(
    graph: &ExprGraph,
    ctx: &ReductionContext,
) -> VfxResult<GraphFingerprint> {
    let mut a = Fnv1a64::new(0xcbf29ce484222325);
    let mut b = Fnv1a64::new(0x9ae16a3b2f90404f);

    // Ascending id order visits parents first.
    let mut digests = BTreeMap::<ExprId, GraphFingerprint>::new();
    for id in ctx.build_all_reduced(graph) {
        let digest = node_digest(graph, id, &digests)?;
        digests.insert(id, digest);
    }

    let roots = ctx.reduced_roots();
    write_u64_pair(&mut a, &mut b, roots.len() as u64);
    for (_, reduced) in roots {
        let digest = digests
            .get(&reduced)
            .ok_or(VfxError::UnknownExpression(reduced))?;
        write_u64_pair(&mut a, &mut b, digest.hi);
        write_u64_pair(&mut a, &mut b, digest.lo);
    }

    let usage = ctx.buffer_usage();
    write_u64_pair(&mut a, &mut b, usage.len() as u64);
    for (buffer, kind) in usage {
        match digests.get(buffer) {
            Some(d) => {
                write_u8_pair(&mut a, &mut b, 1);
                write_u64_pair(&mut a, &mut b, d.hi);
                write_u64_pair(&mut a, &mut b, d.lo);
            }
            None => write_u8_pair(&mut a, &mut b, 0),
        }
        write_str_pair(&mut a, &mut b, &kind.to_string());
    }

    Ok(GraphFingerprint {
        hi: a.finish(),
        lo: b.finish(),
    })
}

fn node_digest(
    graph: &ExprGraph,
    id: ExprId,
    digests: &BTreeMap<ExprId, GraphFingerprint>,
) -> VfxResult<GraphFingerprint> {
    let node = graph.node(id)?;
    let mut a = Fnv1a64::new(0xcbf29ce484222325);
    let mut b = Fnv1a64::new(0x9ae16a3b2f90404f);

    let kind = serde_json::to_string(node.kind()).map_err(|e| VfxError::serde(e.to_string()))?;
    write_str_pair(&mut a, &mut b, &kind);
    write_u64_pair(&mut a, &mut b, u64::from(node.flags().bits()));
    write_u64_pair(&mut a, &mut b, node.parents().len() as u64);
    for parent in node.parents() {
        let digest = digests
            .get(parent)
            .ok_or(VfxError::UnknownExpression(*parent))?;
        write_u64_pair(&mut a, &mut b, digest.hi);
        write_u64_pair(&mut a, &mut b, digest.lo);
    }

    Ok(GraphFingerprint {
        hi: a.finish(),
        lo: b.finish(),
    })
}

fn write_u8_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: u8) {
    a.write_u8(v);
    b.write_u8(v);
}

fn write_u64_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: u64) {
    a.write_u64(v);
    b.write_u64(v);
}

fn write_str_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, s: &str) {
    write_u64_pair(a, b, s.len() as u64);
    a.write_bytes(s.as_bytes());
    b.write_bytes(s.as_bytes());
}

#[derive(Clone, Copy)]
struct Fnv1a64(u64);

impl Fnv1a64 {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        self.0 = h;
    }

    fn finish(self) -> u64 {
        self.0
    }
}
