//! Built-in MapReduce applications, looked up by name.

use common::Workload;

pub mod grep;
pub mod vertex_degree;
pub mod wc;

/// Names of every built-in workload.
pub const NAMES: &[&str] = &["wc", "grep", "vertex-degree"];

/// Look up a workload by name.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
        }),
        "grep" => Some(Workload {
            map_fn: grep::map,
            reduce_fn: grep::reduce,
        }),
        "vertex-degree" => Some(Workload {
            map_fn: vertex_degree::map,
            reduce_fn: vertex_degree::reduce,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_resolves() {
        for name in NAMES {
            assert!(try_named(name).is_some(), "{name}");
        }
        assert!(try_named("matrix-multiply").is_none());
    }
}
