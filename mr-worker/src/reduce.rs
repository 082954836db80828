use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::{BufMut, BytesMut};
use itertools::Itertools;
use tracing::debug;

use common::task::TaskDescriptor;
use common::utils::aux_bytes;
use common::{codec, store, KeyValue, Workload};

/// Gather partition `task.id` from every map task, call the reduce function
/// once per key in key order, and write `key value` lines to `mr-out-<id>`.
pub fn perform_reduce(task: &TaskDescriptor, workload: &Workload) -> Result<()> {
    let aux = aux_bytes(&task.aux);
    let work_dir = Path::new(&task.work_dir);

    let mut pairs = Vec::new();
    for m in 0..task.n_map {
        let path = store::intermediate_path(work_dir, m, task.id);
        let data = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        pairs.extend(
            codec::decode_all(&data).with_context(|| format!("decoding {}", path.display()))?,
        );
    }

    // Stable, so values keep map task order within a key.
    pairs.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out = BytesMut::new();
    let mut keys = 0usize;
    for (key, group) in &pairs.into_iter().chunk_by(KeyValue::key) {
        let values = group.map(KeyValue::into_value);
        let value = (workload.reduce_fn)(key.clone(), Box::new(values), aux.clone())?;

        out.put_slice(&key);
        out.put_u8(b' ');
        out.put_slice(&value);
        out.put_u8(b'\n');
        keys += 1;
    }
    debug!("reduce task {}: {} key(s)", task.id, keys);

    let path = store::output_path(Path::new(&task.output_dir), task.id);
    store::write_atomic(&path, &out).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
