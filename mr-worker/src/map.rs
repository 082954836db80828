use std::path::Path;

use anyhow::{Context, Result};
use bytes::BytesMut;
use tracing::debug;

use common::task::TaskDescriptor;
use common::utils::aux_bytes;
use common::{codec, store, KeyValue, Workload};

/// Run the map function over every segment of the task's split and write
/// one intermediate file per reduce partition, empty ones included.
pub fn perform_map(task: &TaskDescriptor, workload: &Workload) -> Result<()> {
    let aux = aux_bytes(&task.aux);
    let mut buckets = vec![BytesMut::new(); task.n_reduce as usize];

    for input in &task.inputs {
        let contents = store::read_split(input).with_context(|| {
            format!("reading input {} at {}+{}", input.path, input.offset, input.len)
        })?;
        let path = Path::new(&input.path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.path.clone());

        let mut emitted = 0usize;
        let pairs = (workload.map_fn)(KeyValue::new(name, contents), aux.clone())?;
        for pair in pairs {
            let pair = pair?;
            let r = store::partition(&pair.key, task.n_reduce);
            codec::encode_into(&pair, &mut buckets[r as usize]);
            emitted += 1;
        }
        debug!("map task {}: {} pair(s) from {}", task.id, emitted, input.path);
    }

    let work_dir = Path::new(&task.work_dir);
    for (r, bucket) in buckets.iter().enumerate() {
        let path = store::intermediate_path(work_dir, task.id, r as u32);
        store::write_atomic(&path, bucket)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
