//! Everything about a job that is fixed before the first task is handed out,
//! and what happens to its files once the last one completes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::store;
use common::task::{InputSplit, TaskDescriptor, TaskId, TaskKind};
use common::Error;

/// Where the reduce outputs end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Concatenate `mr-out-0 .. mr-out-<n_reduce-1>`, in partition order,
    /// into the single output file.
    #[default]
    Merged,

    /// The output path is a directory holding one `mr-out-<r>` per partition.
    Partitioned,
}

/// Intermediate files go in a hidden directory next to the output, named
/// after it, so jobs writing different outputs never share one.
pub fn default_work_dir(output: &Path) -> PathBuf {
    let name = match output.file_name() {
        Some(name) => format!(".{}.mr-work", name.to_string_lossy()),
        None => ".mr-work".to_string(),
    };
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

/// Check task counts and the input directory. Touches nothing.
pub fn validate(input_dir: &Path, n_map: u32, n_reduce: u32) -> Result<(), Error> {
    if n_map == 0 {
        return Err(Error::Config("n_map must be at least 1".into()));
    }
    if n_reduce == 0 {
        return Err(Error::Config("n_reduce must be at least 1".into()));
    }
    if !input_dir.is_dir() {
        return Err(Error::Config(format!(
            "input directory {} does not exist",
            input_dir.display()
        )));
    }
    fs::read_dir(input_dir).map_err(|e| {
        Error::Config(format!(
            "input directory {} is not readable: {e}",
            input_dir.display()
        ))
    })?;
    Ok(())
}

/// The static shape of a job: input splits, partition count and file locations.
#[derive(Debug, Clone)]
pub struct JobPlan {
    /// Input segments of map task `m`, at index `m`.
    pub splits: Vec<Vec<InputSplit>>,
    pub n_reduce: u32,

    /// Directory for intermediate files.
    pub work_dir: PathBuf,

    /// Final output: a file when merged, a directory when partitioned.
    pub output: PathBuf,
    pub output_mode: OutputMode,

    /// Name of the workload the tasks run.
    pub workload: String,
    pub aux: Vec<String>,
}

impl JobPlan {
    /// Split the contents of `input_dir` over `n_map` map tasks, in
    /// segments of at most `max_split_bytes`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_dir: &Path,
        n_map: u32,
        n_reduce: u32,
        max_split_bytes: u64,
        work_dir: PathBuf,
        output: PathBuf,
        output_mode: OutputMode,
        workload: impl Into<String>,
        aux: Vec<String>,
    ) -> Result<Self, Error> {
        validate(input_dir, n_map, n_reduce)?;

        let files = store::list_inputs(input_dir)?;
        info!(
            "Splitting {} input file(s) from {} over {} map task(s)",
            files.len(),
            input_dir.display(),
            n_map
        );

        Ok(Self {
            splits: store::split_inputs(&files, n_map, max_split_bytes)?,
            n_reduce,
            work_dir,
            output,
            output_mode,
            workload: workload.into(),
            aux,
        })
    }

    pub fn n_map(&self) -> u32 {
        self.splits.len() as u32
    }

    /// Directory reduce tasks write `mr-out-<r>` into.
    pub fn reduce_output_dir(&self) -> &Path {
        match self.output_mode {
            OutputMode::Merged => &self.work_dir,
            OutputMode::Partitioned => &self.output,
        }
    }

    /// Create the directories tasks write into.
    pub fn prepare(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.work_dir)?;
        fs::create_dir_all(self.reduce_output_dir())?;
        Ok(())
    }

    pub fn descriptor(&self, kind: TaskKind, id: TaskId) -> TaskDescriptor {
        let inputs = match kind {
            TaskKind::Map => self.splits[id as usize].clone(),
            TaskKind::Reduce => vec![],
        };

        TaskDescriptor {
            id,
            kind,
            inputs,
            n_map: self.n_map(),
            n_reduce: self.n_reduce,
            work_dir: self.work_dir.to_string_lossy().into_owned(),
            output_dir: self.reduce_output_dir().to_string_lossy().into_owned(),
            workload: self.workload.clone(),
            aux: self.aux.clone(),
        }
    }

    /// Put the output of a finished job in place and, unless
    /// `keep_intermediate` is set, remove the files tasks left behind.
    /// Returns the path of the final output.
    pub fn finish(&self, keep_intermediate: bool) -> Result<PathBuf, Error> {
        if self.output_mode == OutputMode::Merged {
            if let Some(parent) = self.output.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            store::merge_outputs(&self.work_dir, self.n_reduce, &self.output)?;
            info!("Merged {} partition(s) into {}", self.n_reduce, self.output.display());
        }

        if !keep_intermediate {
            store::remove_intermediate(&self.work_dir, self.n_map(), self.n_reduce)?;
            if self.output_mode == OutputMode::Merged {
                for r in 0..self.n_reduce {
                    store::remove_if_exists(&store::output_path(&self.work_dir, r))?;
                }
            }
            // Only succeeds when nothing else lives there.
            if fs::remove_dir(&self.work_dir).is_ok() {
                debug!("Removed {}", self.work_dir.display());
            }
        }

        Ok(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plan(input: &Path, root: &Path, mode: OutputMode) -> JobPlan {
        let output = match mode {
            OutputMode::Merged => root.join("out.txt"),
            OutputMode::Partitioned => root.join("out"),
        };
        JobPlan::new(
            input,
            2,
            3,
            store::DEFAULT_MAX_SPLIT_BYTES,
            root.join("mr-work"),
            output,
            mode,
            "wc",
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn work_dir_is_named_after_the_output() {
        assert_eq!(
            default_work_dir(Path::new("out/a.txt")),
            PathBuf::from("out/.a.txt.mr-work")
        );
        assert_ne!(
            default_work_dir(Path::new("out/a.txt")),
            default_work_dir(Path::new("out/b.txt"))
        );
        assert_eq!(default_work_dir(Path::new("parts")), PathBuf::from(".parts.mr-work"));
    }

    #[test]
    fn rejects_bad_counts_and_missing_input() {
        let dir = TempDir::new().unwrap();

        assert!(matches!(validate(dir.path(), 0, 1), Err(Error::Config(_))));
        assert!(matches!(validate(dir.path(), 1, 0), Err(Error::Config(_))));
        assert!(matches!(
            validate(&dir.path().join("missing"), 1, 1),
            Err(Error::Config(_))
        ));
        assert!(validate(dir.path(), 1, 1).is_ok());
    }

    #[test]
    fn descriptors_carry_the_other_count() {
        let input = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            fs::write(input.path().join(name), name).unwrap();
        }

        let plan = plan(input.path(), root.path(), OutputMode::Partitioned);
        assert_eq!(plan.n_map(), 2);

        let map = plan.descriptor(TaskKind::Map, 0);
        assert_eq!(map.inputs.len(), 2);
        assert_eq!(map.n_reduce, 3);

        let reduce = plan.descriptor(TaskKind::Reduce, 2);
        assert!(reduce.inputs.is_empty());
        assert_eq!(reduce.n_map, 2);
        assert_eq!(reduce.output_dir, root.path().join("out").to_string_lossy());
    }

    #[test]
    fn finish_merges_and_cleans_up() {
        let input = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();

        let plan = plan(input.path(), root.path(), OutputMode::Merged);
        plan.prepare().unwrap();
        for m in 0..2 {
            for r in 0..3 {
                fs::write(store::intermediate_path(&plan.work_dir, m, r), "").unwrap();
            }
        }
        for (r, line) in ["b 1\n", "", "a 2\n"].iter().enumerate() {
            fs::write(store::output_path(&plan.work_dir, r as u32), line).unwrap();
        }

        let output = plan.finish(false).unwrap();
        assert_eq!(fs::read_to_string(output).unwrap(), "b 1\na 2\n");
        assert!(!plan.work_dir.exists());
    }

    #[test]
    fn finish_can_keep_intermediate_files() {
        let input = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();

        let plan = plan(input.path(), root.path(), OutputMode::Partitioned);
        plan.prepare().unwrap();
        fs::write(store::intermediate_path(&plan.work_dir, 1, 2), "").unwrap();
        for r in 0..3 {
            fs::write(store::output_path(&plan.output, r), "").unwrap();
        }

        plan.finish(true).unwrap();
        assert!(store::intermediate_path(&plan.work_dir, 1, 2).exists());
        assert!(store::output_path(&plan.output, 2).exists());
    }
}
