//! Naming and partitioning conventions for files exchanged between tasks.
//!
//! Map task `m` writes partition `r` to `mr-<m>-<r>`; reduce task `r` reads
//! `mr-<m>-<r>` for every `m` and writes `mr-out-<r>`. Every file is written
//! through [`write_atomic`], so a reader only ever sees complete files, and
//! two executions of the same task converge on one final file.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::ihash;
use crate::task::{InputSplit, TaskId};

/// Name of the intermediate file holding partition `reduce_id` of map task `map_id`.
pub fn intermediate_name(map_id: TaskId, reduce_id: TaskId) -> String {
    format!("mr-{map_id}-{reduce_id}")
}

/// Name of the output file of reduce task `reduce_id`.
pub fn output_name(reduce_id: TaskId) -> String {
    format!("mr-out-{reduce_id}")
}

pub fn intermediate_path(work_dir: &Path, map_id: TaskId, reduce_id: TaskId) -> PathBuf {
    work_dir.join(intermediate_name(map_id, reduce_id))
}

pub fn output_path(output_dir: &Path, reduce_id: TaskId) -> PathBuf {
    output_dir.join(output_name(reduce_id))
}

/// The reduce partition a key belongs to.
pub fn partition(key: &[u8], n_reduce: u32) -> TaskId {
    ihash(key) % n_reduce
}

/// Write `data` to `path` so that `path` is either absent, its previous
/// contents, or exactly `data`; never partially written.
///
/// The data goes to a uniquely named temporary file next to `path` which is
/// then renamed over it.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = parent_dir(path);
    let mut tmp = tempfile::Builder::new()
        .prefix(".mr-tmp-")
        .tempfile_in(dir)?;

    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Regular, non-hidden files directly inside `dir`, sorted by file name.
pub fn list_inputs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type().is_file() && !hidden {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Upper bound on the size of an input segment, unless configured otherwise.
pub const DEFAULT_MAX_SPLIT_BYTES: u64 = 16 * 1024 * 1024;

/// Cut `path` into segments along line boundaries. Lines are gathered until
/// a segment would grow past `target` bytes; a single line longer than `max`
/// is cut into `max`-byte pieces. Empty files have no segments.
pub fn segment_file(path: &Path, target: u64, max: u64) -> io::Result<Vec<InputSplit>> {
    let name = path.to_string_lossy().into_owned();
    let split = |offset, len| InputSplit {
        path: name.clone(),
        offset,
        len,
    };

    let mut reader = BufReader::new(File::open(path)?);
    let mut segments = vec![];
    let mut line = Vec::new();
    // The pending segment is `start..pos`.
    let (mut start, mut pos) = (0u64, 0u64);

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)? as u64;
        if n == 0 {
            break;
        }

        if n > max {
            if pos > start {
                segments.push(split(start, pos - start));
            }
            let end = pos + n;
            while pos < end {
                let len = max.min(end - pos);
                segments.push(split(pos, len));
                pos += len;
            }
            start = pos;
            continue;
        }

        if pos > start && pos + n - start > target {
            segments.push(split(start, pos - start));
            start = pos;
        }
        pos += n;
    }
    if pos > start {
        segments.push(split(start, pos - start));
    }
    Ok(segments)
}

/// Cut `files` into line-aligned segments and spread them over `n_map`
/// splits of roughly equal size. Segments aim at an `n_map`th of the total
/// input and never exceed `max_split_bytes`. Splits may be empty.
pub fn split_inputs(
    files: &[PathBuf],
    n_map: u32,
    max_split_bytes: u64,
) -> io::Result<Vec<Vec<InputSplit>>> {
    let mut total = 0u64;
    for file in files {
        total += fs::metadata(file)?.len();
    }
    let max = max_split_bytes.max(1);
    let target = total.div_ceil(u64::from(n_map.max(1))).clamp(1, max);

    let mut splits = vec![Vec::new(); n_map as usize];
    let mut loads = vec![0u64; n_map as usize];
    for file in files {
        for segment in segment_file(file, target, max)? {
            // Lightest split first, lowest index on ties.
            let Some(m) = (0..splits.len()).min_by_key(|&m| (loads[m], m)) else {
                break;
            };
            loads[m] += segment.len;
            splits[m].push(segment);
        }
    }
    Ok(splits)
}

/// Read the bytes of one input segment.
pub fn read_split(split: &InputSplit) -> io::Result<Vec<u8>> {
    let mut file = File::open(&split.path)?;
    file.seek(SeekFrom::Start(split.offset))?;
    let mut data = vec![0; split.len as usize];
    file.read_exact(&mut data)?;
    Ok(data)
}

/// Concatenate `mr-out-0 .. mr-out-<n_reduce-1>` in partition order into `dest`.
pub fn merge_outputs(output_dir: &Path, n_reduce: u32, dest: &Path) -> io::Result<()> {
    let mut merged = Vec::new();
    for r in 0..n_reduce {
        merged.extend(fs::read(output_path(output_dir, r))?);
    }
    write_atomic(dest, &merged)
}

/// Remove the intermediate files of a finished job. Missing files are fine.
pub fn remove_intermediate(work_dir: &Path, n_map: u32, n_reduce: u32) -> io::Result<()> {
    for m in 0..n_map {
        for r in 0..n_reduce {
            remove_if_exists(&intermediate_path(work_dir, m, r))?;
        }
    }
    Ok(())
}

pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn names_follow_convention() {
        assert_eq!(intermediate_name(3, 1), "mr-3-1");
        assert_eq!(output_name(0), "mr-out-0");
    }

    #[test]
    fn same_key_same_partition() {
        for n_reduce in 1..8 {
            let p = partition(b"the", n_reduce);
            assert!(p < n_reduce);
            assert_eq!(p, partition(b"the", n_reduce));
        }
        assert_eq!(partition(b"anything", 1), 0);
    }

    #[test]
    fn atomic_write_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mr-0-0");

        write_atomic(&path, b"first version").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        // No temporaries left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn inputs_are_sorted_and_skip_hidden_files() {
        let dir = TempDir::new().unwrap();
        for name in ["c.txt", "a.txt", "b.txt", ".hidden"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = list_inputs(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);

        let splits = split_inputs(&files, 5, DEFAULT_MAX_SPLIT_BYTES).unwrap();
        assert_eq!(splits.len(), 5);
        assert_eq!(splits.iter().filter(|s| !s.is_empty()).count(), 3);
    }

    fn lens(segments: &[InputSplit]) -> Vec<u64> {
        segments.iter().map(|s| s.len).collect()
    }

    #[test]
    fn segments_end_at_line_boundaries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc");
        fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let segments = segment_file(&path, 8, 100).unwrap();
        assert_eq!(lens(&segments), [8, 6]);
        assert_eq!(read_split(&segments[1]).unwrap(), b"three\n");
    }

    #[test]
    fn oversized_lines_are_cut() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc");
        fs::write(&path, format!("{}\nb\n", "a".repeat(24))).unwrap();

        let segments = segment_file(&path, 100, 10).unwrap();
        assert_eq!(lens(&segments), [10, 10, 5, 2]);
        assert_eq!(read_split(&segments[2]).unwrap(), b"aaaa\n");
    }

    #[test]
    fn one_large_file_feeds_every_map_task() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        let text: String = (0..2000)
            .map(|i| format!("line {i:04} {}\n", "x".repeat(88)))
            .collect();
        fs::write(&path, &text).unwrap();

        let splits = split_inputs(&[path], 4, DEFAULT_MAX_SPLIT_BYTES).unwrap();
        assert!(splits.iter().all(|s| !s.is_empty()));

        // Every byte lands in exactly one segment, in order.
        let mut segments: Vec<_> = splits.into_iter().flatten().collect();
        segments.sort_by_key(|s| s.offset);
        let mut rebuilt = Vec::new();
        for segment in &segments {
            let data = read_split(segment).unwrap();
            assert!(data.ends_with(b"\n"));
            rebuilt.extend(data);
        }
        assert_eq!(rebuilt, text.as_bytes());
    }

    #[test]
    fn segments_respect_the_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc");
        fs::write(&path, "a b c\n".repeat(100)).unwrap();

        let splits = split_inputs(&[path], 1, 64).unwrap();
        assert_eq!(splits.len(), 1);
        assert!(splits[0].len() > 1);
        assert!(splits[0].iter().all(|s| s.len <= 64));
    }

    #[test]
    fn merge_keeps_partition_order() {
        let dir = TempDir::new().unwrap();
        fs::write(output_path(dir.path(), 0), "b 1\n").unwrap();
        fs::write(output_path(dir.path(), 1), "a 2\n").unwrap();

        let dest = dir.path().join("out.txt");
        merge_outputs(dir.path(), 2, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "b 1\na 2\n");
    }
}
