//! Distributed grep. Every line matching the pattern is a key; its value
//! lists the input files the line appears in.
//!
//! Arguments come from the job's auxiliary arguments:
//! `<pattern> [-i]`.

use std::collections::BTreeSet;

use anyhow::Result;
use bytes::Bytes;
use clap::Parser;

use common::utils::{aux_args, string_from_bytes};
use common::{KeyValue, MapOutput};

#[derive(Parser, Debug)]
#[command(name = "grep", no_binary_name = true)]
struct GrepArgs {
    /// Substring to look for.
    pattern: String,

    /// Match case-insensitively.
    #[arg(short, long)]
    ignore_case: bool,
}

impl GrepArgs {
    fn from_aux(aux: Bytes) -> Result<Self> {
        Ok(GrepArgs::try_parse_from(aux_args(&aux)?)?)
    }

    fn matches(&self, line: &str) -> bool {
        if self.ignore_case {
            line.to_lowercase().contains(&self.pattern.to_lowercase())
        } else {
            line.contains(&self.pattern)
        }
    }
}

pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args = GrepArgs::from_aux(aux)?;
    let file = kv.key();
    let text = string_from_bytes(kv.value)?;

    let hits: Vec<_> = text
        .lines()
        .filter(|line| args.matches(line))
        .map(|line| Ok(KeyValue::new(line.to_string(), file.clone())))
        .collect();
    Ok(Box::new(hits.into_iter()))
}

pub fn reduce(
    _key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let files = values
        .map(string_from_bytes)
        .collect::<Result<BTreeSet<_>>>()?;
    Ok(Bytes::from(files.into_iter().collect::<Vec<_>>().join(",")))
}
