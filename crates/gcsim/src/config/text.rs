//! Line-oriented configuration grammar
//!
//! ```text
//! ; global settings come before the first tag
//! threadCount 4
//! printEveryNthIter 100000
//!
//! [phase]
//! testKind time
//! allocType simple
//! totalLiveGB 0.5
//! totalAllocGB 4
//! totalMinutes 0
//!
//! [bucket]
//! sizeRange 100-4000
//! survInterval 30
//! weight 1
//! ```
//!
//! One `key value` pair per line (`key = value` is accepted too). Lines
//! starting with `;` or `#` are comments; blank lines are ignored. A
//! `[bucket]` belongs to the most recent `[phase]`. Each key may be set once
//! per section; `totalLiveGB` and `totalLiveBytes` set the same field, as do
//! `sizeRange` and `lowSize`/`highSize`.

use std::collections::HashSet;

use crate::bucket::{BucketSpec, SizeRange};
use crate::config::{AllocType, Args, Phase, TestKind, GB};
use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Global,
    Phase,
    Bucket,
}

/// Phase fields as they are read, before required ones are checked
#[derive(Debug, Default)]
struct PhaseDraft {
    line: usize,
    test_kind: Option<TestKind>,
    alloc_type: Option<AllocType>,
    total_live_bytes: Option<u64>,
    total_alloc_bytes: Option<u64>,
    total_minutes: Option<f64>,
    buckets: Vec<BucketDraft>,
}

#[derive(Debug, Default)]
struct BucketDraft {
    line: usize,
    low: Option<u64>,
    high: Option<u64>,
    surv_interval: u64,
    pin_interval: u64,
    finalizable_interval: u64,
    weight: Option<u64>,
}

/// Parse configuration text into `Args`
///
/// Structural errors (unknown or repeated keys, bad numbers, missing sizes or
/// totals, a bucket outside a phase) are reported with their 1-based line
/// number. Semantic rules are left to [`Args::validate`].
pub fn parse(content: &str) -> Result<Args> {
    let mut args = Args::default();
    let mut phases: Vec<PhaseDraft> = Vec::new();
    let mut section = Section::Global;
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(tag) = line.strip_prefix('[') {
            let tag = tag
                .strip_suffix(']')
                .ok_or_else(|| SimError::parse(line_no, format!("unterminated tag '{}'", line)))?
                .trim();
            seen.clear();
            section = match tag {
                "phase" => {
                    phases.push(PhaseDraft {
                        line: line_no,
                        ..PhaseDraft::default()
                    });
                    Section::Phase
                },
                "bucket" => {
                    let phase = phases.last_mut().ok_or_else(|| {
                        SimError::parse(line_no, "[bucket] must follow a [phase]")
                    })?;
                    phase.buckets.push(BucketDraft {
                        line: line_no,
                        ..BucketDraft::default()
                    });
                    Section::Bucket
                },
                other => {
                    return Err(SimError::parse(line_no, format!("unknown tag '[{}]'", other)))
                },
            };
            continue;
        }

        let (key, value) = split_key_value(line)
            .ok_or_else(|| SimError::parse(line_no, format!("expected 'key value', got '{}'", line)))?;
        for name in canonical_keys(key) {
            if !seen.insert(name) {
                return Err(SimError::parse(
                    line_no,
                    format!("'{}' is already set in this section", name),
                ));
            }
        }

        match section {
            Section::Global => apply_global(&mut args, key, value, line_no)?,
            Section::Phase => {
                // A phase section always has a draft; it was pushed with the tag.
                if let Some(phase) = phases.last_mut() {
                    apply_phase(phase, key, value, line_no)?;
                }
            },
            Section::Bucket => {
                if let Some(bucket) = phases.last_mut().and_then(|p| p.buckets.last_mut()) {
                    apply_bucket(bucket, key, value, line_no)?;
                }
            },
        }
    }

    args.phases = phases
        .into_iter()
        .map(finish_phase)
        .collect::<Result<Vec<_>>>()?;
    Ok(args)
}

/// Keys a line sets; aliases of one field map to the same name
fn canonical_keys(key: &str) -> Vec<&str> {
    match key {
        "totalLiveGB" => vec!["totalLiveBytes"],
        "totalAllocGB" => vec!["totalAllocBytes"],
        "totalMins" => vec!["totalMinutes"],
        "sizeRange" => vec!["lowSize", "highSize"],
        other => vec![other],
    }
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = match line.find(|c: char| c.is_whitespace() || c == '=') {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => return None,
    };
    let value = rest.trim_start().trim_start_matches('=').trim();
    if key.is_empty() || value.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str, line: usize) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| SimError::parse(line, format!("invalid value '{}' for {}: {}", value, key, e)))
}

fn parse_bool(key: &str, value: &str, line: usize) -> Result<bool> {
    match value {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(SimError::parse(
            line,
            format!("invalid boolean '{}' for {}", value, key),
        )),
    }
}

fn gb_to_bytes(key: &str, value: &str, line: usize) -> Result<u64> {
    let gb: f64 = parse_num(key, value, line)?;
    if !gb.is_finite() || gb < 0.0 {
        return Err(SimError::parse(line, format!("{} must be non-negative", key)));
    }
    Ok((gb * GB) as u64)
}

fn apply_global(args: &mut Args, key: &str, value: &str, line: usize) -> Result<()> {
    match key {
        "threadCount" => args.thread_count = parse_num(key, value, line)?,
        "verifyLiveSize" => args.verify_live_size = parse_bool(key, value, line)?,
        "printEveryNthIter" => args.print_every_nth_iter = parse_num(key, value, line)?,
        "handleTest" => args.handle_test = parse_bool(key, value, line)?,
        _ => return Err(SimError::parse(line, format!("unknown global key '{}'", key))),
    }
    Ok(())
}

fn apply_phase(phase: &mut PhaseDraft, key: &str, value: &str, line: usize) -> Result<()> {
    match key {
        "testKind" => {
            phase.test_kind = Some(value.parse().map_err(|e: String| SimError::parse(line, e))?)
        },
        "allocType" => {
            phase.alloc_type = Some(value.parse().map_err(|e: String| SimError::parse(line, e))?)
        },
        "totalLiveBytes" => phase.total_live_bytes = Some(parse_num(key, value, line)?),
        "totalLiveGB" => phase.total_live_bytes = Some(gb_to_bytes(key, value, line)?),
        "totalAllocBytes" => phase.total_alloc_bytes = Some(parse_num(key, value, line)?),
        "totalAllocGB" => phase.total_alloc_bytes = Some(gb_to_bytes(key, value, line)?),
        "totalMinutes" | "totalMins" => phase.total_minutes = Some(parse_num(key, value, line)?),
        _ => return Err(SimError::parse(line, format!("unknown phase key '{}'", key))),
    }
    Ok(())
}

fn apply_bucket(bucket: &mut BucketDraft, key: &str, value: &str, line: usize) -> Result<()> {
    match key {
        "lowSize" => bucket.low = Some(parse_num(key, value, line)?),
        "highSize" => bucket.high = Some(parse_num(key, value, line)?),
        "sizeRange" => {
            let range: SizeRange = value.parse().map_err(|e: String| SimError::parse(line, e))?;
            bucket.low = Some(range.low);
            bucket.high = Some(range.high);
        },
        "survInterval" => bucket.surv_interval = parse_num(key, value, line)?,
        "pinInterval" => bucket.pin_interval = parse_num(key, value, line)?,
        "finalizableInterval" => bucket.finalizable_interval = parse_num(key, value, line)?,
        "weight" => bucket.weight = Some(parse_num(key, value, line)?),
        _ => return Err(SimError::parse(line, format!("unknown bucket key '{}'", key))),
    }
    Ok(())
}

fn finish_phase(draft: PhaseDraft) -> Result<Phase> {
    let total_alloc_bytes = draft
        .total_alloc_bytes
        .ok_or_else(|| SimError::parse(draft.line, "[phase] is missing totalAllocBytes"))?;
    let total_live_bytes = draft
        .total_live_bytes
        .ok_or_else(|| SimError::parse(draft.line, "[phase] is missing totalLiveBytes"))?;
    let buckets = draft
        .buckets
        .into_iter()
        .map(finish_bucket)
        .collect::<Result<Vec<_>>>()?;

    Ok(Phase {
        test_kind: draft.test_kind.unwrap_or(TestKind::Time),
        alloc_type: draft.alloc_type.unwrap_or(AllocType::Simple),
        total_live_bytes,
        total_alloc_bytes,
        total_minutes: draft.total_minutes.unwrap_or(0.0),
        buckets,
    })
}

fn finish_bucket(draft: BucketDraft) -> Result<BucketSpec> {
    let (low, high) = match (draft.low, draft.high) {
        (Some(low), Some(high)) => (low, high),
        _ => {
            return Err(SimError::parse(
                draft.line,
                "[bucket] needs lowSize and highSize (or sizeRange)",
            ))
        },
    };
    Ok(BucketSpec {
        size_range: SizeRange::new(low, high),
        surv_interval: draft.surv_interval,
        pin_interval: draft.pin_interval,
        finalizable_interval: draft.finalizable_interval,
        weight: draft.weight.unwrap_or(1),
    })
}
