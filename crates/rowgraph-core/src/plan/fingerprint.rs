//! Deterministic plan fingerprinting derived from the explain projection.
#![expect(clippy::cast_possible_truncation)]

use crate::{
    model::FetchTiming,
    plan::{
        QueryPlan,
        explain::{ExplainFetch, ExplainFetchKind, ExplainPlan, ExplainResult, ExplainStyle},
    },
};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};

///
/// PlanFingerprint
///
/// Stable, deterministic fingerprint for query plans.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PlanFingerprint([u8; 32]);

impl PlanFingerprint {
    pub(crate) const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Display for PlanFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl QueryPlan {
    // Hashes the explain projection plus the full selection layout, so two
    // plans with the same tree but different column positions differ.
    pub(super) fn compute_fingerprint(&self) -> PlanFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(b"planfp:v1");
        hash_explain_plan(&mut hasher, &self.explain());

        write_tag(&mut hasher, 0x05);
        write_u32(&mut hasher, self.selections().width() as u32);
        for selection in self.selections().iter() {
            write_str(&mut hasher, &selection.alias);
            write_str(&mut hasher, &selection.column);
        }

        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        PlanFingerprint(out)
    }
}

fn hash_explain_plan(hasher: &mut Sha256, plan: &ExplainPlan) {
    write_tag(hasher, 0x01);
    write_str(hasher, &plan.root);

    write_tag(hasher, 0x02);
    write_u32(hasher, plan.width as u32);

    write_tag(hasher, 0x03);
    write_u32(hasher, plan.results.len() as u32);
    for result in &plan.results {
        hash_result(hasher, result);
    }
}

fn hash_result(hasher: &mut Sha256, result: &ExplainResult) {
    match result {
        ExplainResult::Entity {
            path,
            alias,
            fetches,
        } => {
            write_tag(hasher, 0x10);
            write_str(hasher, path);
            write_str(hasher, alias);
            hash_fetches(hasher, fetches);
        }
        ExplainResult::Basic { path, position } => {
            write_tag(hasher, 0x11);
            write_str(hasher, path);
            write_u32(hasher, *position as u32);
        }
    }
}

fn hash_fetches(hasher: &mut Sha256, fetches: &[ExplainFetch]) {
    write_u32(hasher, fetches.len() as u32);
    for fetch in fetches {
        hash_fetch(hasher, fetch);
    }
}

fn hash_fetch(hasher: &mut Sha256, fetch: &ExplainFetch) {
    write_tag(hasher, 0x20);
    write_str(hasher, &fetch.path);
    write_tag(hasher, kind_tag(fetch.kind));
    write_tag(hasher, timing_tag(fetch.timing));
    write_tag(hasher, style_tag(fetch.style));
    write_opt_str(hasher, fetch.alias.as_deref());
    write_opt_str(hasher, fetch.referenced_path.as_deref());
    hash_fetches(hasher, &fetch.fetches);
}

const fn kind_tag(kind: ExplainFetchKind) -> u8 {
    match kind {
        ExplainFetchKind::Basic => 0x01,
        ExplainFetchKind::Embeddable => 0x02,
        ExplainFetchKind::Entity => 0x03,
        ExplainFetchKind::Collection => 0x04,
        ExplainFetchKind::Any => 0x05,
        ExplainFetchKind::Circular => 0x06,
    }
}

const fn timing_tag(timing: FetchTiming) -> u8 {
    match timing {
        FetchTiming::Immediate => 0x01,
        FetchTiming::Delayed => 0x02,
    }
}

const fn style_tag(style: ExplainStyle) -> u8 {
    match style {
        ExplainStyle::Column => 0x01,
        ExplainStyle::Unfetched => 0x02,
        ExplainStyle::Join => 0x03,
        ExplainStyle::Select => 0x04,
        ExplainStyle::Batch => 0x05,
        ExplainStyle::Delayed => 0x06,
        ExplainStyle::Alias => 0x07,
    }
}

fn write_opt_str(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(value) => {
            write_tag(hasher, 0x01);
            write_str(hasher, value);
        }
        None => write_tag(hasher, 0x00),
    }
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}

fn write_u32(hasher: &mut Sha256, value: u32) {
    hasher.update(value.to_be_bytes());
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}
