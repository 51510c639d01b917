//! Merge of metadata and rule entities
//!
//! Accepted entities live in an interval index keyed by start offset. Because
//! accepted intervals never overlap, their end offsets are ordered the same way
//! as their starts, so the entities overlapping `[start, end)` are exactly the
//! ones found by walking `range(..end)` backwards while `end_offset > start`.

use std::collections::BTreeMap;

use crate::entity::EntityTag;
use crate::error::{NlSqlError, Result};

#[derive(Default)]
struct IntervalIndex {
    by_start: BTreeMap<usize, EntityTag>,
}

impl IntervalIndex {
    fn overlapping(&self, start: usize, end: usize) -> Vec<usize> {
        self.by_start
            .range(..end)
            .rev()
            .take_while(|(_, tag)| tag.end_offset > start)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Insert when free; otherwise replace the overlapped entities only if the
    /// candidate beats every one of them strictly.
    fn offer(&mut self, tag: EntityTag) -> bool {
        let hits = self.overlapping(tag.start_offset, tag.end_offset);
        let wins = hits
            .iter()
            .all(|key| self.by_start.get(key).map(|held| tag.confidence > held.confidence).unwrap_or(true));
        if !wins {
            return false;
        }
        for key in hits {
            self.by_start.remove(&key);
        }
        self.by_start.insert(tag.start_offset, tag);
        true
    }
}

fn check(tag: &EntityTag) -> Result<()> {
    if tag.start_offset >= tag.end_offset {
        return Err(NlSqlError::Invariant(format!(
            "entity '{}' has empty or inverted span {}..{}",
            tag.text, tag.start_offset, tag.end_offset
        )));
    }
    Ok(())
}

/// Offer order: earlier start first, longer span first on equal starts
fn offer_order(mut tags: Vec<EntityTag>) -> Vec<EntityTag> {
    tags.sort_by(|a, b| a.start_offset.cmp(&b.start_offset).then(b.end_offset.cmp(&a.end_offset)));
    tags
}

/// Merge metadata entities with rule entities into a non-overlapping list
/// ordered by start offset. Metadata entities are placed first; a rule entity
/// only displaces what it overlaps when its confidence is strictly greater,
/// so ties keep the metadata entity.
pub fn merge(metadata: Vec<EntityTag>, rules: Vec<EntityTag>) -> Result<Vec<EntityTag>> {
    for tag in metadata.iter().chain(rules.iter()) {
        check(tag)?;
    }

    let mut index = IntervalIndex::default();
    for tag in offer_order(metadata) {
        index.offer(tag);
    }
    for tag in offer_order(rules) {
        index.offer(tag);
    }

    Ok(index.by_start.into_values().collect())
}
