// kaon-core/src/topics.rs

//! Positional log topic filters.
//!
//! Slot `i` of a filter constrains topic `i` of a log. An empty slot matches
//! anything, one entry is an exact match, several entries are alternatives.
//! Topics past the end of the filter are unconstrained.

use crate::codec::remove_hex_prefix;

/// One positional slot: empty = wildcard, otherwise any-of
pub type TopicSlot = Vec<String>;

fn same_topic(a: &str, b: &str) -> bool {
    remove_hex_prefix(a).eq_ignore_ascii_case(remove_hex_prefix(b))
}

/// True when every constrained position of `topics` satisfies its slot.
/// Comparison ignores case and a leading `0x`.
pub fn filters_match(filters: &[TopicSlot], topics: &[String]) -> bool {
    topics
        .iter()
        .zip(filters.iter())
        .all(|(topic, slot)| slot.is_empty() || slot.iter().any(|wanted| same_topic(wanted, topic)))
}

/// Case-insensitive address membership, `0x` optional on either side.
/// An empty allow-list admits everything.
pub fn address_allowed(allowed: &[String], address: &str) -> bool {
    allowed.is_empty() || allowed.iter().any(|a| same_topic(a, address))
}
