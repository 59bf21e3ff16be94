//! Deterministic token-count estimation for strings, structured values, and
//! collections, plus the safety-buffer budget calculations built on top of
//! it.
//!
//! Pure: no I/O, no randomness, no global state.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use serde_json::Value;

/// Default characters-per-token ratio for "normal" prose.
const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;
/// Ratio used for dense text: CJK scripts, or long strings with few spaces.
const DENSE_CHARS_PER_TOKEN: f64 = 2.0;

/// Absolute safety buffers subtracted from a budget, by mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyMode {
    #[default]
    Default,
    Conservative,
    Minimal,
}

impl SafetyMode {
    fn buffer(self) -> u64 {
        match self {
            SafetyMode::Default => 10_000,
            SafetyMode::Conservative => 5_000,
            SafetyMode::Minimal => 1_000,
        }
    }
}

/// Normalizes runs of whitespace to single spaces and trims the ends.
fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;

    for ch in s.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }

    out
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFF00..=0xFFEF
    )
}

fn chars_per_token(normalized: &str) -> f64 {
    let char_count = normalized.chars().count();

    if normalized.chars().any(is_cjk) {
        return DENSE_CHARS_PER_TOKEN;
    }

    if char_count >= 24 {
        let space_count = normalized.chars().filter(|c| *c == ' ').count();
        let space_ratio = space_count as f64 / char_count as f64;

        if space_ratio < 0.05 {
            return DENSE_CHARS_PER_TOKEN;
        }
    }

    DEFAULT_CHARS_PER_TOKEN
}

/// Estimates the token count of a single string.
pub fn estimate_string(s: &str) -> u64 {
    let normalized = normalize_whitespace(s);

    if normalized.is_empty() {
        return 0;
    }

    let cpt = chars_per_token(&normalized);
    let char_count = normalized.chars().count() as f64;
    let word_count = normalized.split(' ').filter(|w| !w.is_empty()).count() as f64;

    let by_chars = (char_count / cpt).ceil();
    let by_words = (word_count * 1.3).ceil();

    (0.6 * by_chars + 0.4 * by_words).round() as u64
}

/// Structure overhead for the brackets/commas surrounding `len` items.
///
/// Exposed so the `reduce` crate can account for the same overhead when
/// deciding whether a trimmed prefix fits a budget.
pub fn structure_overhead(len: usize) -> u64 {
    let extra = len.saturating_sub(1) as f64;
    ((2.0 + extra) / DEFAULT_CHARS_PER_TOKEN).ceil() as u64
}

/// Deterministic even-spacing sample indices over `[0, len)`, always
/// including the first and last index. Used when a collection is larger
/// than `sample_size`.
fn sample_indices(len: usize, sample_size: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    if sample_size == 0 || len <= sample_size {
        return (0..len).collect();
    }

    let bucket = len as f64 / sample_size as f64;
    let mut indices = BTreeSet::new();

    for i in 0..sample_size {
        let idx = (((i as f64) + 0.5) * bucket).floor() as usize;
        indices.insert(idx.min(len - 1));
    }

    indices.insert(0);
    indices.insert(len - 1);

    indices.into_iter().collect()
}

/// Estimates the token count of a homogeneous collection. `item_estimator` is
/// applied to each sampled element; for large collections a deterministic
/// sample is averaged and scaled back up to the full length.
pub fn estimate_collection<T>(items: &[T], item_estimator: impl Fn(&T) -> u64, sample_size: usize) -> u64 {
    let len = items.len();

    if len == 0 {
        return structure_overhead(0);
    }

    let sample_size = if sample_size == 0 { 10 } else { sample_size };

    let total = if len <= sample_size {
        items.iter().map(&item_estimator).sum::<u64>()
    } else {
        let indices = sample_indices(len, sample_size);
        let sample_sum: u64 = indices.iter().map(|&i| item_estimator(&items[i])).sum();
        let mean = sample_sum as f64 / indices.len() as f64;
        (mean * len as f64).round() as u64
    };

    total + structure_overhead(len)
}

/// Estimates the token count of an arbitrary JSON value, following a
/// primitive / mapping-or-sequence / fallback split.
pub fn estimate_object(value: &Value) -> u64 {
    match value {
        Value::Null => estimate_string("null"),
        Value::Bool(b) => estimate_string(if *b { "true" } else { "false" }),
        Value::Number(n) => estimate_string(&n.to_string()),
        Value::String(s) => estimate_string(s),
        Value::Array(items) => estimate_collection(items, estimate_object, 10),
        Value::Object(map) => {
            let entries: Vec<(&String, &Value)> = map.iter().collect();
            estimate_collection(
                &entries,
                |(k, v)| estimate_string(k) + estimate_object(v),
                10,
            )
        }
    }
}

/// Absolute-safety-mode budget: `max(0, total - used - safety(mode))`.
pub fn budget(total: u64, used: u64, mode: SafetyMode) -> u64 {
    total.saturating_sub(used).saturating_sub(mode.buffer())
}

/// Percentage-safety-mode budget: the safety buffer is `percent * total`
/// clamped to `[min_buf, max_buf]`.
pub fn budget_percent(total: u64, used: u64, percent: f64, min_buf: u64, max_buf: u64) -> u64 {
    let raw = (total as f64 * percent).round() as u64;
    let safety = raw.clamp(min_buf, max_buf);
    total.saturating_sub(used).saturating_sub(safety)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_string_empty() {
        assert_eq!(estimate_string(""), 0);
    }

    #[test]
    fn estimate_string_is_monotonic_for_ascii_repeats() {
        let a = estimate_string("hello world");
        let b = estimate_string("hello world hello world hello world");
        assert!(a <= b);
    }

    #[test]
    fn dense_text_uses_lower_chars_per_token() {
        let dense = "x".repeat(40);
        let spaced = "x ".repeat(20);
        assert!(estimate_string(&dense) >= estimate_string(&spaced));
    }

    #[test]
    fn cjk_text_uses_dense_ratio() {
        let cjk = "你好世界你好世界你好世界你好世界";
        let ascii_same_len = "a".repeat(cjk.chars().count());
        assert!(estimate_string(cjk) >= estimate_string(&ascii_same_len) / 2);
    }

    #[test]
    fn collection_small_sums_items() {
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let estimate = estimate_collection(&items, |s| estimate_string(s), 10);
        assert!(estimate > 0);
    }

    #[test]
    fn collection_large_samples_deterministically() {
        let items: Vec<String> = (0..10_000).map(|i| format!("item-{i}")).collect();
        let first = estimate_collection(&items, |s| estimate_string(s), 10);
        let second = estimate_collection(&items, |s| estimate_string(s), 10);
        assert_eq!(first, second, "sampling must be deterministic");
    }

    #[test]
    fn sample_indices_always_include_endpoints() {
        let indices = sample_indices(1000, 10);
        assert!(indices.contains(&0));
        assert!(indices.contains(&999));
        assert!(indices.len() <= 10 + 2);
    }

    #[test]
    fn budget_subtracts_default_safety() {
        assert_eq!(budget(20_000, 5_000, SafetyMode::Default), 5_000);
    }

    #[test]
    fn budget_never_goes_negative() {
        assert_eq!(budget(1_000, 5_000, SafetyMode::Default), 0);
    }

    #[test]
    fn budget_percent_clamps_to_bounds() {
        let result = budget_percent(1_000_000, 0, 0.5, 1_000, 10_000);
        assert_eq!(result, 1_000_000 - 10_000);
    }

    #[test]
    fn estimate_object_for_array_matches_collection() {
        let value: Value = serde_json::json!(["a", "b", "c"]);
        let Value::Array(items) = &value else { unreachable!() };
        assert_eq!(estimate_object(&value), estimate_collection(items, estimate_object, 10));
    }
}
