//! Progressive trimming of lists to a token budget, with priority and score
//! hooks for ordering before trimming.

#![forbid(unsafe_code)]

const PERCENTAGES: &[u32] = &[100, 75, 50, 30, 20, 10, 5];

/// Selects how items are ordered before the keep-prefix trim is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Keep-prefix trimming in original order.
    #[default]
    Standard,
    /// Sort descending by `ReduceContext::priority_fn`, then keep-prefix trim.
    Priority,
    /// Sort descending by `ReduceContext::score_fn`, tie-broken by original
    /// index, then keep-prefix trim.
    Score,
}

/// Hooks used by the `priority` and `score` strategies.
#[derive(Default)]
pub struct ReduceContext<'a, T> {
    pub priority_fn: Option<&'a dyn Fn(&T) -> i64>,
    pub score_fn: Option<&'a dyn Fn(&T) -> f64>,
}

/// One percentage attempted during a `standard` reduction.
#[derive(Debug, Clone, Copy)]
pub struct ReduceStep {
    pub percent: u32,
    pub kept: usize,
    pub estimated: u64,
}

/// Outcome of a `reduce` call.
pub struct ReduceOutcome<T> {
    pub items: Vec<T>,
    pub steps: Vec<ReduceStep>,
    pub truncated: bool,
}

/// Reduces `items` to fit within `budget` tokens.
///
/// `item_estimator` estimates a single item's token cost; the collection's
/// structure overhead (brackets/commas) is added on top via
/// `tokenizer::structure_overhead`, so callers never need to double-count it.
pub fn reduce<T: Clone>(
    items: &[T],
    item_estimator: &dyn Fn(&T) -> u64,
    budget: u64,
    strategy: Strategy,
    ctx: Option<&ReduceContext<'_, T>>,
) -> ReduceOutcome<T> {
    if items.is_empty() {
        return ReduceOutcome { items: Vec::new(), steps: Vec::new(), truncated: false };
    }

    let ordered: Vec<T> = match strategy {
        Strategy::Standard => items.to_vec(),
        Strategy::Priority => {
            let priority_fn = ctx.and_then(|c| c.priority_fn);
            let mut indexed: Vec<(usize, &T)> = items.iter().enumerate().collect();
            indexed.sort_by(|(ia, a), (ib, b)| {
                let pa = priority_fn.map(|f| f(a)).unwrap_or(0);
                let pb = priority_fn.map(|f| f(b)).unwrap_or(0);
                pb.cmp(&pa).then(ia.cmp(ib))
            });
            indexed.into_iter().map(|(_, item)| item.clone()).collect()
        }
        Strategy::Score => {
            let score_fn = ctx.and_then(|c| c.score_fn);
            let mut indexed: Vec<(usize, &T)> = items.iter().enumerate().collect();
            indexed.sort_by(|(ia, a), (ib, b)| {
                let sa = score_fn.map(|f| f(a)).unwrap_or(0.0);
                let sb = score_fn.map(|f| f(b)).unwrap_or(0.0);
                sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal).then(ia.cmp(ib))
            });
            indexed.into_iter().map(|(_, item)| item.clone()).collect()
        }
    };

    standard_trim(&ordered, item_estimator, budget)
}

fn standard_trim<T: Clone>(ordered: &[T], item_estimator: &dyn Fn(&T) -> u64, budget: u64) -> ReduceOutcome<T> {
    let len = ordered.len();
    let mut steps = Vec::with_capacity(PERCENTAGES.len());
    let mut best: Option<(usize, u64)> = None;

    for &percent in PERCENTAGES {
        let keep = ((len as u64 * percent as u64).div_ceil(100)).max(1) as usize;
        let keep = keep.min(len);

        let estimated: u64 = ordered[..keep].iter().map(item_estimator).sum::<u64>()
            + tokenizer::structure_overhead(keep);

        steps.push(ReduceStep { percent, kept: keep, estimated });

        if estimated <= budget {
            best = Some((keep, estimated));
            break;
        }
    }

    let (keep, truncated) = match best {
        Some((keep, _)) => (keep, keep < len),
        // Nothing fit, even at 5%: keep exactly one element and mark truncated.
        None => (1, true),
    };

    ReduceOutcome { items: ordered[..keep].to_vec(), steps, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate_usize(n: &u64) -> u64 {
        *n
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let outcome = reduce::<u64>(&[], &estimate_usize, 1000, Strategy::Standard, None);
        assert!(outcome.items.is_empty());
        assert!(!outcome.truncated);
    }

    #[test]
    fn keeps_full_prefix_when_it_fits() {
        let items: Vec<u64> = vec![1, 1, 1, 1];
        let outcome = reduce(&items, &estimate_usize, 1000, Strategy::Standard, None);
        assert_eq!(outcome.items, items);
        assert!(!outcome.truncated);
    }

    #[test]
    fn trims_to_largest_fitting_prefix() {
        let items: Vec<u64> = vec![10; 20];
        let outcome = reduce(&items, &estimate_usize, 55, Strategy::Standard, None);
        assert!(outcome.items.len() < 20);
        assert!(!outcome.items.is_empty());
        assert!(outcome.truncated);
    }

    #[test]
    fn keeps_at_least_one_element_when_nothing_fits() {
        let items: Vec<u64> = vec![10_000; 5];
        let outcome = reduce(&items, &estimate_usize, 1, Strategy::Standard, None);
        assert_eq!(outcome.items.len(), 1);
        assert!(outcome.truncated);
    }

    #[test]
    fn priority_sorts_descending_before_trimming() {
        let items = vec!["low", "high", "mid"];
        let priorities: std::collections::HashMap<&str, i64> =
            [("low", 1), ("mid", 5), ("high", 10)].into_iter().collect();
        let priority_fn = move |s: &&str| *priorities.get(*s).unwrap_or(&0);
        let ctx = ReduceContext { priority_fn: Some(&priority_fn), score_fn: None };

        let outcome = reduce(&items, &|s: &&str| s.len() as u64, 1000, Strategy::Priority, Some(&ctx));
        assert_eq!(outcome.items, vec!["high", "mid", "low"]);
    }

    #[test]
    fn score_ties_break_on_original_index() {
        let items = vec!["a", "b", "c"];
        let score_fn = |_: &&str| 1.0;
        let ctx = ReduceContext { priority_fn: None, score_fn: Some(&score_fn) };

        let outcome = reduce(&items, &|s: &&str| s.len() as u64, 1000, Strategy::Score, Some(&ctx));
        assert_eq!(outcome.items, vec!["a", "b", "c"]);
    }

    #[test]
    fn reduction_is_monotonic_in_input_size_at_fixed_budget() {
        let small: Vec<u64> = vec![1; 3];
        let large: Vec<u64> = vec![1; 30];

        let small_out = reduce(&small, &estimate_usize, 100, Strategy::Standard, None);
        let large_out = reduce(&large, &estimate_usize, 100, Strategy::Standard, None);

        assert!(large_out.items.len() >= small_out.items.len());
    }
}
