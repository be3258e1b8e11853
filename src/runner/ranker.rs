//! Incremental top-k ranking.
//!
//! Documents are ordered by score, highest first; equal scores are ordered
//! by document ID, highest first. The ranked order is built one window at a
//! time: each call scans every known document once and selects the best
//! documents that rank strictly after the last document already ranked.
//! Serving rank `r` therefore costs `O(n log b)` per block of `b` ranks
//! instead of a full sort, and ranks that were handed out never move.

use std::cmp::Ordering;

/// Check whether document `a` ranks strictly before document `b`.
///
/// Documents are `(score, document_id)` pairs. Scores compare with
/// [`f64::total_cmp`], so the order is total even for NaN.
pub fn ranks_before(a: (f64, i64), b: (f64, i64)) -> bool {
    match a.0.total_cmp(&b.0) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => a.1 > b.1,
    }
}

/// Compute the next window of the ranked order.
///
/// `ids` and `scores` are indexed by document index. `order` is the ranked
/// prefix computed so far (document indexes, best first). Returns the
/// document indexes that extend `order` up to `target_end` ranks (capped at
/// the number of documents), best first.
pub fn next_window(ids: &[i64], scores: &[f64], order: &[usize], target_end: usize) -> Vec<usize> {
    debug_assert_eq!(ids.len(), scores.len());
    let target_end = target_end.min(ids.len());
    if target_end <= order.len() {
        return Vec::new();
    }
    let window = target_end - order.len();
    let boundary = order.last().map(|&i| (scores[i], ids[i]));

    // document indexes, best first
    let mut top: Vec<usize> = Vec::with_capacity(window + 1);
    for (index, (&document_id, &score)) in ids.iter().zip(scores).enumerate() {
        let candidate = (score, document_id);

        // already ranked, or ranks before the previous window's last entry
        if let Some(boundary) = boundary {
            if !ranks_before(boundary, candidate) {
                continue;
            }
        }

        if top.len() == window {
            let worst = top[window - 1];
            if !ranks_before(candidate, (scores[worst], ids[worst])) {
                continue;
            }
        }

        let position = insertion_point(&top, ids, scores, candidate);
        top.insert(position, index);
        if top.len() > window {
            top.pop();
        }
    }
    top
}

/// Binary search on score, then a rightward scan over equal scores to place
/// the candidate after every tie that ranks before it.
fn insertion_point(top: &[usize], ids: &[i64], scores: &[f64], candidate: (f64, i64)) -> usize {
    let (score, document_id) = candidate;
    let mut position = top.partition_point(|&i| scores[i].total_cmp(&score) == Ordering::Greater);
    while position < top.len()
        && scores[top[position]].total_cmp(&score) == Ordering::Equal
        && ids[top[position]] > document_id
    {
        position += 1;
    }
    position
}
