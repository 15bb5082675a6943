//! R*-tree split heuristics and forced-reinsertion ordering.
//!
//! Pure functions over entry sets; the tree layer feeds them the
//! overflowing node's entries (including the extra one) and writes the
//! resulting groups back into nodes.

use crate::node::Entry;
use meridian_common::geom::{Rect, DIMENSIONS};

/// Splits `entries` (an overfull set of `N + 1`) into two groups by
/// the R* heuristic: the split axis minimizes the margin sum over all
/// candidate distributions, the split index minimizes overlap between
/// the two groups, with total area as the tie-break. Both groups hold
/// at least `M` entries.
pub(crate) fn split_entries<const M: usize>(entries: &[Entry]) -> (Vec<Entry>, Vec<Entry>) {
    let total = entries.len();
    debug_assert!(total >= 2 * M);

    let mut best_axis = 0;
    let mut best_axis_margin = f64::INFINITY;

    for axis in 0..DIMENSIONS {
        let mut margin_sum = 0.0;
        for by_upper in [false, true] {
            let order = sorted_by_axis(entries, axis, by_upper);
            let (prefix, suffix) = group_boxes(entries, &order);
            for split in M..=(total - M) {
                margin_sum += prefix[split - 1].margin() + suffix[split].margin();
            }
        }
        if margin_sum < best_axis_margin {
            best_axis_margin = margin_sum;
            best_axis = axis;
        }
    }

    // Along the chosen axis, pick the distribution with the least
    // overlap between the groups; break ties on total area.
    let mut best: Option<(f64, f64, Vec<usize>, usize)> = None;
    for by_upper in [false, true] {
        let order = sorted_by_axis(entries, best_axis, by_upper);
        let (prefix, suffix) = group_boxes(entries, &order);
        for split in M..=(total - M) {
            let overlap = prefix[split - 1].overlap_area(&suffix[split]);
            let area = prefix[split - 1].area() + suffix[split].area();
            let better = match &best {
                None => true,
                Some((best_overlap, best_area, _, _)) => {
                    overlap < *best_overlap || (overlap == *best_overlap && area < *best_area)
                }
            };
            if better {
                best = Some((overlap, area, order.clone(), split));
            }
        }
    }

    let (_, _, order, split) = best.expect("split candidates exist");
    let first = order[..split].iter().map(|&i| entries[i]).collect();
    let second = order[split..].iter().map(|&i| entries[i]).collect();
    (first, second)
}

/// Orders an overfull entry set for forced reinsertion: the `count`
/// entries whose centres sit furthest from the centre of the set's
/// bounding box are handed back for reinsertion, the rest stay.
pub(crate) fn reinsert_split(entries: &[Entry], count: usize) -> (Vec<Entry>, Vec<Entry>) {
    debug_assert!(count > 0 && count < entries.len());

    let mut bbox = Rect::EMPTY;
    for e in entries {
        bbox.expand(&e.rect());
    }
    let center = bbox.center();

    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| {
        let da = entries[a].rect().center().distance(&center);
        let db = entries[b].rect().center().distance(&center);
        da.partial_cmp(&db).expect("finite distances")
    });

    let keep_count = entries.len() - count;
    let keep = order[..keep_count].iter().map(|&i| entries[i]).collect();
    let reinsert = order[keep_count..].iter().map(|&i| entries[i]).collect();
    (keep, reinsert)
}

/// Entry indices sorted along `axis`, by rectangle lower edge or
/// upper edge.
fn sorted_by_axis(entries: &[Entry], axis: usize, by_upper: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (entries[a].rect(), entries[b].rect());
        let (ka, kb) = if by_upper {
            (ra.upper[axis], rb.upper[axis])
        } else {
            (ra.lower[axis], rb.lower[axis])
        };
        ka.partial_cmp(&kb).expect("finite coordinates")
    });
    order
}

/// Bounding boxes of every prefix and suffix of the ordered entries:
/// `prefix[i]` covers `order[..=i]`, `suffix[i]` covers `order[i..]`.
fn group_boxes(entries: &[Entry], order: &[usize]) -> (Vec<Rect>, Vec<Rect>) {
    let total = order.len();

    let mut prefix = Vec::with_capacity(total);
    let mut bbox = Rect::EMPTY;
    for &i in order {
        bbox.expand(&entries[i].rect());
        prefix.push(bbox);
    }

    let mut suffix = vec![Rect::EMPTY; total + 1];
    for pos in (0..total).rev() {
        let mut bbox = suffix[pos + 1];
        bbox.expand(&entries[order[pos]].rect());
        suffix[pos] = bbox;
    }

    (prefix, suffix)
}
