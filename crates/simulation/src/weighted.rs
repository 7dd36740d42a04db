//! Weighted random choice.
//!
//! The draw `r` is uniform in `[0, total)`. The walk subtracts each weight from
//! `r` and stops at the first item that brings it to `<= 0`, so with a seeded
//! RNG the selected item is a pure function of `r` and the item order.

use rand::Rng;

/// Sum of the positive weights.
pub fn total_weight<T>(items: &[T], weight: impl Fn(&T) -> f64) -> f64 {
    items.iter().map(&weight).filter(|w| *w > 0.0).sum()
}

/// Walk `items` subtracting weights from `r`.
///
/// Items with a non-positive weight are never chosen. Floating point residue at
/// the top of the range falls back to the last eligible item. `None` when no
/// item has a positive weight.
pub fn select_weighted<T>(items: &[T], weight: impl Fn(&T) -> f64, r: f64) -> Option<&T> {
    let mut remaining = r;
    let mut last = None;
    for item in items {
        let w = weight(item);
        if w <= 0.0 {
            continue;
        }
        remaining -= w;
        if remaining <= 0.0 {
            return Some(item);
        }
        last = Some(item);
    }
    last
}

/// Draw `r` from `rng` and select.
pub fn choose_weighted<'a, T, R: Rng + ?Sized>(
    items: &'a [T],
    weight: impl Fn(&T) -> f64,
    rng: &mut R,
) -> Option<&'a T> {
    let total = total_weight(items, &weight);
    if total <= 0.0 {
        return None;
    }
    let r = rng.gen_range(0.0..total);
    select_weighted(items, weight, r)
}
