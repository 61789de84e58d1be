//! Lossy downsampling for chart series.

/// Downsample `series` to at most `limit` elements.
///
/// The input is split into `limit` contiguous buckets with fractional
/// boundaries, and the element with the largest `key` is taken from each
/// non-empty bucket (the first one on ties). Output keeps input order. A
/// series no longer than `limit` is returned unchanged.
///
/// Only meant for visualization: it drops data.
pub fn sample<T, K, F>(series: &[T], limit: usize, key: F) -> Vec<T>
where
    T: Clone,
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    if series.len() <= limit {
        return series.to_vec();
    }
    if limit == 0 {
        return Vec::new();
    }

    let len = series.len();
    (0..limit)
        .filter_map(|i| {
            let bucket = &series[i * len / limit..(i + 1) * len / limit];
            max_by_key(bucket, &key).cloned()
        })
        .collect()
}

fn max_by_key<'a, T, K: PartialOrd>(items: &'a [T], key: &impl Fn(&T) -> K) -> Option<&'a T> {
    let mut iter = items.iter();
    let mut best = iter.next()?;
    let mut best_key = key(best);
    for item in iter {
        let k = key(item);
        if k > best_key {
            best = item;
            best_key = k;
        }
    }
    Some(best)
}
