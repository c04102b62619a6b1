//! Page budget allocation across chapters.
//!
//! Each chapter gets `round(cap × len / total)` pages, floored at the
//! per-chapter minimum. If the floors push the sum over the cap, the
//! currently largest share (first one on ties) is decremented one page at a
//! time until the sum fits. When every share already sits at the minimum the
//! loop stops and the overrun is accepted.

use crate::model::ChapterText;
use tracing::{debug, warn};

/// Allocate `max_pages` across chapters proportionally to `lengths`.
///
/// The returned vector is index-aligned with `lengths`.
pub fn allocate_pages(lengths: &[usize], max_pages: usize, min_pages: usize) -> Vec<usize> {
    let total: usize = lengths.iter().sum();

    let mut shares: Vec<usize> = lengths
        .iter()
        .map(|&len| {
            let proportional = if total == 0 {
                0
            } else {
                (max_pages as f64 * len as f64 / total as f64).round() as usize
            };
            proportional.max(min_pages)
        })
        .collect();

    let mut sum: usize = shares.iter().sum();
    while sum > max_pages {
        let Some((idx, &largest)) = shares
            .iter()
            .enumerate()
            // `max_by_key` keeps the last maximum; reverse to keep the first.
            .rev()
            .max_by_key(|(_, &s)| s)
        else {
            break;
        };
        if largest <= min_pages {
            warn!(
                "Page budget {} exceeds cap {}: {} chapters at the {}-page minimum",
                sum,
                max_pages,
                shares.len(),
                min_pages
            );
            break;
        }
        shares[idx] -= 1;
        sum -= 1;
    }

    debug!("Page budget: {:?} (sum {}, cap {})", shares, sum, max_pages);
    shares
}

/// Allocate pages for resolved chapters using their character lengths.
pub fn allocate_for_chapters(
    chapters: &[ChapterText],
    max_pages: usize,
    min_pages: usize,
) -> Vec<usize> {
    let lengths: Vec<usize> = chapters.iter().map(ChapterText::char_len).collect();
    allocate_pages(&lengths, max_pages, min_pages)
}
