//! Cache query planning
//!
//! Pure interval math over cached coverage: given a requested date range
//! and the set of ranges already cached for a provider, decide whether the
//! request is a full hit, a partial hit, or a miss, and compute the minimal
//! missing sub-ranges. Nothing in this module performs I/O, which keeps the
//! planning logic unit-testable without a database.

use chrono::NaiveDate;

use crate::models::{CacheVerdict, DateRange, QueryPlan};

/// Merge a set of ranges into the minimal sorted, disjoint equivalent
///
/// Overlapping and day-adjacent ranges collapse into one, so the result
/// represents coverage as a union regardless of how segments were recorded.
pub fn merge_ranges(mut ranges: Vec<DateRange>) -> Vec<DateRange> {
    if ranges.len() <= 1 {
        return ranges;
    }

    ranges.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<DateRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.touches(&range) => {
                *last = last.union_span(&range);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Intersect a single range against merged coverage
///
/// Returns the covered parts of `range`, sorted and disjoint. `coverage`
/// must already be sorted and disjoint (as produced by [`merge_ranges`]).
pub fn intersect(range: DateRange, coverage: &[DateRange]) -> Vec<DateRange> {
    coverage
        .iter()
        .filter_map(|c| range.intersection(c))
        .collect()
}

/// Subtract merged coverage from a single range
///
/// Returns the uncovered parts of `range`, sorted and disjoint. A request
/// spanning cached-gap-cached coverage yields more than one missing range.
pub fn subtract(range: DateRange, coverage: &[DateRange]) -> Vec<DateRange> {
    let mut missing = Vec::new();
    let mut cursor = range.start;

    for covered in coverage {
        if covered.end < cursor {
            continue;
        }
        if covered.start > range.end {
            break;
        }
        if covered.start > cursor {
            // Gap before this covered block
            let gap_end = covered.start.pred_opt().unwrap_or(covered.start);
            missing.push(DateRange {
                start: cursor,
                end: gap_end.min(range.end),
            });
        }
        match covered.end.succ_opt() {
            Some(next) if next > cursor => cursor = next,
            _ => return missing,
        }
        if cursor > range.end {
            return missing;
        }
    }

    if cursor <= range.end {
        missing.push(DateRange {
            start: cursor,
            end: range.end,
        });
    }
    missing
}

/// Plan a query for `requested` against the cached `coverage` set
///
/// `coverage` may be unsorted or overlapping; it is merged first so the
/// verdict reflects the union of all recorded segments.
pub fn plan(requested: DateRange, coverage: &[DateRange]) -> QueryPlan {
    let merged = merge_ranges(coverage.to_vec());

    let cached_ranges = intersect(requested, &merged);
    let missing_ranges = subtract(requested, &merged);

    let status = if missing_ranges.is_empty() {
        CacheVerdict::FullHit
    } else if cached_ranges.is_empty() {
        CacheVerdict::Miss
    } else {
        CacheVerdict::PartialHit
    };

    QueryPlan {
        status,
        cached_ranges,
        missing_ranges,
    }
}

/// The full calendar-month range containing `(year, month)`
///
/// Returns `None` for an out-of-domain month number.
pub fn month_range(year: i32, month: u32) -> Option<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let end = next_month.pred_opt()?;
    Some(DateRange { start, end })
}

/// All `(year, month)` keys intersecting `range`, in chronological order
pub fn months_in(range: DateRange) -> Vec<(i32, u32)> {
    use chrono::Datelike;

    let mut months = Vec::new();
    let (mut year, mut month) = (range.start.year(), range.start.month());
    let (end_year, end_month) = (range.end.year(), range.end.month());

    loop {
        months.push((year, month));
        if (year, month) == (end_year, end_month) {
            break;
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

/// True when `coverage` (merged) fully spans the given calendar month
pub fn month_fully_covered(coverage: &[DateRange], year: i32, month: u32) -> bool {
    match month_range(year, month) {
        Some(range) => subtract(range, coverage).is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn r(y: i32, m: u32, day: u32, y2: i32, m2: u32, day2: u32) -> DateRange {
        DateRange::new(d(y, m, day), d(y2, m2, day2)).unwrap()
    }

    #[test]
    fn test_merge_overlapping_and_adjacent() {
        let merged = merge_ranges(vec![
            r(2025, 1, 5, 2025, 1, 10),
            r(2025, 1, 1, 2025, 1, 6),
            r(2025, 1, 11, 2025, 1, 15), // adjacent to Jan 10
            r(2025, 2, 1, 2025, 2, 3),
        ]);
        assert_eq!(
            merged,
            vec![r(2025, 1, 1, 2025, 1, 15), r(2025, 2, 1, 2025, 2, 3)]
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let ranges = vec![r(2025, 3, 1, 2025, 3, 10), r(2025, 3, 1, 2025, 3, 10)];
        let merged = merge_ranges(ranges);
        assert_eq!(merged, vec![r(2025, 3, 1, 2025, 3, 10)]);
        assert_eq!(merge_ranges(merged.clone()), merged);
    }

    #[test]
    fn test_gap_between_segments_yields_partial_hit() {
        // Segments Jan 1-10 and Jan 20-31; query the whole of January.
        let coverage = vec![r(2025, 1, 1, 2025, 1, 10), r(2025, 1, 20, 2025, 1, 31)];
        let plan = plan(r(2025, 1, 1, 2025, 1, 31), &coverage);

        assert_eq!(plan.status, CacheVerdict::PartialHit);
        assert_eq!(plan.missing_ranges, vec![r(2025, 1, 11, 2025, 1, 19)]);
        assert_eq!(
            plan.cached_ranges,
            vec![r(2025, 1, 1, 2025, 1, 10), r(2025, 1, 20, 2025, 1, 31)]
        );
    }

    #[test]
    fn test_empty_coverage_is_a_miss() {
        let plan = plan(r(2025, 3, 1, 2025, 3, 5), &[]);
        assert_eq!(plan.status, CacheVerdict::Miss);
        assert!(plan.cached_ranges.is_empty());
        assert_eq!(plan.missing_ranges, vec![r(2025, 3, 1, 2025, 3, 5)]);
    }

    #[test]
    fn test_full_hit() {
        let coverage = vec![r(2025, 1, 1, 2025, 6, 30)];
        let plan = plan(r(2025, 2, 10, 2025, 2, 20), &coverage);
        assert_eq!(plan.status, CacheVerdict::FullHit);
        assert!(plan.missing_ranges.is_empty());
        assert_eq!(plan.cached_ranges, vec![r(2025, 2, 10, 2025, 2, 20)]);
    }

    #[test]
    fn test_single_day_query() {
        let coverage = vec![r(2025, 1, 1, 2025, 1, 10)];

        let hit = plan(DateRange::single(d(2025, 1, 5)), &coverage);
        assert_eq!(hit.status, CacheVerdict::FullHit);

        let miss = plan(DateRange::single(d(2025, 1, 11)), &coverage);
        assert_eq!(miss.status, CacheVerdict::Miss);
        assert_eq!(miss.missing_ranges, vec![DateRange::single(d(2025, 1, 11))]);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = DateRange::new(d(2025, 1, 10), d(2025, 1, 1)).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_subtract_partial_overlap_at_edges() {
        // Coverage clips the middle; both edges are missing.
        let coverage = vec![r(2025, 1, 10, 2025, 1, 20)];
        let missing = subtract(r(2025, 1, 5, 2025, 1, 25), &coverage);
        assert_eq!(
            missing,
            vec![r(2025, 1, 5, 2025, 1, 9), r(2025, 1, 21, 2025, 1, 25)]
        );
    }

    #[test]
    fn test_subtract_equals_requested_minus_union() {
        // Unsorted, overlapping coverage still produces a minimal disjoint answer.
        let coverage = vec![
            r(2025, 1, 8, 2025, 1, 12),
            r(2025, 1, 1, 2025, 1, 4),
            r(2025, 1, 3, 2025, 1, 9),
        ];
        let plan = plan(r(2025, 1, 1, 2025, 1, 15), &coverage);
        assert_eq!(plan.missing_ranges, vec![r(2025, 1, 13, 2025, 1, 15)]);
        assert_eq!(plan.cached_ranges, vec![r(2025, 1, 1, 2025, 1, 12)]);
    }

    #[test]
    fn test_month_range() {
        assert_eq!(month_range(2025, 2).unwrap(), r(2025, 2, 1, 2025, 2, 28));
        assert_eq!(month_range(2024, 2).unwrap(), r(2024, 2, 1, 2024, 2, 29));
        assert_eq!(month_range(2025, 12).unwrap(), r(2025, 12, 1, 2025, 12, 31));
        assert!(month_range(2025, 13).is_none());
    }

    #[test]
    fn test_months_in_spans_year_boundary() {
        let months = months_in(r(2024, 11, 15, 2025, 2, 3));
        assert_eq!(months, vec![(2024, 11), (2024, 12), (2025, 1), (2025, 2)]);
    }

    #[test]
    fn test_month_fully_covered() {
        let coverage = vec![r(2025, 1, 1, 2025, 1, 31)];
        assert!(month_fully_covered(&coverage, 2025, 1));
        assert!(!month_fully_covered(&coverage, 2025, 2));

        let partial = vec![r(2025, 1, 1, 2025, 1, 30)];
        assert!(!month_fully_covered(&partial, 2025, 1));
    }
}
