// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! View and lifetime bounds applied to every deposit, plus the display text
//! derived from them.

pub const MIN_VIEWS: u32 = 1;
pub const MAX_VIEWS: u32 = 100;

pub const DEFAULT_TTL_SECS: u64 = 3600;
pub const MIN_TTL_SECS: u64 = 300;
/// One week.
pub const MAX_TTL_SECS: u64 = 604_800;

/// Largest value of the coarse hour/day lifetime unit.
pub const MAX_TTL_UNIT: u32 = 30;

const HOUR: u64 = 3600;
const DAY: u64 = 86_400;

/// 0 becomes 1, everything else is clamped to `MIN_VIEWS..=MAX_VIEWS`.
pub fn normalize_views(views: u32) -> u32 {
    views.clamp(MIN_VIEWS, MAX_VIEWS)
}

/// 0 becomes the one hour default, everything else is clamped to
/// `MIN_TTL_SECS..=MAX_TTL_SECS`.
pub fn normalize_ttl(ttl_secs: u64) -> u64 {
    if ttl_secs == 0 {
        return DEFAULT_TTL_SECS;
    }
    ttl_secs.clamp(MIN_TTL_SECS, MAX_TTL_SECS)
}

/// Convert the hour/day lifetime unit to seconds.
///
/// `1..=24` are hours, `25..=30` are `n - 23` days. The result is passed
/// through [`normalize_ttl`], so 30 (seven days) is the effective maximum.
pub fn ttl_from_unit(unit: u32) -> u64 {
    let unit = u64::from(unit.clamp(1, MAX_TTL_UNIT));
    let secs = if unit <= 24 {
        unit * HOUR
    } else {
        (unit - 23) * DAY
    };
    normalize_ttl(secs)
}

pub fn ttl_text(ttl_secs: u64) -> String {
    if ttl_secs <= HOUR {
        "one more hour".to_string()
    } else if ttl_secs <= DAY {
        format!("{} more hours", ttl_secs / HOUR)
    } else {
        format!("{} more days", ttl_secs / DAY)
    }
}

pub fn max_file_size_text(max_bytes: u64) -> String {
    let mib = max_bytes / 1024 / 1024;
    if mib >= 1024 {
        format!("{} GB", mib / 1024)
    } else {
        format!("{mib} MB")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_are_clamped() {
        assert_eq!(normalize_views(0), 1);
        assert_eq!(normalize_views(1), 1);
        assert_eq!(normalize_views(42), 42);
        assert_eq!(normalize_views(101), 100);
    }

    #[test]
    fn ttl_is_defaulted_and_clamped() {
        assert_eq!(normalize_ttl(0), 3600);
        assert_eq!(normalize_ttl(1), 300);
        assert_eq!(normalize_ttl(7200), 7200);
        assert_eq!(normalize_ttl(10_000_000), 604_800);
    }

    #[test]
    fn ttl_unit_hours_then_days() {
        assert_eq!(ttl_from_unit(0), 3600);
        assert_eq!(ttl_from_unit(1), 3600);
        assert_eq!(ttl_from_unit(24), 24 * 3600);
        assert_eq!(ttl_from_unit(25), 2 * 86_400);
        assert_eq!(ttl_from_unit(30), 7 * 86_400);
        assert_eq!(ttl_from_unit(500), 7 * 86_400);
    }

    #[test]
    fn ttl_text_buckets() {
        assert_eq!(ttl_text(0), "one more hour");
        assert_eq!(ttl_text(3600), "one more hour");
        assert_eq!(ttl_text(3601), "1 more hours");
        assert_eq!(ttl_text(7200), "2 more hours");
        assert_eq!(ttl_text(86_399), "23 more hours");
        assert_eq!(ttl_text(86_400), "24 more hours");
        assert_eq!(ttl_text(100_000), "1 more days");
        assert_eq!(ttl_text(2 * 86_400), "2 more days");
        assert_eq!(ttl_text(604_800), "7 more days");
    }

    #[test]
    fn file_size_text() {
        assert_eq!(max_file_size_text(1024 * 1024 * 1024), "1 GB");
        assert_eq!(max_file_size_text(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(max_file_size_text(512 * 1024 * 1024), "512 MB");
    }
}
