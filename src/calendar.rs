//! Calendar and window resolution.
//!
//! Maps an event date plus signed trading-day offsets onto absolute
//! positions in a return series. The estimation window is placed strictly
//! before the event window, separated by the buffer, so estimation is not
//! contaminated by event-window returns.

use crate::error::{EventStudyError, Result};
use crate::types::WindowSpec;
use chrono::{Duration, NaiveDate};
use std::ops::Range;

/// Resolver behavior shared by a whole study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// When the event date is not a trading day, walk forward up to this
    /// many calendar days to find the next trading day. Zero disables
    /// the fallback and missing dates fail immediately.
    pub date_fallback_days: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            date_fallback_days: 4,
        }
    }
}

/// Absolute index ranges resolved for one event in one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindows {
    /// Position of the (possibly shifted) event date in the series.
    pub event_index: usize,
    /// Estimation window, half-open.
    pub estimation: Range<usize>,
    /// Event window, half-open; its length is the event window size.
    pub event: Range<usize>,
}

/// Locate a date in a sorted date index, walking forward over
/// non-trading days up to the configured fallback.
pub fn index_of_date(
    dates: &[NaiveDate],
    target: NaiveDate,
    config: &ResolverConfig,
    series_name: &str,
) -> Result<usize> {
    let mut candidate = target;
    for _ in 0..=config.date_fallback_days {
        if let Ok(idx) = dates.binary_search(&candidate) {
            return Ok(idx);
        }
        candidate += Duration::days(1);
    }
    Err(EventStudyError::DateNotFound {
        date: target,
        series: series_name.to_string(),
        searched: config.date_fallback_days,
    })
}

/// Resolve estimation and event windows for one event.
///
/// Window layout, in absolute series positions:
///
/// ```text
/// [estimation_size][buffer_size][start_offset ..= end_offset]
///                                ^ event date at offset 0
/// ```
pub fn resolve_windows(
    dates: &[NaiveDate],
    event_date: NaiveDate,
    windows: &WindowSpec,
    config: &ResolverConfig,
    series_name: &str,
) -> Result<ResolvedWindows> {
    windows.validate()?;
    let event_index = index_of_date(dates, event_date, config, series_name)?;

    let (start_offset, end_offset) = windows.event_window;
    let event_start = event_index as i64 + start_offset as i64;
    let event_end = event_index as i64 + end_offset as i64;

    let estimation_end = event_start - windows.buffer_size as i64;
    let estimation_start = estimation_end - windows.estimation_size as i64;

    if estimation_start < 0 {
        return Err(EventStudyError::InsufficientHistory {
            series: series_name.to_string(),
            message: format!(
                "estimation window needs {} rows before {}, series starts {} rows short",
                windows.estimation_size + windows.buffer_size + start_offset.unsigned_abs() as usize,
                event_date,
                -estimation_start
            ),
        });
    }
    if event_end >= dates.len() as i64 {
        return Err(EventStudyError::InsufficientHistory {
            series: series_name.to_string(),
            message: format!(
                "event window extends {} rows past the end of the series",
                event_end - dates.len() as i64 + 1
            ),
        });
    }

    Ok(ResolvedWindows {
        event_index,
        estimation: estimation_start as usize..estimation_end as usize,
        event: event_start as usize..(event_end + 1) as usize,
    })
}
