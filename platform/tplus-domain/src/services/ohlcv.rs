use crate::value_objects::bar::Bar;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub rows: usize,
    pub duplicates: usize,
    pub out_of_order: usize,
    pub invalid_close: usize,
    pub missing_open: usize,
    pub first_datetime: Option<NaiveDateTime>,
    pub last_datetime: Option<NaiveDateTime>,
    pub first_duplicate: Option<NaiveDateTime>,
    pub first_out_of_order: Option<NaiveDateTime>,
    pub first_invalid_close: Option<usize>,
}

impl DataQualityReport {
    /// True when nothing had to be dropped, merged or reordered.
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0
            && self.out_of_order == 0
            && self.invalid_close == 0
            && self.missing_open == 0
    }
}

/// Quality counters for bars already in memory, in the order given.
pub fn data_quality_from_bars(bars: &[Bar]) -> DataQualityReport {
    let mut report = DataQualityReport {
        rows: bars.len(),
        ..DataQualityReport::default()
    };
    if bars.is_empty() {
        return report;
    }

    report.first_datetime = bars.iter().map(|bar| bar.datetime).min();
    report.last_datetime = bars.iter().map(|bar| bar.datetime).max();

    let mut last: Option<NaiveDateTime> = None;
    for (index, bar) in bars.iter().enumerate() {
        if !bar.close.is_finite() || bar.close <= 0.0 {
            report.invalid_close += 1;
            report.first_invalid_close.get_or_insert(index);
        }
        if !bar.open.is_finite() {
            report.missing_open += 1;
        }
        if let Some(prev) = last {
            if bar.datetime == prev {
                report.duplicates += 1;
                report.first_duplicate.get_or_insert(bar.datetime);
            } else if bar.datetime < prev {
                report.out_of_order += 1;
                report.first_out_of_order.get_or_insert(bar.datetime);
            }
        }
        last = Some(bar.datetime);
    }

    report
}

/// Keeps bars whose calendar date lies in `[start, end]`; either bound may be
/// open.
pub fn filter_date_range(
    bars: Vec<Bar>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<Bar> {
    bars.into_iter()
        .filter(|bar| {
            let date = bar.date();
            start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
        })
        .collect()
}
