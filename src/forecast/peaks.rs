use std::collections::BTreeMap;

use crate::domain::{ForecastRow, PeakRow, Source};

/// One row per (region, source, calendar day): the hour with the highest
/// `mw_hat`. Equal maxima keep the earliest hour. Output is sorted by region,
/// source, then day.
pub fn peak_hours(rows: &[ForecastRow]) -> Vec<PeakRow> {
    let mut best: BTreeMap<(&str, Source, chrono::NaiveDate), &ForecastRow> = BTreeMap::new();
    for row in rows {
        let slot = best
            .entry((row.region.as_str(), row.source, row.date()))
            .or_insert(row);
        let replace = row.mw_hat > slot.mw_hat
            || (row.mw_hat == slot.mw_hat && row.timestamp < slot.timestamp);
        if replace {
            *slot = row;
        }
    }
    best.into_values().map(PeakRow::from).collect()
}
