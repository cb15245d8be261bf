use crate::pollutant::DisplayRange;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub color: &'static str,
    pub value: f64,
}

impl LegendEntry {
    pub fn label(&self) -> String {
        format!("{:.6}", self.value)
    }
}

/// Maps each palette color to the value it stands for, spacing the values
/// evenly between `min` and `max` by palette position.
pub fn compute_legend(range: &DisplayRange) -> Vec<LegendEntry> {
    let steps = range.palette.len();
    if steps < 2 {
        return range
            .palette
            .iter()
            .map(|&color| LegendEntry { color, value: range.min })
            .collect();
    }

    let span = range.max - range.min;
    let last = steps - 1;
    range
        .palette
        .iter()
        .enumerate()
        .map(|(i, &color)| {
            // pin the last entry, min + (max - min) can drift off max
            let value = if i == last {
                range.max
            } else {
                range.min + span * i as f64 / last as f64
            };
            LegendEntry { color, value }
        })
        .collect()
}
