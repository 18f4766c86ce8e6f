//! CSV export of aggregated series

use thiserror::Error;

use crate::types::AggregatedSeries;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush CSV writer: {0}")]
    Flush(String),

    #[error("CSV output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Render one line per bucket: `time,timeLabel,<counter...>`; empty buckets are blank cells
pub fn to_csv(series: &AggregatedSeries) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["time", "timeLabel"];
    header.extend(series.counters.iter().map(String::as_str));
    writer.write_record(&header)?;

    for bucket in &series.buckets {
        let mut record = vec![bucket.time.to_string(), bucket.time_label.clone()];
        record.extend(
            series
                .counters
                .iter()
                .map(|name| bucket.value(name).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
