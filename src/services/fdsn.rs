//! FDSN station and dataselect adapters.

use crate::error::{FetchError, InventoryError};
use crate::models::{ChannelAvailability, TimeWindow, Waveform};
use crate::services::{
    describe_transport_error, format_service_time, InventorySource, WaveformSource,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const STATION_TEXT_COLUMNS: usize = 17;

/// Parse an FDSN timestamp; the time zone is always UTC.
pub fn parse_fdsn_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse the pipe-separated FDSN station text format at channel level.
///
/// Comment and blank lines are ignored; malformed lines are logged and
/// skipped.
pub fn parse_station_text(text: &str) -> Vec<ChannelAvailability> {
    let mut rows = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_station_line(line) {
            Some(row) => rows.push(row),
            None => warn!("Skipping malformed station line {}: {}", line_no + 1, line),
        }
    }

    rows
}

fn parse_station_line(line: &str) -> Option<ChannelAvailability> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() < STATION_TEXT_COLUMNS {
        return None;
    }

    Some(ChannelAvailability {
        network: fields[0].to_string(),
        station: fields[1].to_string(),
        location: fields[2].to_string(),
        channel: fields[3].to_string(),
        azimuth: fields[8].parse().ok()?,
        dip: fields[9].parse().ok()?,
        sample_rate: fields[14].parse().ok()?,
        starttime: parse_fdsn_time(fields[15])?,
        endtime: parse_fdsn_time(fields[16]),
    })
}

/// Channel epochs overlapping the window.
fn overlapping(rows: Vec<ChannelAvailability>, window: &TimeWindow) -> Vec<ChannelAvailability> {
    rows.into_iter()
        .filter(|row| row.starttime < window.end)
        .filter(|row| row.endtime.map_or(true, |end| end > window.start))
        .collect()
}

/// Inventory from an FDSN station web service.
pub struct FdsnStationClient {
    base_url: String,
    network: String,
    station: String,
    http: reqwest::Client,
}

impl FdsnStationClient {
    pub fn new(base_url: &str, network: &str, station: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            network: network.to_string(),
            station: station.to_string(),
            http,
        }
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }

    /// Query parameters for a channel-level text request.
    pub fn query_params(&self, window: &TimeWindow) -> Vec<(&'static str, String)> {
        vec![
            ("net", self.network.clone()),
            ("sta", self.station.clone()),
            ("level", "channel".to_string()),
            ("format", "text".to_string()),
            ("starttime", format_service_time(&window.start)),
            ("endtime", format_service_time(&window.end)),
        ]
    }
}

impl InventorySource for FdsnStationClient {
    async fn availability(
        &self,
        window: &TimeWindow,
    ) -> Result<Vec<ChannelAvailability>, InventoryError> {
        let url = self.query_url();
        info!("Requesting channel inventory for {}.{}", self.network, self.station);

        let response = self
            .http
            .get(&url)
            .query(&self.query_params(window))
            .send()
            .await
            .map_err(|e| InventoryError::Request(describe_transport_error(&e, &url)))?;

        let status = response.status();
        if status.as_u16() == 204 || status.as_u16() == 404 {
            warn!("Station service has no channels for this selection");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InventoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| InventoryError::Request(describe_transport_error(&e, &url)))?;

        let rows = parse_station_text(&text);
        debug!("Parsed {} channel epochs", rows.len());
        Ok(rows)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Inventory read from a local file in FDSN station text format.
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InventorySource for FileInventory {
    async fn availability(
        &self,
        window: &TimeWindow,
    ) -> Result<Vec<ChannelAvailability>, InventoryError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let rows = overlapping(parse_station_text(&text), window);
        debug!(
            "Read {} channel epochs from {}",
            rows.len(),
            self.path.display()
        );
        Ok(rows)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Waveforms from an FDSN dataselect web service. Payloads stay opaque.
pub struct FdsnDataselectClient {
    base_url: String,
    http: reqwest::Client,
}

impl FdsnDataselectClient {
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Query parameters for one channel; an exclusive end drops the final millisecond.
    pub fn query_params(
        channel: &ChannelAvailability,
        window: &TimeWindow,
        inclusive_end: bool,
    ) -> Vec<(&'static str, String)> {
        let end = if inclusive_end {
            window.end
        } else {
            window.end - chrono::Duration::milliseconds(1)
        };

        vec![
            ("net", channel.network.clone()),
            ("sta", channel.station.clone()),
            ("loc", channel.location_query().to_string()),
            ("cha", channel.channel.clone()),
            ("starttime", format_service_time(&window.start)),
            ("endtime", format_service_time(&end)),
        ]
    }
}

impl WaveformSource for FdsnDataselectClient {
    async fn fetch(
        &self,
        channel: &ChannelAvailability,
        window: &TimeWindow,
        inclusive_end: bool,
    ) -> Result<Waveform, FetchError> {
        let sncl = channel.sncl_id();
        let url = format!("{}/query", self.base_url);
        let transport = |message: String| FetchError::Transport {
            sncl: sncl.clone(),
            message,
        };

        let response = self
            .http
            .get(&url)
            .query(&Self::query_params(channel, window, inclusive_end))
            .send()
            .await
            .map_err(|e| transport(describe_transport_error(&e, &url)))?;

        let status = response.status();
        if status.as_u16() == 204 || status.as_u16() == 404 {
            return Err(FetchError::NoData(sncl));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(transport(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        let payload = response
            .bytes()
            .await
            .map_err(|e| transport(describe_transport_error(&e, &url)))?;
        if payload.is_empty() {
            return Err(FetchError::NoData(sncl));
        }

        Ok(Waveform {
            sncl,
            window: *window,
            sample_rate: channel.sample_rate,
            payload: payload.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{vertical, window};
    use chrono::TimeZone;
    use std::io::Write;

    const STATION_TEXT: &str = "\
#Network | Station | Location | Channel | Latitude | Longitude | Elevation | Depth | Azimuth | Dip | SensorDescription | Scale | ScaleFreq | ScaleUnits | SampleRate | StartTime | EndTime
IU|ANMO|00|BHZ|34.9459|-106.4572|1850.0|100.0|0.0|-90.0|Geotech KS-54000|3.4e+09|0.02|M/S|40.0|2018-07-09T20:45:00.0000|
IU|ANMO|10|BHN|34.9459|-106.4572|1850.0|57.0|0.0|0.0|Guralp CMG3-T|1.9e+09|0.02|M/S|40.0|2018-07-09T20:45:00|2019-01-01T00:00:00
IU|ANMO|00|LOG|34.9459|-106.4572|1850.0|100.0|0.0|0.0|Logs|0|0|COUNTS|0.0|2018-07-09T20:45:00|
";

    #[test]
    fn test_parse_station_text() {
        let rows = parse_station_text(STATION_TEXT);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sncl_id(), "IU.ANMO.00.BHZ");
        assert_eq!(rows[0].dip, -90.0);
        assert_eq!(rows[0].sample_rate, 40.0);
        assert!(rows[0].endtime.is_none());
        assert_eq!(
            rows[1].endtime,
            Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_station_text_skips_malformed() {
        let text = "IU|ANMO|00|BHZ|not enough columns\nIU|ANMO|00|BHZ|0|0|0|0|abc|-90|x|0|0|M/S|40|2018-01-01T00:00:00|\n";
        assert!(parse_station_text(text).is_empty());
    }

    #[test]
    fn test_parse_station_text_blank_location() {
        let text = "IU|ANMO||BHZ|0|0|0|0|0|-90|x|0|0|M/S|20|2018-01-01T00:00:00|\n";
        let rows = parse_station_text(text);
        assert_eq!(rows[0].location, "");
        assert_eq!(rows[0].location_query(), "--");
    }

    #[test]
    fn test_parse_fdsn_time_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_fdsn_time("2024-03-01T00:00:00"), Some(expected));
        assert_eq!(parse_fdsn_time("2024-03-01T00:00:00.0000"), Some(expected));
        assert_eq!(parse_fdsn_time("2024-03-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_fdsn_time(""), None);
        assert_eq!(parse_fdsn_time("yesterday"), None);
    }

    #[test]
    fn test_overlapping_filters_closed_epochs() {
        let rows = parse_station_text(STATION_TEXT);
        let kept = overlapping(rows, &window());

        // The BHN epoch closed in 2019
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.channel != "BHN"));
    }

    #[tokio::test]
    async fn test_file_inventory_reads_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(STATION_TEXT.as_bytes()).unwrap();

        let inventory = FileInventory::new(file.path());
        let rows = inventory.availability(&window()).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(inventory.describe(), file.path().display().to_string());
    }

    #[test]
    fn test_file_inventory_missing_file() {
        let inventory = FileInventory::new("/nonexistent/inventory.txt");
        let err = tokio_test::block_on(inventory.availability(&window())).unwrap_err();
        assert!(matches!(err, InventoryError::Io(_)));
    }

    #[test]
    fn test_station_query_params() {
        let http = reqwest::Client::new();
        let client =
            FdsnStationClient::new("https://example.org/fdsnws/station/1/", "IU", "ANMO", http);
        let params = client.query_params(&window());

        assert_eq!(client.query_url(), "https://example.org/fdsnws/station/1/query");
        assert!(params.contains(&("level", "channel".to_string())));
        assert!(params.contains(&("format", "text".to_string())));
        assert!(params.contains(&("starttime", "2024-03-01T00:00:00.000".to_string())));
    }

    #[test]
    fn test_dataselect_exclusive_end() {
        let channel = vertical("", "BHZ");
        let exclusive = FdsnDataselectClient::query_params(&channel, &window(), false);
        let inclusive = FdsnDataselectClient::query_params(&channel, &window(), true);

        assert!(exclusive.contains(&("endtime", "2024-03-01T23:59:59.999".to_string())));
        assert!(inclusive.contains(&("endtime", "2024-03-02T00:00:00.000".to_string())));
        assert!(exclusive.contains(&("loc", "--".to_string())));
    }
}
