use std::{collections::HashSet, path::PathBuf};

use reqwest::{Client, Method};
use serde::Deserialize;

use crate::{
    config::Config,
    proximity::distance::Coordinate,
    timing::{
        date_field::DateNormalizer,
        schedule::{ClosureSchedule, RawWindow},
    },
};

use super::{centre::Centre, error::LoadError, Dataset};

/// Where the closure table comes from.
pub trait Source {
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<String, LoadError>;
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Source for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

pub struct HttpSource {
    url: String,
    user_agent: String,
    client: Client,
}

impl HttpSource {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            client: Client::new(),
        }
    }
}

impl Source for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        let response = self
            .client
            .request(Method::GET, &self.url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// One row of the published closure table. Columns not listed here are ignored.
#[derive(Debug, Deserialize)]
struct ClosureRow {
    name: String,
    latitude_hc: f64,
    longitude_hc: f64,
    q1_cleaningstartdate: Option<String>,
    q1_cleaningenddate: Option<String>,
    remarks_q1: Option<String>,
    q2_cleaningstartdate: Option<String>,
    q2_cleaningenddate: Option<String>,
    remarks_q2: Option<String>,
    q3_cleaningstartdate: Option<String>,
    q3_cleaningenddate: Option<String>,
    remarks_q3: Option<String>,
    q4_cleaningstartdate: Option<String>,
    q4_cleaningenddate: Option<String>,
    remarks_q4: Option<String>,
    other_works_startdate: Option<String>,
    other_works_enddate: Option<String>,
    remarks_other_works: Option<String>,
}

fn window<'a>(
    start: &'a Option<String>,
    end: &'a Option<String>,
    remarks: &'a Option<String>,
) -> RawWindow<'a> {
    RawWindow {
        start: start.as_deref(),
        end: end.as_deref(),
        remarks: remarks.as_deref(),
    }
}

impl ClosureRow {
    /// Finite, in degrees, on the globe. csv happily parses "NaN" and "inf".
    fn has_valid_location(&self) -> bool {
        self.latitude_hc.is_finite()
            && self.longitude_hc.is_finite()
            && (-90.0..=90.0).contains(&self.latitude_hc)
            && (-180.0..=180.0).contains(&self.longitude_hc)
    }

    fn into_centre(self, normalizer: &DateNormalizer) -> Centre {
        let schedule = ClosureSchedule::build(
            normalizer,
            [
                window(&self.q1_cleaningstartdate, &self.q1_cleaningenddate, &self.remarks_q1),
                window(&self.q2_cleaningstartdate, &self.q2_cleaningenddate, &self.remarks_q2),
                window(&self.q3_cleaningstartdate, &self.q3_cleaningenddate, &self.remarks_q3),
                window(&self.q4_cleaningstartdate, &self.q4_cleaningenddate, &self.remarks_q4),
            ],
            window(
                &self.other_works_startdate,
                &self.other_works_enddate,
                &self.remarks_other_works,
            ),
        );
        Centre::new(
            &self.name,
            Coordinate::new(self.latitude_hc, self.longitude_hc),
            schedule,
        )
    }
}

/// Parses the CSV text into a `Dataset`.
///
/// Rows that fail to deserialize, rows with unusable coordinates and repeated
/// names are skipped with a warning.
pub fn parse_table(text: &str, normalizer: &DateNormalizer) -> Result<Dataset, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    // Surface a broken header as an error instead of one warning per row.
    reader.headers()?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut centres: Vec<Centre> = Vec::new();
    for (index, row) in reader.deserialize::<ClosureRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                log::warn!("Skipping row {}: {}", index + 1, err);
                continue;
            }
        };
        if !row.has_valid_location() {
            log::warn!(
                "Skipping row {} ('{}'): coordinates {}, {} out of range",
                index + 1,
                row.name,
                row.latitude_hc,
                row.longitude_hc
            );
            continue;
        }
        let centre = row.into_centre(normalizer);
        if !seen.insert(centre.name().to_string()) {
            log::warn!("Skipping duplicate centre '{}'", centre.name());
            continue;
        }
        centres.push(centre);
    }
    Ok(Dataset::new(centres))
}

pub async fn load<S: Source>(source: &S, normalizer: &DateNormalizer) -> Result<Dataset, LoadError> {
    let text = source.fetch().await?;
    let dataset = parse_table(&text, normalizer)?;
    let intervals: usize = dataset
        .centres()
        .iter()
        .map(|centre| centre.schedule().closures().len())
        .sum();
    log::info!(
        "Loaded {} centres with {} closure windows from {}",
        dataset.len(),
        intervals,
        source.describe()
    );
    Ok(dataset)
}

pub async fn load_from_config(config: &Config) -> Result<Dataset, LoadError> {
    let normalizer = DateNormalizer::new(&config.date_format, &config.placeholder_marker)?;
    let location = config.data_source.as_str();
    let dataset = if location.starts_with("http://") || location.starts_with("https://") {
        load(&HttpSource::new(location), &normalizer).await?
    } else {
        load(&FileSource::new(location), &normalizer).await?
    };
    Ok(dataset)
}
