use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ConcentrationType {
    HighlyConcentrated,
    SubstantiallyConcentrated,
    National,
}

impl ConcentrationType {
    /// Discriminator order, which is also stratum order.
    pub const ALL: [ConcentrationType; 3] = [
        ConcentrationType::HighlyConcentrated,
        ConcentrationType::SubstantiallyConcentrated,
        ConcentrationType::National,
    ];

    pub fn code(&self) -> u8 {
        match self {
            ConcentrationType::HighlyConcentrated => 0,
            ConcentrationType::SubstantiallyConcentrated => 1,
            ConcentrationType::National => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ConcentrationType::HighlyConcentrated),
            1 => Some(ConcentrationType::SubstantiallyConcentrated),
            2 => Some(ConcentrationType::National),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConcentrationType::HighlyConcentrated => "Highly Concentrated",
            ConcentrationType::SubstantiallyConcentrated => "Substantially Concentrated",
            ConcentrationType::National => "National",
        }
    }
}

impl From<ConcentrationType> for u8 {
    fn from(value: ConcentrationType) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for ConcentrationType {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ConcentrationType::from_code(i64::from(value))
            .ok_or_else(|| AppError::Parse(format!("invalid concentration type: {value}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationRecord {
    pub city: String,
    pub region: String,
    pub concentration_type: ConcentrationType,
    pub vehicle_count: u64,
    #[serde(default)]
    pub vehicle_class: u32,
    #[serde(default)]
    pub vehicle_type: String,
    #[serde(default)]
    pub fuel_type: String,
    #[serde(default)]
    pub concentration_description: String,
}

impl ConcentrationRecord {
    pub fn new(
        city: impl Into<String>,
        region: impl Into<String>,
        concentration_type: ConcentrationType,
        vehicle_count: u64,
    ) -> Self {
        Self {
            city: city.into(),
            region: region.into(),
            concentration_type,
            vehicle_count,
            vehicle_class: 0,
            vehicle_type: String::new(),
            fuel_type: String::new(),
            concentration_description: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "City", default)]
    city: Option<String>,
    #[serde(rename = "State", default)]
    state: Option<String>,
    #[serde(rename = "Concentration_Type", default)]
    concentration_type: Option<String>,
    #[serde(rename = "Vehicle_Count", default)]
    vehicle_count: Option<String>,
    #[serde(rename = "Vehicle_Class", default)]
    vehicle_class: Option<String>,
    #[serde(rename = "Vehicle_Type", default)]
    vehicle_type: Option<String>,
    #[serde(rename = "Fuel_Type", default)]
    fuel_type: Option<String>,
    #[serde(rename = "Concentration_Description", default)]
    concentration_description: Option<String>,
}

pub fn load_csv(path: &Path) -> AppResult<Vec<ConcentrationRecord>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    parse_csv(&bytes)
}

pub fn parse_csv(bytes: &[u8]) -> AppResult<Vec<ConcentrationRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut records = Vec::new();
    let mut dropped = 0_usize;
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(row = index + 1, error = %err, "dropping unreadable csv row");
                dropped += 1;
                continue;
            }
        };
        let code = parse_or(row.concentration_type.as_deref(), 0_i64);
        let Some(concentration_type) = ConcentrationType::from_code(code) else {
            warn!(row = index + 1, code, "dropping row with unknown concentration type");
            dropped += 1;
            continue;
        };

        records.push(ConcentrationRecord {
            city: row.city.unwrap_or_default(),
            region: row.state.unwrap_or_default(),
            concentration_type,
            vehicle_count: parse_or(row.vehicle_count.as_deref(), 1_u64),
            vehicle_class: parse_or(row.vehicle_class.as_deref(), 0_u32),
            vehicle_type: row.vehicle_type.unwrap_or_default(),
            fuel_type: row.fuel_type.unwrap_or_default(),
            concentration_description: row.concentration_description.unwrap_or_default(),
        });
    }

    info!(loaded = records.len(), dropped, "parsed concentration records");
    Ok(records)
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const SAMPLE_CSV: &str = "\
City,State,Concentration_Type,Vehicle_Count,Vehicle_Class,Vehicle_Type,Fuel_Type,Concentration_Description
 Akron , Ohio ,0,12,3,Truck,Diesel,Highly concentrated
Boise,Idaho,2,not-a-number,,Sedan,Gasoline,National
Atlantis,Ocean,7,1,,,,
,Kansas,,4,,,,
";

    #[test]
    fn unreadable_row_does_not_abort_the_load() {
        let mut bytes = b"City,State,Concentration_Type,Vehicle_Count\n".to_vec();
        bytes.extend_from_slice(b"Akron,Ohio,0,3\n");
        bytes.extend_from_slice(b"Gary,Indi\xff\xfena,1,2\n");
        bytes.extend_from_slice(b"Boise,Idaho,2,5\n");

        let records = parse_csv(&bytes).unwrap();
        let cities: Vec<&str> = records.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(cities, vec!["Akron", "Boise"]);
    }

    #[test]
    fn parses_rows_with_defaults() {
        let records = parse_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);

        let akron = &records[0];
        assert_eq!(akron.city, "Akron");
        assert_eq!(akron.region, "Ohio");
        assert_eq!(akron.concentration_type, ConcentrationType::HighlyConcentrated);
        assert_eq!(akron.vehicle_count, 12);
        assert_eq!(akron.vehicle_class, 3);
        assert_eq!(akron.fuel_type, "Diesel");

        let boise = &records[1];
        assert_eq!(boise.concentration_type, ConcentrationType::National);
        assert_eq!(boise.vehicle_count, 1);

        let kansas = &records[2];
        assert!(kansas.city.is_empty());
        assert_eq!(kansas.concentration_type, ConcentrationType::HighlyConcentrated);
    }

    #[test]
    fn tolerates_minimal_columns() {
        let csv = "City,State,Concentration_Type,Vehicle_Count\nMiramar,Florida,1,9\n";
        let records = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].concentration_type,
            ConcentrationType::SubstantiallyConcentrated
        );
        assert!(records[0].vehicle_type.is_empty());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vehicles.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();
        assert_eq!(load_csv(&path).unwrap().len(), 3);
    }

    #[test]
    fn concentration_type_serializes_as_code() {
        let json = serde_json::to_string(&ConcentrationType::National).unwrap();
        assert_eq!(json, "2");
        let parsed: ConcentrationType = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, ConcentrationType::SubstantiallyConcentrated);
        assert!(serde_json::from_str::<ConcentrationType>("5").is_err());
    }
}
