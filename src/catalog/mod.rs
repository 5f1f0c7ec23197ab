//! Candidate-exoplanet catalogs
//!
//! Loading and harmonization of the Kepler KOI and TESS TOI tables:
//! - [`loader`] reads CSV/TSV/Parquet exports into polars frames
//! - [`schema`] holds the column maps for both catalogs
//! - [`harmonize`] maps them onto one numeric feature schema

pub mod harmonize;
pub mod loader;
pub mod schema;

pub use harmonize::{Candidate, HarmonizedTable, Harmonizer, Identifiers, LabelCounts};
pub use loader::CatalogLoader;
pub use schema::CatalogSchema;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vetting status, reduced to the binary label set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Disposition {
    Confirmed,
    Candidate,
}

impl Disposition {
    /// Raw disposition codes accepted from either catalog.
    ///
    /// KOI uses the words; TFOPWG uses the two-letter codes.
    const CODES: [(&'static str, Disposition); 6] = [
        ("CONFIRMED", Disposition::Confirmed),
        ("CANDIDATE", Disposition::Candidate),
        ("CP", Disposition::Confirmed),
        ("CF", Disposition::Confirmed),
        ("PC", Disposition::Candidate),
        ("CN", Disposition::Candidate),
    ];

    /// Normalize a raw catalog value. Unknown codes (FP, KP, APC, ...) are `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let code = raw.trim().to_uppercase();
        Self::CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, d)| *d)
    }

    /// Binary label: 1 = confirmed, 0 = candidate
    pub fn label(self) -> u8 {
        match self {
            Disposition::Confirmed => 1,
            Disposition::Candidate => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Confirmed => "CONFIRMED",
            Disposition::Candidate => "CANDIDATE",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "KOI")]
    Koi,
    #[serde(rename = "TESS")]
    Tess,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Koi => "KOI",
            Source::Tess => "TESS",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "KOI" => Ok(Source::Koi),
            "TESS" => Ok(Source::Tess),
            other => Err(format!("unknown source '{other}'")),
        }
    }
}

/// Which catalog(s) and feature set a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetMode {
    /// KOI only, full KOI feature set including false-positive flags
    Koi,
    /// TESS only, full TOI feature set
    Tess,
    /// Both catalogs on the shared mapped schema
    #[default]
    Both,
}

impl DatasetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetMode::Koi => "koi",
            DatasetMode::Tess => "tess",
            DatasetMode::Both => "both",
        }
    }

    pub fn uses_koi(self) -> bool {
        matches!(self, DatasetMode::Koi | DatasetMode::Both)
    }

    pub fn uses_tess(self) -> bool {
        matches!(self, DatasetMode::Tess | DatasetMode::Both)
    }
}

impl fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "koi" => Ok(DatasetMode::Koi),
            "tess" => Ok(DatasetMode::Tess),
            "both" => Ok(DatasetMode::Both),
            other => Err(format!("unknown dataset mode '{other}' (expected koi, tess or both)")),
        }
    }
}
