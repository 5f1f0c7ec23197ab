//! Column maps for the KOI and TOI exports

use super::{DatasetMode, Source};

/// Column layout of one catalog
#[derive(Debug, Clone)]
pub struct CatalogSchema {
    pub source: Source,
    /// Disposition column
    pub target: &'static str,
    /// Features used when this catalog is projected on its own
    pub features: &'static [&'static str],
    /// Raw column -> shared name, used in `Both` mode
    pub shared_map: &'static [(&'static str, &'static str)],
    /// Identifier columns carried through to the output
    pub identifiers: &'static [&'static str],
    /// (radius, equilibrium temperature) columns in single-catalog mode
    pub display: (&'static str, &'static str),
}

const KOI_FEATURES: &[&str] = &[
    "koi_period",
    "koi_time0bk",
    "koi_duration",
    "koi_depth",
    "koi_prad",
    "koi_teq",
    "koi_steff",
    "koi_slogg",
    "koi_srad",
    "koi_kepmag",
    "koi_fpflag_nt",
    "koi_fpflag_ss",
    "koi_fpflag_co",
    "koi_fpflag_ec",
];

const KOI_SHARED: &[(&str, &str)] = &[
    ("koi_period", "period"),
    ("koi_duration", "duration_hours"),
    ("koi_depth", "depth_ppm"),
    ("koi_prad", "prad_re"),
    ("koi_teq", "teq_k"),
    ("koi_steff", "st_teff"),
    ("koi_slogg", "st_logg"),
    ("koi_srad", "st_rad"),
];

const TESS_FEATURES: &[&str] = &[
    "pl_orbper",
    "pl_trandurh",
    "pl_trandep",
    "pl_rade",
    "pl_eqt",
    "pl_insol",
    "st_teff",
    "st_logg",
    "st_rad",
    "st_tmag",
    "st_dist",
];

const TESS_SHARED: &[(&str, &str)] = &[
    ("pl_orbper", "period"),
    ("pl_trandurh", "duration_hours"),
    ("pl_trandep", "depth_ppm"),
    ("pl_rade", "prad_re"),
    ("pl_eqt", "teq_k"),
    ("st_teff", "st_teff"),
    ("st_logg", "st_logg"),
    ("st_rad", "st_rad"),
];

/// Identifier columns of both catalogs, in output order
pub const IDENTIFIER_COLUMNS: [&str; 7] = [
    "kepid",
    "kepler_name",
    "kepoi_name",
    "toi",
    "tid",
    "tic",
    "toi_name",
];

/// Normalized disposition column added during harmonization
pub const DISPOSITION_COLUMN: &str = "disposition";
/// Source tag column added during harmonization
pub const SOURCE_COLUMN: &str = "source";

/// Shared-schema display columns
pub const SHARED_DISPLAY: (&str, &str) = ("prad_re", "teq_k");

/// Columns that are never treated as features
const METADATA_COLUMNS: [&str; 2] = [DISPOSITION_COLUMN, SOURCE_COLUMN];

impl CatalogSchema {
    pub fn koi() -> Self {
        Self {
            source: Source::Koi,
            target: "koi_disposition",
            features: KOI_FEATURES,
            shared_map: KOI_SHARED,
            identifiers: &IDENTIFIER_COLUMNS[..3],
            display: ("koi_prad", "koi_teq"),
        }
    }

    pub fn tess() -> Self {
        Self {
            source: Source::Tess,
            target: "tfopwg_disp",
            features: TESS_FEATURES,
            shared_map: TESS_SHARED,
            identifiers: &IDENTIFIER_COLUMNS[3..],
            display: ("pl_rade", "pl_eqt"),
        }
    }

    pub fn for_source(source: Source) -> Self {
        match source {
            Source::Koi => Self::koi(),
            Source::Tess => Self::tess(),
        }
    }

    /// Raw columns required for single-catalog mode
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut cols = vec![self.target];
        cols.extend_from_slice(self.features);
        cols
    }

    /// Raw columns required for the shared schema
    pub fn required_shared_columns(&self) -> Vec<&'static str> {
        let mut cols = vec![self.target];
        cols.extend(self.shared_map.iter().map(|(raw, _)| *raw));
        cols
    }

    /// Shared names this catalog maps onto
    pub fn shared_names(&self) -> Vec<&'static str> {
        self.shared_map.iter().map(|(_, shared)| *shared).collect()
    }
}

/// Sorted intersection of the mapped schemas, minus metadata columns
pub fn shared_features(a: &CatalogSchema, b: &CatalogSchema) -> Vec<String> {
    let b_names = b.shared_names();
    let mut shared: Vec<String> = a
        .shared_names()
        .into_iter()
        .filter(|name| b_names.contains(name))
        .filter(|name| !METADATA_COLUMNS.contains(name))
        .map(str::to_string)
        .collect();
    shared.sort();
    shared.dedup();
    shared
}

/// (radius, temperature) columns shown for a run in `mode`
pub fn display_columns(mode: DatasetMode) -> (&'static str, &'static str) {
    match mode {
        DatasetMode::Koi => CatalogSchema::koi().display,
        DatasetMode::Tess => CatalogSchema::tess().display,
        DatasetMode::Both => SHARED_DISPLAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_features_sorted() {
        let shared = shared_features(&CatalogSchema::koi(), &CatalogSchema::tess());
        assert_eq!(
            shared,
            vec![
                "depth_ppm",
                "duration_hours",
                "period",
                "prad_re",
                "st_logg",
                "st_rad",
                "st_teff",
                "teq_k"
            ]
        );
    }

    #[test]
    fn test_required_columns_include_target() {
        let koi = CatalogSchema::koi();
        let cols = koi.required_columns();
        assert_eq!(cols[0], "koi_disposition");
        assert_eq!(cols.len(), 15);
        assert!(cols.contains(&"koi_fpflag_ec"));

        let tess = CatalogSchema::tess().required_shared_columns();
        assert_eq!(tess.len(), 9);
        assert!(tess.contains(&"tfopwg_disp"));
    }

    #[test]
    fn test_identifiers_split() {
        assert_eq!(CatalogSchema::koi().identifiers, &["kepid", "kepler_name", "kepoi_name"]);
        assert_eq!(CatalogSchema::tess().identifiers, &["toi", "tid", "tic", "toi_name"]);
    }

    #[test]
    fn test_display_columns() {
        assert_eq!(display_columns(DatasetMode::Koi), ("koi_prad", "koi_teq"));
        assert_eq!(display_columns(DatasetMode::Tess), ("pl_rade", "pl_eqt"));
        assert_eq!(display_columns(DatasetMode::Both), ("prad_re", "teq_k"));
    }
}
