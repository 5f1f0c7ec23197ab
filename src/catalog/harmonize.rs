//! Harmonization of KOI/TOI frames onto one numeric feature schema

use super::schema::{
    display_columns, shared_features, CatalogSchema, DISPOSITION_COLUMN, IDENTIFIER_COLUMNS,
    SOURCE_COLUMN,
};
use super::{DatasetMode, Disposition, Source};
use crate::error::{ExomapError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Catalog identifiers of one row. Missing ones are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identifiers {
    pub kepid: Option<String>,
    pub kepler_name: Option<String>,
    pub kepoi_name: Option<String>,
    pub toi: Option<String>,
    pub tid: Option<String>,
    pub tic: Option<String>,
    pub toi_name: Option<String>,
}

impl Identifiers {
    fn set(&mut self, column: &str, value: Option<String>) {
        let slot = match column {
            "kepid" => &mut self.kepid,
            "kepler_name" => &mut self.kepler_name,
            "kepoi_name" => &mut self.kepoi_name,
            "toi" => &mut self.toi,
            "tid" => &mut self.tid,
            "tic" => &mut self.tic,
            "toi_name" => &mut self.toi_name,
            _ => return,
        };
        *slot = value;
    }
}

/// Non-feature view of one harmonized row
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: Source,
    pub disposition: Disposition,
    pub ids: Identifiers,
    /// Planet radius in Earth radii
    pub radius: Option<f64>,
    /// Equilibrium temperature in kelvin
    pub temperature: Option<f64>,
}

/// Row counts per label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub total: usize,
    pub confirmed: usize,
    pub candidate: usize,
}

/// Filtered, labelled rows with a numeric feature block
#[derive(Debug, Clone)]
pub struct HarmonizedTable {
    frame: DataFrame,
    mode: DatasetMode,
    features: Vec<String>,
    /// Rows removed because a feature value was missing or not finite
    pub dropped_rows: usize,
    /// Rows removed because their disposition is outside the label set
    pub unlabeled_rows: usize,
}

impl HarmonizedTable {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn mode(&self) -> DatasetMode {
        self.mode
    }

    pub fn feature_names(&self) -> &[String] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Row-major feature matrix in `feature_names()` order
    pub fn feature_matrix(&self) -> Result<Vec<Vec<f64>>> {
        let columns = self
            .features
            .iter()
            .map(|name| float_values(&self.frame, name))
            .collect::<Result<Vec<_>>>()?;

        let rows = (0..self.len())
            .map(|i| {
                columns
                    .iter()
                    .map(|col| col[i].unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();
        Ok(rows)
    }

    /// Per-row source, label, identifiers and display attributes
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        let n = self.len();
        let sources = string_values(&self.frame, SOURCE_COLUMN)?;
        let dispositions = string_values(&self.frame, DISPOSITION_COLUMN)?;

        let mut id_columns = Vec::with_capacity(IDENTIFIER_COLUMNS.len());
        for name in IDENTIFIER_COLUMNS {
            id_columns.push((name, string_values(&self.frame, name)?));
        }

        let (radius_col, temp_col) = display_columns(self.mode);
        let radius = optional_float_values(&self.frame, radius_col, n)?;
        let temperature = optional_float_values(&self.frame, temp_col, n)?;

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let source = sources[i]
                .as_deref()
                .and_then(|s| s.parse::<Source>().ok())
                .ok_or_else(|| ExomapError::DataError(format!("row {i} has no source")))?;
            let disposition = dispositions[i]
                .as_deref()
                .and_then(Disposition::normalize)
                .ok_or_else(|| ExomapError::DataError(format!("row {i} has no disposition")))?;

            let mut ids = Identifiers::default();
            for (name, values) in &id_columns {
                let value = values[i]
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                ids.set(name, value);
            }

            out.push(Candidate {
                source,
                disposition,
                ids,
                radius: radius[i].filter(|v| v.is_finite()),
                temperature: temperature[i].filter(|v| v.is_finite()),
            });
        }
        Ok(out)
    }

    pub fn label_counts(&self) -> Result<LabelCounts> {
        let mut counts = LabelCounts::default();
        for value in string_values(&self.frame, DISPOSITION_COLUMN)?.into_iter().flatten() {
            match Disposition::normalize(&value) {
                Some(Disposition::Confirmed) => counts.confirmed += 1,
                Some(Disposition::Candidate) => counts.candidate += 1,
                None => continue,
            }
            counts.total += 1;
        }
        Ok(counts)
    }
}

/// Maps raw catalog frames onto harmonized tables
pub struct Harmonizer;

impl Harmonizer {
    /// Harmonize the frames required by `mode`
    pub fn harmonize(
        mode: DatasetMode,
        koi: Option<&DataFrame>,
        tess: Option<&DataFrame>,
    ) -> Result<HarmonizedTable> {
        let missing = |what: &str| ExomapError::DataError(format!("{what} catalog required for mode '{mode}'"));
        match mode {
            DatasetMode::Koi => Self::harmonize_koi(koi.ok_or_else(|| missing("KOI"))?),
            DatasetMode::Tess => Self::harmonize_tess(tess.ok_or_else(|| missing("TESS"))?),
            DatasetMode::Both => Self::harmonize_both(
                koi.ok_or_else(|| missing("KOI"))?,
                tess.ok_or_else(|| missing("TESS"))?,
            ),
        }
    }

    /// KOI rows on the full KOI feature set
    pub fn harmonize_koi(frame: &DataFrame) -> Result<HarmonizedTable> {
        Self::harmonize_single(frame, &CatalogSchema::koi(), DatasetMode::Koi)
    }

    /// TESS rows on the full TOI feature set
    pub fn harmonize_tess(frame: &DataFrame) -> Result<HarmonizedTable> {
        Self::harmonize_single(frame, &CatalogSchema::tess(), DatasetMode::Tess)
    }

    fn harmonize_single(
        frame: &DataFrame,
        schema: &CatalogSchema,
        mode: DatasetMode,
    ) -> Result<HarmonizedTable> {
        let mapping: Vec<(&str, &str)> = schema.features.iter().map(|f| (*f, *f)).collect();
        let features: Vec<String> = schema.features.iter().map(|f| f.to_string()).collect();

        check_columns(frame, schema, &schema.required_columns())?;
        let (labelled, unlabeled) = prepare(frame, schema, &mapping)?;
        finish(labelled, mode, features, unlabeled)
    }

    /// KOI then TESS rows on the sorted shared schema
    pub fn harmonize_both(koi: &DataFrame, tess: &DataFrame) -> Result<HarmonizedTable> {
        let koi_schema = CatalogSchema::koi();
        let tess_schema = CatalogSchema::tess();

        check_columns(koi, &koi_schema, &koi_schema.required_shared_columns())?;
        check_columns(tess, &tess_schema, &tess_schema.required_shared_columns())?;

        let features = shared_features(&koi_schema, &tess_schema);
        if features.is_empty() {
            return Err(ExomapError::NoSharedFeatures);
        }

        let (koi_rows, koi_unlabeled) = prepare(koi, &koi_schema, koi_schema.shared_map)?;
        let (tess_rows, tess_unlabeled) = prepare(tess, &tess_schema, tess_schema.shared_map)?;

        let order = output_order(&features);
        let combined = koi_rows
            .select(order.iter().cloned())?
            .vstack(&tess_rows.select(order.iter().cloned())?)?;

        finish(
            combined,
            DatasetMode::Both,
            features,
            koi_unlabeled + tess_unlabeled,
        )
    }
}

fn check_columns(frame: &DataFrame, schema: &CatalogSchema, required: &[&str]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| frame.column(col).is_err())
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ExomapError::MissingColumns {
            catalog: schema.source.to_string(),
            columns: missing,
        })
    }
}

/// Coerce mapped features, normalize the label, tag the source, carry the
/// identifiers, and drop rows outside the label set.
fn prepare(
    frame: &DataFrame,
    schema: &CatalogSchema,
    mapping: &[(&str, &str)],
) -> Result<(DataFrame, usize)> {
    let n = frame.height();
    let mut columns: Vec<Column> = Vec::with_capacity(mapping.len() + 2 + IDENTIFIER_COLUMNS.len());

    for (raw, name) in mapping {
        let mut col = numeric_column(frame.column(raw)?)?;
        col.rename((*name).into());
        columns.push(col);
    }

    let target = frame.column(schema.target)?.cast(&DataType::String)?;
    let disposition: StringChunked = target
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.and_then(Disposition::normalize).map(Disposition::as_str))
        .collect();
    columns.push(disposition.with_name(DISPOSITION_COLUMN.into()).into_series().into());

    columns.push(Column::new(
        SOURCE_COLUMN.into(),
        vec![schema.source.as_str(); n],
    ));

    for name in IDENTIFIER_COLUMNS {
        let col = match frame.column(name) {
            Ok(existing) => {
                let mut col = existing.cast(&DataType::String)?;
                col.rename(name.into());
                col
            }
            Err(_) => Series::full_null(name.into(), n, &DataType::String).into(),
        };
        columns.push(col);
    }

    let df = DataFrame::new(columns)?;
    let labelled_mask = df.column(DISPOSITION_COLUMN)?.as_materialized_series().is_not_null();
    let labelled = df.filter(&labelled_mask)?;
    let unlabeled = n - labelled.height();

    if unlabeled > 0 {
        info!(
            catalog = %schema.source,
            rows = unlabeled,
            "Dropped rows outside CONFIRMED/CANDIDATE"
        );
    }
    Ok((labelled, unlabeled))
}

/// Float64 view of a feature; text is trimmed first so padded exports parse
fn numeric_column(col: &Column) -> Result<Column> {
    if col.dtype() != &DataType::String {
        return Ok(col.cast(&DataType::Float64)?);
    }
    let trimmed: StringChunked = col
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim))
        .collect();
    let trimmed: Column = trimmed.with_name(col.name().clone()).into_series().into();
    Ok(trimmed.cast(&DataType::Float64)?)
}

fn output_order(features: &[String]) -> Vec<String> {
    features
        .iter()
        .cloned()
        .chain([DISPOSITION_COLUMN.to_string(), SOURCE_COLUMN.to_string()])
        .chain(IDENTIFIER_COLUMNS.iter().map(|s| s.to_string()))
        .collect()
}

/// Drop rows with a missing or non-finite feature and wrap the result
fn finish(
    frame: DataFrame,
    mode: DatasetMode,
    features: Vec<String>,
    unlabeled_rows: usize,
) -> Result<HarmonizedTable> {
    let before = frame.height();
    let mut keep = vec![true; before];

    for name in &features {
        for (i, v) in float_values(&frame, name)?.into_iter().enumerate() {
            if !matches!(v, Some(x) if x.is_finite()) {
                keep[i] = false;
            }
        }
    }
    for name in [DISPOSITION_COLUMN, SOURCE_COLUMN] {
        for (i, v) in string_values(&frame, name)?.into_iter().enumerate() {
            if v.is_none() {
                keep[i] = false;
            }
        }
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let frame = frame.filter(&mask)?;
    let dropped_rows = before - frame.height();

    if dropped_rows > 0 {
        warn!(rows = dropped_rows, "Dropped rows with missing feature values");
    }
    if frame.height() == 0 {
        return Err(ExomapError::EmptyDataset(format!(
            "mode '{mode}': {unlabeled_rows} unlabeled, {dropped_rows} incomplete"
        )));
    }

    info!(
        mode = %mode,
        rows = frame.height(),
        features = features.len(),
        unlabeled = unlabeled_rows,
        dropped = dropped_rows,
        "Harmonized catalog"
    );

    Ok(HarmonizedTable {
        frame,
        mode,
        features,
        dropped_rows,
        unlabeled_rows,
    })
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df.column(name)?.cast(&DataType::Float64)?;
    Ok(col.as_materialized_series().f64()?.into_iter().collect())
}

fn optional_float_values(df: &DataFrame, name: &str, n: usize) -> Result<Vec<Option<f64>>> {
    if df.column(name).is_err() {
        return Ok(vec![None; n]);
    }
    float_values(df, name)
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df.column(name)?.cast(&DataType::String)?;
    Ok(col
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn koi_frame() -> DataFrame {
        let mut columns = vec![Column::new(
            "koi_disposition".into(),
            vec!["CONFIRMED", "CANDIDATE", "FALSE POSITIVE", "CONFIRMED"],
        )];
        for (j, name) in CatalogSchema::koi().features.iter().enumerate() {
            let values: Vec<Option<String>> = (0..4)
                .map(|i| {
                    if *name == "koi_teq" && i == 3 {
                        None
                    } else {
                        Some(format!("{}", (i + 1) as f64 * (j + 1) as f64))
                    }
                })
                .collect();
            columns.push(Column::new((*name).into(), values));
        }
        columns.push(Column::new("kepid".into(), vec!["1", "2", "3", "4"]));
        columns.push(Column::new("kepoi_name".into(), vec!["K00001.01", "", "K3", "K4"]));
        DataFrame::new(columns).unwrap()
    }

    fn tess_frame() -> DataFrame {
        let mut columns = vec![Column::new(
            "tfopwg_disp".into(),
            vec!["PC", "CP", "KP", "FP", "CF"],
        )];
        for name in CatalogSchema::tess().features {
            let values: Vec<&str> = vec!["1.5", "2.5", "3.5", "4.5", "n/a"];
            columns.push(Column::new((*name).into(), values));
        }
        columns.push(Column::new("toi".into(), vec!["101.01", "102.01", "103.01", "104.01", "105.01"]));
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn test_harmonize_koi_drops_unlabeled_and_missing() {
        let table = Harmonizer::harmonize_koi(&koi_frame()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.unlabeled_rows, 1);
        assert_eq!(table.dropped_rows, 1);
        assert_eq!(table.feature_names().len(), 14);

        let counts = table.label_counts().unwrap();
        assert_eq!(counts, LabelCounts { total: 2, confirmed: 1, candidate: 1 });
    }

    #[test]
    fn test_candidates_carry_identifiers() {
        let table = Harmonizer::harmonize_koi(&koi_frame()).unwrap();
        let candidates = table.candidates().unwrap();
        assert_eq!(candidates[0].source, Source::Koi);
        assert_eq!(candidates[0].ids.kepid.as_deref(), Some("1"));
        assert_eq!(candidates[0].ids.kepoi_name.as_deref(), Some("K00001.01"));
        assert_eq!(candidates[1].ids.kepoi_name, None);
        assert_eq!(candidates[0].ids.toi, None);
        // koi_prad is the 5th feature: (row 1) * (col 5)
        assert_eq!(candidates[0].radius, Some(5.0));
    }

    #[test]
    fn test_harmonize_tess_unparseable_is_missing() {
        let table = Harmonizer::harmonize_tess(&tess_frame()).unwrap();
        // PC, CP kept; KP, FP unlabeled; CF row has "n/a" features
        assert_eq!(table.len(), 2);
        assert_eq!(table.unlabeled_rows, 2);
        assert_eq!(table.dropped_rows, 1);
        let matrix = table.feature_matrix().unwrap();
        assert_eq!(matrix[0], vec![1.5; 11]);
    }

    #[test]
    fn test_padded_feature_text_is_parsed() {
        let mut columns = vec![Column::new("tfopwg_disp".into(), vec!["PC", " CP "])];
        for name in CatalogSchema::tess().features {
            columns.push(Column::new((*name).into(), vec![" 1.5", "2.5 "]));
        }
        let df = DataFrame::new(columns).unwrap();

        let table = Harmonizer::harmonize_tess(&df).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.dropped_rows, 0);
        let matrix = table.feature_matrix().unwrap();
        assert_eq!(matrix[0], vec![1.5; 11]);
        assert_eq!(matrix[1], vec![2.5; 11]);
    }

    #[test]
    fn test_harmonize_both_orders_sources() {
        let table = Harmonizer::harmonize_both(&koi_frame(), &tess_frame()).unwrap();
        assert_eq!(table.mode(), DatasetMode::Both);
        assert_eq!(table.feature_names()[0], "depth_ppm");
        assert_eq!(table.len(), 4);

        let sources: Vec<Source> = table.candidates().unwrap().iter().map(|c| c.source).collect();
        assert_eq!(sources, vec![Source::Koi, Source::Koi, Source::Tess, Source::Tess]);
    }

    #[test]
    fn test_missing_columns_listed() {
        let df = DataFrame::new(vec![Column::new("koi_disposition".into(), vec!["CONFIRMED"])]).unwrap();
        match Harmonizer::harmonize_koi(&df) {
            Err(ExomapError::MissingColumns { catalog, columns }) => {
                assert_eq!(catalog, "KOI");
                assert_eq!(columns.len(), 14);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_all_rows_filtered_is_empty_dataset() {
        let mut df = tess_frame();
        df.replace(
            "tfopwg_disp",
            Series::new("tfopwg_disp".into(), vec!["FP"; 5]),
        )
        .unwrap();
        assert!(matches!(
            Harmonizer::harmonize_tess(&df),
            Err(ExomapError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_mode_requires_frames() {
        assert!(Harmonizer::harmonize(DatasetMode::Both, Some(&koi_frame()), None).is_err());
        assert!(Harmonizer::harmonize(DatasetMode::Tess, None, Some(&tess_frame())).is_ok());
    }
}
