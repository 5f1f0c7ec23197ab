//! Per-point records consumed by the viewer

use crate::catalog::{Candidate, Disposition, Source};
use crate::error::{ExomapError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// One projected candidate as written to the points file.
///
/// Field order is the JSON key order the viewer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub source: Source,
    /// 1 = confirmed, 0 = candidate
    pub actual_label: u8,
    pub actual_label_name: Disposition,
    /// -1 marks noise
    pub cluster: i32,
    pub kepid: String,
    pub kepler_name: String,
    pub kepoi_name: String,
    pub toi: String,
    pub tid: String,
    pub tic: String,
    pub toi_name: String,
    /// Planet radius in Earth radii
    pub prad_re: Option<f64>,
    /// Equilibrium temperature in kelvin
    pub teq_k: Option<f64>,
}

impl PointRecord {
    pub fn new(candidate: &Candidate, coords: [f64; 3], cluster: i32) -> Self {
        let ids = &candidate.ids;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();

        Self {
            x: coords[0],
            y: coords[1],
            z: coords[2],
            source: candidate.source,
            actual_label: candidate.disposition.label(),
            actual_label_name: candidate.disposition,
            cluster,
            kepid: text(&ids.kepid),
            kepler_name: text(&ids.kepler_name),
            kepoi_name: text(&ids.kepoi_name),
            toi: text(&ids.toi),
            tid: text(&ids.tid),
            tic: text(&ids.tic),
            toi_name: text(&ids.toi_name),
            prad_re: candidate.radius.filter(|v| v.is_finite()),
            teq_k: candidate.temperature.filter(|v| v.is_finite()),
        }
    }
}

/// Zip rows, coordinates and cluster labels into records
pub fn build_records(
    candidates: &[Candidate],
    coords: &[[f64; 3]],
    labels: &[i32],
) -> Result<Vec<PointRecord>> {
    let n = candidates.len();
    if coords.len() != n || labels.len() != n {
        return Err(ExomapError::ShapeError {
            expected: format!("{n} coordinates and {n} labels"),
            actual: format!("{} coordinates and {} labels", coords.len(), labels.len()),
        });
    }

    Ok(candidates
        .iter()
        .zip(coords)
        .zip(labels)
        .map(|((c, &xyz), &label)| PointRecord::new(c, xyz, label))
        .collect())
}

/// Write records as one flat JSON array
pub fn write_points(path: impl AsRef<Path>, records: &[PointRecord]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

pub fn read_points(path: impl AsRef<Path>) -> Result<Vec<PointRecord>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Identifiers;

    fn tess_candidate() -> Candidate {
        Candidate {
            source: Source::Tess,
            disposition: Disposition::Confirmed,
            ids: Identifiers {
                toi: Some("101.01".to_string()),
                tid: Some("231663901".to_string()),
                ..Default::default()
            },
            radius: Some(13.9),
            temperature: None,
        }
    }

    #[test]
    fn test_record_fields() {
        let record = PointRecord::new(&tess_candidate(), [1.0, 2.0, 3.0], -1);
        assert_eq!(record.actual_label, 1);
        assert_eq!(record.kepid, "");
        assert_eq!(record.toi, "101.01");
        assert_eq!(record.cluster, -1);
        assert_eq!(record.teq_k, None);
    }

    #[test]
    fn test_json_key_order_and_nulls() {
        let record = PointRecord::new(&tess_candidate(), [1.0, 2.0, 3.0], 4);
        let json = serde_json::to_string(&record).unwrap();

        let keys = [
            "\"x\"", "\"y\"", "\"z\"", "\"source\"", "\"actual_label\"", "\"actual_label_name\"",
            "\"cluster\"", "\"kepid\"", "\"kepler_name\"", "\"kepoi_name\"", "\"toi\"", "\"tid\"",
            "\"tic\"", "\"toi_name\"", "\"prad_re\"", "\"teq_k\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(json.contains("\"source\":\"TESS\""));
        assert!(json.contains("\"actual_label_name\":\"CONFIRMED\""));
        assert!(json.contains("\"teq_k\":null"));
    }

    #[test]
    fn test_build_records_length_mismatch() {
        let candidates = vec![tess_candidate(), tess_candidate()];
        let err = build_records(&candidates, &[[0.0; 3]], &[0, 0]).unwrap_err();
        assert!(matches!(err, ExomapError::ShapeError { .. }));
    }

    #[test]
    fn test_write_points_is_flat_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.json");
        let records = build_records(&[tess_candidate()], &[[0.5, -0.5, 0.0]], &[2]).unwrap();
        write_points(&path, &records).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(1));
        assert_eq!(read_points(&path).unwrap(), records);
    }
}
