//! Synthetic KOI / TOI exports for integration tests

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const KOI_ROWS: usize = 40;
pub const TESS_ROWS: usize = 40;

/// KOI row `5` has no `koi_teq`
pub const KOI_MISSING_ROW: usize = 5;

fn noise(i: usize, k: f64) -> f64 {
    ((i as f64) * k).sin() * 0.5
}

/// Two well separated populations, picked by row parity
fn group(i: usize) -> f64 {
    (i % 2) as f64
}

pub fn koi_disposition(i: usize) -> &'static str {
    if i % 10 == 9 {
        "FALSE POSITIVE"
    } else if i % 3 == 0 {
        "CONFIRMED"
    } else {
        "CANDIDATE"
    }
}

pub fn tess_disposition(i: usize) -> &'static str {
    match i % 4 {
        1 => "CP",
        2 => "FP",
        _ => "PC",
    }
}

pub fn koi_csv() -> String {
    let mut out = String::new();
    out.push_str("# This file was produced by the NASA Exoplanet Archive\n");
    out.push_str("# COLUMN kepid: KepID\n");
    out.push_str(
        "kepid,kepoi_name,kepler_name,koi_disposition,koi_period,koi_time0bk,koi_duration,\
         koi_depth,koi_prad,koi_teq,koi_steff,koi_slogg,koi_srad,koi_kepmag,\
         koi_fpflag_nt,koi_fpflag_ss,koi_fpflag_co,koi_fpflag_ec\n",
    );

    for i in 0..KOI_ROWS {
        let g = group(i);
        let name = if koi_disposition(i) == "CONFIRMED" {
            format!("Kepler-{} b", 100 + i)
        } else {
            String::new()
        };
        let teq = if i == KOI_MISSING_ROW {
            String::new()
        } else {
            format!("{:.1}", 400.0 + 900.0 * g + 20.0 * noise(i, 1.3))
        };
        let _ = writeln!(
            out,
            "{},K{:05}.01,{},{},{:.4},{:.3},{:.3},{:.1},{:.3},{},{:.0},{:.3},{:.3},{:.3},0,0,0,0",
            10_000_000 + i,
            i + 1,
            name,
            koi_disposition(i),
            3.0 + 40.0 * g + noise(i, 0.7),
            130.0 + noise(i, 0.9),
            2.0 + 5.0 * g + noise(i, 1.1),
            500.0 + 3000.0 * g + 50.0 * noise(i, 1.7),
            1.5 + 8.0 * g + noise(i, 2.1),
            teq,
            5200.0 + 600.0 * g + 40.0 * noise(i, 0.3),
            4.4 - 0.3 * g + 0.05 * noise(i, 0.5),
            0.9 + 0.6 * g + 0.05 * noise(i, 2.3),
            14.0 - g + noise(i, 0.2),
        );
    }
    out
}

pub fn tess_csv() -> String {
    let mut out = String::new();
    out.push_str("# TOI export\n");
    out.push_str(
        "toi,tid,tfopwg_disp,pl_orbper,pl_trandurh,pl_trandep,pl_rade,pl_eqt,pl_insol,\
         st_teff,st_logg,st_rad,st_tmag,st_dist\n",
    );

    for i in 0..TESS_ROWS {
        let g = group(i);
        let _ = writeln!(
            out,
            "{}.01,{},{},{:.4},{:.3},{:.1},{:.3},{:.1},{:.2},{:.0},{:.3},{:.3},{:.3},{:.1}",
            1000 + i,
            200_000_000 + i,
            tess_disposition(i),
            2.5 + 38.0 * g + noise(i, 0.8),
            1.8 + 5.0 * g + noise(i, 1.2),
            600.0 + 2800.0 * g + 50.0 * noise(i, 1.6),
            1.4 + 8.5 * g + noise(i, 2.2),
            420.0 + 850.0 * g + 20.0 * noise(i, 1.4),
            50.0 + 900.0 * g + 10.0 * noise(i, 0.6),
            5150.0 + 650.0 * g + 40.0 * noise(i, 0.4),
            4.45 - 0.3 * g + 0.05 * noise(i, 0.55),
            0.95 + 0.55 * g + 0.05 * noise(i, 2.4),
            10.0 - g + noise(i, 0.25),
            120.0 + 200.0 * g + 5.0 * noise(i, 0.35),
        );
    }
    out
}

/// Write both catalogs into `dir`, returning (koi, tess) paths
pub fn write_catalogs(dir: &Path) -> (PathBuf, PathBuf) {
    let koi = dir.join("koi.csv");
    let tess = dir.join("toi.csv");
    std::fs::write(&koi, koi_csv()).unwrap();
    std::fs::write(&tess, tess_csv()).unwrap();
    (koi, tess)
}
