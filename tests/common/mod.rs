#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const HEADER: &str = "data_inversa,latitude,longitude,causa_acidente";

/// Write `contents` to `name` inside a fresh temporary directory.
/// Keep the returned TempDir alive for as long as the file is needed.
pub fn write_csv(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("Failed to write fixture");
    (dir, path)
}

/// A source with the standard header followed by `rows`.
pub fn accidents_csv(rows: &[&str]) -> (TempDir, PathBuf) {
    let mut contents = String::from(HEADER);
    contents.push('\n');
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    write_csv("acidentes.csv", &contents)
}

const CAUSES: [&str; 5] = [
    "Falta de atenção do condutor",
    "Velocidade incompatível",
    "Ingestão de álcool",
    "Desobediência às normas de trânsito",
    "Pista escorregadia",
];

/// `n` deterministic rows, every fifth one outside the bounding box and every seventh
/// one without a date.
pub fn generated_rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let date = if i % 7 == 0 {
                String::new()
            } else {
                format!("{:02}/{:02}/{}", i % 28 + 1, i % 12 + 1, 2017 + i % 5)
            };
            let latitude = if i % 5 == 0 {
                12.5
            } else {
                -33.0 + (i % 370) as f64 / 10.0
            };
            let longitude = -73.0 + (i % 430) as f64 / 10.0;
            format!("{},{},{},{}", date, latitude, longitude, CAUSES[i % CAUSES.len()])
        })
        .collect()
}

pub fn generated_csv(n: usize) -> (TempDir, PathBuf) {
    let rows = generated_rows(n);
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    accidents_csv(&refs)
}
