mod common;

use acidentes::ingest::{
    load, load_with_options, load_with_report, BoundingBox, IngestOptions, LoadError,
};
use chrono::NaiveDate;
use common::{accidents_csv, generated_csv, write_csv};

#[test]
fn test_keeps_in_bounds_rows_and_nulls_bad_dates() {
    let (_dir, path) = accidents_csv(&[
        "2020-01-15,-23.5,-46.6,Speeding",
        "2020-01-16,40.0,-46.6,Speeding",
        ",-23.5,-46.6,Other",
    ]);

    let table = load(&path).unwrap();
    assert_eq!(table.len(), 2);

    let first = table.get(0).unwrap();
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2020, 1, 15));
    assert_eq!(first.latitude, -23.5);
    assert_eq!(first.longitude, -46.6);
    assert_eq!(table.cause_label(first), Some("Speeding"));

    let second = table.get(1).unwrap();
    assert_eq!(second.date, None);
    assert_eq!(table.cause_label(second), Some("Other"));
}

#[test]
fn test_every_kept_row_is_inside_the_box() {
    let (_dir, path) = accidents_csv(&[
        "2020-01-01,-34.0,-74.0,Corner",
        "2020-01-01,5.0,-29.0,Corner",
        "2020-01-01,-34.01,-50.0,Just south",
        "2020-01-01,5.01,-50.0,Just north",
        "2020-01-01,-10.0,-74.01,Just west",
        "2020-01-01,-10.0,-28.99,Just east",
        "2020-01-01,,-50.0,No latitude",
        "2020-01-01,-10.0,,No longitude",
        "2020-01-01,abc,-50.0,Garbage",
        "2020-01-01,-10.0,-50.0,Inside",
    ]);

    let table = load(&path).unwrap();
    let bounds = BoundingBox::BRAZIL;
    assert_eq!(table.len(), 3);
    for record in &table {
        assert!(bounds.contains(record.latitude, record.longitude));
        assert!((-34.0..=5.0).contains(&record.latitude));
        assert!((-74.0..=-29.0).contains(&record.longitude));
    }
}

#[test]
fn test_chunk_size_does_not_change_the_result() {
    let (_dir, path) = generated_csv(1_000);
    let reference = load(&path).unwrap();
    assert!(!reference.is_empty());

    for chunk_size in [1, 2, 3, 7, 100, 999, 1_000, 1_001] {
        let options = IngestOptions::new().with_chunk_size(chunk_size);
        let table = load_with_options(&path, &options).unwrap();
        assert_eq!(table, reference, "chunk size {}", chunk_size);
    }
}

#[test]
fn test_row_count_multiple_of_chunk_size() {
    let (_dir, path) = generated_csv(40);
    let options = IngestOptions::new().with_chunk_size(10);
    let (table, report) = load_with_report(&path, &options).unwrap();
    assert_eq!(report.rows_read, 40);
    assert_eq!(table.len(), report.rows_kept);
    assert!((4..=5).contains(&report.chunks), "chunks: {}", report.chunks);
}

#[test]
fn test_report_counts() {
    let (_dir, path) = generated_csv(100);
    let (table, report) =
        load_with_report(&path, &IngestOptions::new().with_chunk_size(30)).unwrap();

    // Every fifth row lies outside the box; every seventh has no date.
    assert_eq!(report.rows_read, 100);
    assert_eq!(report.rows_dropped, 20);
    assert_eq!(report.rows_kept, 80);
    assert_eq!(table.len(), 80);
    let expected_null_dates = (0..100).filter(|i| i % 7 == 0 && i % 5 != 0).count();
    assert_eq!(report.null_dates, expected_null_dates);
    assert_eq!(
        table.iter().filter(|r| r.date.is_none()).count(),
        expected_null_dates
    );
}

#[test]
fn test_missing_columns_is_a_data_format_error() {
    let (_dir, path) = write_csv(
        "partial.csv",
        "data_inversa,latitude,causa\n2020-01-15,-23.5,Speeding\n",
    );
    match load(&path) {
        Err(LoadError::DataFormat { missing, .. }) => {
            assert_eq!(missing, vec!["longitude".to_string(), "causa_acidente".to_string()]);
        }
        other => panic!("expected DataFormat, got {:?}", other),
    }
}

#[test]
fn test_empty_file_is_an_empty_source() {
    let (_dir, path) = write_csv("empty.csv", "");
    let err = load(&path).unwrap_err();
    assert!(matches!(err, LoadError::EmptySource { .. }), "got {:?}", err);
    assert!(err.is_data_format());
}

#[test]
fn test_header_only_gives_an_empty_table() {
    let (_dir, path) = write_csv("header.csv", "data_inversa,latitude,longitude,causa_acidente\n");
    let table = load(&path).unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_unreadable_sources_are_io_errors() {
    let (dir, _path) = write_csv("a.csv", "");
    let err = load(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }), "got {:?}", err);

    let err = load(&dir.path().join("missing.csv")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }), "got {:?}", err);
    assert!(!err.is_data_format());
}

#[test]
fn test_zero_chunk_size_is_rejected() {
    let (_dir, path) = generated_csv(3);
    let err = load_with_options(&path, &IngestOptions::new().with_chunk_size(0)).unwrap_err();
    assert!(matches!(err, LoadError::InvalidOptions(_)));
}

#[test]
fn test_quoted_fields_and_extra_columns() {
    let (_dir, path) = write_csv(
        "real.csv",
        "id,data_inversa,uf,causa_acidente,latitude,longitude,mortos\n\
         1,15/01/2020,SP,\"Reação tardia ou ineficiente do condutor, \"\"grave\"\"\",-23.5,-46.6,0\n\
         2,16/01/2020,RJ,Velocidade Incompatível,-22.9,-43.2,1\n",
    );
    let table = load(&path).unwrap();
    assert_eq!(table.len(), 2);
    let first = table.get(0).unwrap();
    assert_eq!(
        table.cause_label(first),
        Some("Reação tardia ou ineficiente do condutor, \"grave\"")
    );
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2020, 1, 15));
    assert_eq!(table.causes().len(), 2);
}

#[test]
fn test_semicolon_delimiter_and_decimal_comma() {
    let (_dir, path) = write_csv(
        "semicolon.csv",
        "data_inversa;latitude;longitude;causa_acidente\n\
         2021-03-01;-23,55;-46,63;Animais na Pista\n\
         2021-03-02;-15,78;-47,93;\n",
    );
    let options = IngestOptions::new().with_delimiter(b';');
    let table = load_with_options(&path, &options).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(0).unwrap().latitude, -23.55);
    assert_eq!(table.get(1).unwrap().cause, None);

    assert!(load(&path).is_err());
}

#[test]
fn test_custom_bounds() {
    let (_dir, path) = accidents_csv(&[
        "2020-01-15,-23.5,-46.6,São Paulo",
        "2020-01-15,-3.1,-60.0,Manaus",
    ]);
    let south_east = BoundingBox {
        min_latitude: -25.0,
        max_latitude: -19.0,
        min_longitude: -53.0,
        max_longitude: -39.0,
    };
    let table = load_with_options(&path, &IngestOptions::new().with_bounds(south_east)).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.cause_label(table.get(0).unwrap()), Some("São Paulo"));
}

#[test]
fn test_source_is_read_exactly_once_for_any_chunk_size() {
    let (_dir, path) = generated_csv(500);
    let file_len = std::fs::metadata(&path).unwrap().len();

    for chunk_size in [1, 7, 64, 1_000] {
        let options = IngestOptions::new().with_chunk_size(chunk_size);
        let (_table, report) = load_with_report(&path, &options).unwrap();
        assert_eq!(report.rows_read, 500);
        assert_eq!(report.bytes_scanned, file_len, "chunk size {}", chunk_size);
    }
}

#[test]
fn test_bom_header_and_embedded_newlines_across_chunks() {
    let (_dir, path) = write_csv(
        "bom.csv",
        "\u{feff}data_inversa,latitude,longitude,causa_acidente\n\
         2020-01-15,-23.5,-46.6,\"Pista\nescorregadia\"\n\
         2020-01-16,-22.9,-43.2,Chuva\n\
         2020-01-17,-15.8,-47.9,\"Falta de\r\natenção\"\n",
    );
    let reference = load(&path).unwrap();
    assert_eq!(reference.len(), 3);
    assert_eq!(
        reference.cause_label(reference.get(0).unwrap()),
        Some("Pista\nescorregadia")
    );
    assert_eq!(reference.get(2).unwrap().date, NaiveDate::from_ymd_opt(2020, 1, 17));

    for chunk_size in [1, 2, 3] {
        let options = IngestOptions::new().with_chunk_size(chunk_size);
        let (table, report) = load_with_report(&path, &options).unwrap();
        assert_eq!(table, reference, "chunk size {}", chunk_size);
        assert_eq!(report.rows_read, 3);
    }
}
