// ==========================================
// 样品元数据导入集成测试
// ==========================================
// 测试目标: 样品遍的辐照一致性校验与属性写入、项目遍的文献/项目关联
// ==========================================

mod test_helpers;

use std::fs;
use test_helpers::{count, create_test_db, import_sheet, metadata_row, test_date, ArArSheet};
use wiscar_import::config::ImportOptions;
use wiscar_import::importer::{ImportError, MetadataImporter};
use wiscar_import::logging;
use wiscar_import::repository::EntityRepository;

fn importer(stop_on_error: bool) -> MetadataImporter {
    MetadataImporter::new(&ImportOptions {
        stop_on_error,
        ..Default::default()
    })
}

#[test]
fn test_irradiation_mismatch_is_consistency_error() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    let session = import_sheet(
        &mut db,
        &ArArSheet::new("WA-01").with_info("Irradiation ID", "UW102-3"),
        test_date(),
    )
    .unwrap();

    let mut row = metadata_row(1, "WA-01");
    row.irradiation = Some("UW999".to_string());
    row.longitude = Some(-110.5);
    row.latitude = Some(44.6);

    let summary = importer(false).import_rows(&mut db, &[row]).unwrap();
    assert_eq!(summary.samples, 0);
    assert_eq!(summary.failures.len(), 1);
    assert!(matches!(summary.failures[0].error, ImportError::Consistency(_)));
    assert!(summary.failures[0].error.to_string().contains("第 1 行"));

    // 分组已回滚，session 与样品保持原状
    let repo = EntityRepository::new(db.connection());
    let sample = repo.find_sample("WA-01").unwrap().unwrap();
    assert_eq!(sample.longitude, None);
    let sessions = repo.sessions_for_sample(sample.id).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0], session);
}

#[test]
fn test_every_row_of_group_is_validated() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    import_sheet(
        &mut db,
        &ArArSheet::new("WA-01").with_info("Irradiation ID", "UW102-3"),
        test_date(),
    )
    .unwrap();

    let mut first = metadata_row(1, "WA-01");
    first.irradiation = Some("UW102".to_string());
    let mut duplicate = metadata_row(2, "WA-01");
    duplicate.irradiation = Some("UW200".to_string());

    let summary = importer(false).import_rows(&mut db, &[first, duplicate]).unwrap();
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].error.to_string().contains("第 2 行"));
}

#[test]
fn test_stop_on_error_aborts() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    import_sheet(
        &mut db,
        &ArArSheet::new("WA-01").with_info("Irradiation ID", "UW102-3"),
        test_date(),
    )
    .unwrap();

    let mut bad = metadata_row(1, "WA-01");
    bad.irradiation = Some("UW999".to_string());
    let good = metadata_row(2, "WA-02");

    let err = importer(true).import_rows(&mut db, &[bad, good]).unwrap_err();
    assert!(matches!(err, ImportError::Consistency(_)));
    assert!(EntityRepository::new(db.connection())
        .find_sample("WA-02")
        .unwrap()
        .is_none());
}

#[test]
fn test_matching_irradiation_attaches_attributes() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    import_sheet(
        &mut db,
        &ArArSheet::new("WA-01").with_info("Irradiation ID", "UW102-3"),
        test_date(),
    )
    .unwrap();

    let mut row = metadata_row(1, "WA-01");
    row.irradiation = Some("UW102".to_string());
    row.longitude = Some(-110.5);
    row.latitude = Some(44.6);
    row.lithology = Some("Rhyolite".to_string());
    row.formation = Some("Lava Creek Tuff".to_string());
    row.member = Some("Member B".to_string());

    let summary = importer(false).import_rows(&mut db, &[row]).unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.samples, 1);

    let conn = db.connection();
    let sample = EntityRepository::new(conn).find_sample("WA-01").unwrap().unwrap();
    assert_eq!(sample.longitude, Some(-110.5));
    assert_eq!(sample.latitude, Some(44.6));
    assert!(sample.material_id.is_some());
    assert_eq!(count(conn, "geo_unit"), 2);
    assert_eq!(count(conn, "sample_geo_unit"), 2);
}

#[test]
fn test_malformed_cell_fails_only_its_sample() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    let data_dir = tempfile::tempdir().unwrap();
    let path = data_dir.path().join("samples.csv");
    fs::write(
        &path,
        "Sample,Longitude,Latitude,Title\n\
         WA-01,abc,44.6,Field guide\n\
         WA-02,-110.5,44.6,Field guide\n",
    )
    .unwrap();

    let summary = importer(false).import_file(&mut db, &path).unwrap();
    assert_eq!(summary.samples, 1);
    assert_eq!(summary.projects, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].group, "sample WA-01");
    assert!(matches!(summary.failures[0].error, ImportError::Parse { .. }));

    let conn = db.connection();
    let repo = EntityRepository::new(conn);
    assert!(repo.find_sample("WA-01").unwrap().is_none());
    let good = repo.find_sample("WA-02").unwrap().unwrap();
    assert_eq!(good.longitude, Some(-110.5));
    assert_eq!(count(conn, "project_sample"), 1);
}

#[test]
fn test_malformed_cell_with_stop_on_error_aborts_before_later_samples() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    let data_dir = tempfile::tempdir().unwrap();
    let path = data_dir.path().join("samples.csv");
    fs::write(&path, "Sample,Year\nWA-01,not-a-year\nWA-02,2019\n").unwrap();

    let err = importer(true).import_file(&mut db, &path).unwrap_err();
    assert!(matches!(err, ImportError::Parse { .. }));
    assert_eq!(count(db.connection(), "sample"), 0);
}

#[test]
fn test_partial_location_is_ignored() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();

    let mut row = metadata_row(1, "WA-09");
    row.longitude = Some(-110.5);

    importer(false).import_rows(&mut db, &[row]).unwrap();

    let sample = EntityRepository::new(db.connection())
        .find_sample("WA-09")
        .unwrap()
        .unwrap();
    assert_eq!(sample.longitude, None);
}

#[test]
fn test_project_pass_links_publication_samples_and_sessions() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    import_sheet(&mut db, &ArArSheet::new("WA-01"), test_date()).unwrap();
    import_sheet(&mut db, &ArArSheet::new("WA-02"), test_date()).unwrap();

    let title = "Eruptive history of the Yellowstone plateau volcanic field and its caldera";
    let rows: Vec<_> = ["WA-01", "WA-02", "WA-99"]
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let mut row = metadata_row(i + 1, sample);
            row.title = Some(title.to_string());
            row.doi_link = Some("https://doi.org/10.1130/B35432.1".to_string());
            if i == 1 {
                row.authors = Some("Smith; Jones; Brown".to_string());
                row.journal = Some("GSA Bulletin".to_string());
                row.year = Some(2019);
            }
            row
        })
        .collect();

    let summary = importer(false).import_rows(&mut db, &rows).unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.projects, 1);

    let conn = db.connection();
    assert_eq!(count(conn, "publication"), 1);
    assert_eq!(count(conn, "project"), 1);
    assert_eq!(count(conn, "project_publication"), 1);
    assert_eq!(count(conn, "project_sample"), 3);
    assert_eq!(count(conn, "project_session"), 2);

    let (name, doi, author, year): (String, Option<String>, Option<String>, Option<i32>) = conn
        .query_row(
            r#"
            SELECT p.name, pub.doi, pub.author, pub.year
            FROM project p
            JOIN project_publication pp ON pp.project_id = p.id
            JOIN publication pub ON pub.id = pp.publication_id
            "#,
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .unwrap();
    assert_eq!(name, "Smith et al.: Eruptive history of the Yellowstone plateau volcanic field...");
    assert_eq!(doi.as_deref(), Some("10.1130/B35432.1"));
    assert_eq!(author.as_deref(), Some("Smith; Jones; Brown"));
    assert_eq!(year, Some(2019));
}

#[test]
fn test_project_without_doi_keys_on_link() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();

    let mut row = metadata_row(1, "WA-01");
    row.title = Some("Field guide".to_string());
    row.doi_link = Some("https://example.org/guide".to_string());

    importer(false).import_rows(&mut db, &[row.clone()]).unwrap();
    importer(false).import_rows(&mut db, &[row]).unwrap();

    let conn = db.connection();
    assert_eq!(count(conn, "publication"), 1);
    let link: Option<String> = conn
        .query_row("SELECT link FROM publication WHERE doi IS NULL", [], |r| r.get(0))
        .unwrap();
    assert_eq!(link.as_deref(), Some("https://example.org/guide"));
}
