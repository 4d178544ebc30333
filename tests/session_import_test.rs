// ==========================================
// ArArCalc 会话导入集成测试
// ==========================================
// 测试目标: 报表切分 → 实体图写入的完整流程
// ==========================================

mod test_helpers;

use chrono::Duration;
use test_helpers::{count, create_test_db, import_sheet, test_date, ArArSheet};
use wiscar_import::domain::AnalysisKind;
use wiscar_import::importer::ImportError;
use wiscar_import::logging;
use wiscar_import::repository::EntityRepository;

#[test]
fn test_three_steps_fusion_only() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();

    let session = import_sheet(&mut db, &ArArSheet::new("WA-01"), test_date()).unwrap();

    let conn = db.connection();
    assert_eq!(count(conn, "sample"), 1);
    assert_eq!(count(conn, "session"), 1);
    assert_eq!(count(conn, "analysis"), 4);
    assert_eq!(session.date, test_date());
    assert_eq!(session.date_precision.as_deref(), Some("day"));

    let repo = EntityRepository::new(conn);
    let analyses = repo.analyses_for_session(session.id).unwrap();
    let steps: Vec<_> = analyses
        .iter()
        .filter(|a| a.kind == AnalysisKind::HeatingStep)
        .collect();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0].session_index, Some(0));
    assert_eq!(steps[2].session_index, Some(2));
    assert_eq!(steps[1].in_plateau, Some(true));
    assert_eq!(steps[0].analysis_name.as_deref(), Some("4D"));
    assert!(analyses.iter().all(|a| a.kind != AnalysisKind::AgePlateau));

    // 步骤变量 + 7 个同位素/百分比 + Age + K/Ca
    let step_data = repo.data_for_analysis(steps[0].id).unwrap();
    assert_eq!(step_data.len(), 10);
    let age = step_data.iter().find(|d| d.parameter == "Age").unwrap();
    assert_eq!(age.error, Some(0.42));
    assert_eq!(age.error_metric.as_deref(), Some("2s"));
    let ar36 = step_data.iter().find(|d| d.parameter == "36Ar(a)").unwrap();
    assert_eq!(ar36.error_metric.as_deref(), Some("1s"));
    assert_eq!(ar36.unit.as_deref(), Some("fA"));

    let fusion = analyses
        .iter()
        .find(|a| a.kind == AnalysisKind::TotalFusionAge)
        .unwrap();
    assert!(fusion.is_interpreted);
    assert_eq!(fusion.session_index, None);
    assert_eq!(fusion.data.as_ref().unwrap()["MSWD"], 1.21);

    let fusion_data = repo.data_for_analysis(fusion.id).unwrap();
    assert_eq!(fusion_data.len(), 3);
    let age = fusion_data
        .iter()
        .find(|d| d.parameter == "total_fusion_age")
        .unwrap();
    assert_eq!(age.value, 12.40);
    assert_eq!(age.error, Some(0.05));
    assert_eq!(age.error_metric.as_deref(), Some("2s"));
    assert_eq!(age.unit.as_deref(), Some("Ma"));
}

#[test]
fn test_reimport_is_idempotent() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    let sheet = ArArSheet::new("WA-01").with_plateau("12.38 ± 0.04 Ma");

    let first = import_sheet(&mut db, &sheet, test_date()).unwrap();
    let datum_count = count(db.connection(), "datum");
    let second = import_sheet(&mut db, &sheet, test_date()).unwrap();

    let conn = db.connection();
    assert_eq!(first.id, second.id);
    assert_eq!(count(conn, "sample"), 1);
    assert_eq!(count(conn, "instrument"), 1);
    assert_eq!(count(conn, "method"), 1);
    assert_eq!(count(conn, "session"), 1);
    assert_eq!(count(conn, "analysis"), 5);
    assert_eq!(count(conn, "datum"), datum_count);
    assert_eq!(count(conn, "parameter"), 14);
}

#[test]
fn test_changed_mtime_creates_new_session() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    let sheet = ArArSheet::new("WA-01");

    import_sheet(&mut db, &sheet, test_date()).unwrap();
    import_sheet(&mut db, &sheet, test_date() + Duration::hours(2)).unwrap();

    let conn = db.connection();
    assert_eq!(count(conn, "sample"), 1);
    assert_eq!(count(conn, "session"), 2);
}

#[test]
fn test_laser_power_classification() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();

    let session = import_sheet(
        &mut db,
        &ArArSheet::new("WA-02").with_steps(&[1.5, 3.0, 6.0, 100.0]),
        test_date(),
    )
    .unwrap();

    let repo = EntityRepository::new(db.connection());
    let step = &repo.analyses_for_session(session.id).unwrap()[0];
    let data = repo.data_for_analysis(step.id).unwrap();
    let power = data.iter().find(|d| d.parameter == "power").unwrap();
    assert_eq!(power.unit.as_deref(), Some("%"));
    assert!(data.iter().all(|d| d.parameter != "Tstep"));
}

#[test]
fn test_temperature_classification() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();

    // 单个值 > 100 即整列判定为温度
    let session = import_sheet(
        &mut db,
        &ArArSheet::new("WA-03").with_steps(&[50.0, 90.0, 1400.0]),
        test_date(),
    )
    .unwrap();

    let repo = EntityRepository::new(db.connection());
    let step = &repo.analyses_for_session(session.id).unwrap()[0];
    let data = repo.data_for_analysis(step.id).unwrap();
    let temp = data.iter().find(|d| d.parameter == "Tstep").unwrap();
    assert_eq!(temp.value, 50.0);
    assert_eq!(temp.unit.as_deref(), Some("°C"));
}

#[test]
fn test_general_info_constants_and_session_data() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    let sheet = ArArSheet::new("WA-04")
        .with_info("J-value", "0.0012345 ± 0.0000012")
        .with_info("Standard (AC)", "28.5 ± 0.1 Ma")
        .with_info("Irradiation ID", "UW102-3")
        .with_info("Analyst", "BRJ");

    let session = import_sheet(&mut db, &sheet, test_date()).unwrap();

    let repo = EntityRepository::new(db.connection());
    let constants = repo.constants_for_session(session.id).unwrap();
    assert_eq!(constants.len(), 2);
    let j = constants.iter().find(|c| c.name == "J").unwrap();
    assert_eq!(j.value, 0.0012345);
    let standard = constants.iter().find(|c| c.name == "standard_age").unwrap();
    assert_eq!(standard.label.as_deref(), Some("FC"));
    assert_eq!(standard.unit.as_deref(), Some("Ma"));

    let stored = repo.sessions_for_sample(session.sample_id).unwrap();
    assert_eq!(stored[0].data["Irradiation ID"], "UW102-3");
    assert_eq!(stored[0].data["Analyst"], "BRJ");

    // 常数不计入分析
    assert_eq!(count(db.connection(), "analysis"), 4);
}

#[test]
fn test_standard_label_correction_to_ac() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    let sheet = ArArSheet::new("WA-05").with_info("Standard (FC)", "1.15 ± 0.01 Ma");

    let session = import_sheet(&mut db, &sheet, test_date()).unwrap();

    let constants = EntityRepository::new(db.connection())
        .constants_for_session(session.id)
        .unwrap();
    assert_eq!(constants[0].label.as_deref(), Some("AC"));
}

#[test]
fn test_missing_fusion_age_rolls_back() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();

    let err = import_sheet(&mut db, &ArArSheet::new("WA-06").without_fusion(), test_date())
        .unwrap_err();
    assert!(matches!(err, ImportError::DataExtraction(_)));

    let conn = db.connection();
    assert_eq!(count(conn, "sample"), 0);
    assert_eq!(count(conn, "session"), 0);
    assert_eq!(count(conn, "analysis"), 0);
}

#[test]
fn test_malformed_age_is_parse_error() {
    logging::init_test();
    let (_dir, mut db) = create_test_db();
    let sheet = ArArSheet::new("WA-07").with_plateau("12.38 Ma");

    let err = import_sheet(&mut db, &sheet, test_date()).unwrap_err();
    assert!(matches!(err, ImportError::Parse { .. }));
    assert_eq!(count(db.connection(), "session"), 0);
}
