// ==========================================
// 成绩 API 测试
// ==========================================
// 职责: 验证 API 层的参数校验、DTO 组装与错误转换
// ==========================================


#[cfg(test)]
mod grade_api_test {
    use grade_system::api::grade_api::{
        GradeApi, GradeBatchItem, GradeCreateRequest, GradeUpdateRequest,
    };
    use grade_system::api::ApiError;
    use grade_system::engine::grade_update::GradeUpdateEngine;
    use grade_system::engine::lock_manager::LockManager;
    use grade_system::engine::recalc::RecalcEngine;
    use grade_system::repository::grade_repo::GradeRecordRepository;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{create_test_db, open_shared_conn};

    fn setup_test_env() -> (NamedTempFile, Arc<GradeApi>) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let conn = open_shared_conn(&db_path);
        let grade_repo = Arc::new(GradeRecordRepository::new(conn));
        let update_engine = Arc::new(GradeUpdateEngine::new(grade_repo.clone()));
        let lock_manager = Arc::new(LockManager::new());
        let recalc_engine = Arc::new(RecalcEngine::new(
            grade_repo.clone(),
            lock_manager,
            Duration::from_millis(200),
        ));
        let api = Arc::new(GradeApi::new(grade_repo, update_engine, recalc_engine));
        (temp_file, api)
    }

    fn create_req(student: &str, course: &str) -> GradeCreateRequest {
        GradeCreateRequest {
            student_id: student.to_string(),
            course_id: course.to_string(),
            usual_score: Some(80.0),
            mid_score: Some(70.0),
            experiment_score: Some(90.0),
            final_exam_score: Some(60.0),
        }
    }

    #[test]
    fn test_create_and_get_grade() {
        let (_tmp, api) = setup_test_env();

        let created = api.create_grade(&create_req("S001", "C001")).unwrap();
        assert_eq!(created.version, 1);
        assert_eq!(created.final_score, Some(70.0));
        assert_eq!(created.gpa, Some(2.0));

        let fetched = api.get_grade(&created.id).unwrap();
        assert_eq!(fetched.student_id, "S001");

        let by_pair = api.get_grade_by_student_and_course("S001", "C001").unwrap();
        assert_eq!(by_pair.id, created.id);
    }

    #[test]
    fn test_get_missing_grade_is_not_found() {
        let (_tmp, api) = setup_test_env();
        let err = api.get_grade("no-such-id").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_blank_id_is_invalid_input() {
        let (_tmp, api) = setup_test_env();
        let err = api.get_grade("  ").unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_update_grade_version_conflict_maps_to_api_error() {
        let (_tmp, api) = setup_test_env();
        let created = api.create_grade(&create_req("S001", "C001")).unwrap();

        let req = GradeUpdateRequest {
            usual_score: Some(85.0),
            mid_score: None,
            experiment_score: None,
            final_exam_score: None,
            version: Some(1),
            unconditional: false,
        };
        api.update_grade(&created.id, &req).unwrap();

        // 再次携带过期版本
        let err = api.update_grade(&created.id, &req).unwrap_err();
        assert!(matches!(err, ApiError::VersionConflict(_)));
        assert!(err.is_retryable_conflict());
    }

    #[test]
    fn test_missing_version_is_validation_error() {
        let (_tmp, api) = setup_test_env();
        let created = api.create_grade(&create_req("S001", "C001")).unwrap();

        let req = GradeUpdateRequest {
            usual_score: Some(85.0),
            mid_score: None,
            experiment_score: None,
            final_exam_score: None,
            version: None,
            unconditional: false,
        };
        let err = api.update_grade(&created.id, &req).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_batch_update_reports_per_item_errors() {
        let (_tmp, api) = setup_test_env();

        let g1 = api.create_grade(&create_req("S001", "C001")).unwrap();
        let g2 = api.create_grade(&create_req("S002", "C001")).unwrap();

        let items = vec![
            GradeBatchItem {
                grade_id: g1.id.clone(),
                update: GradeUpdateRequest {
                    usual_score: Some(88.0),
                    mid_score: None,
                    experiment_score: None,
                    final_exam_score: None,
                    version: Some(1),
                    unconditional: false,
                },
            },
            GradeBatchItem {
                grade_id: g2.id.clone(),
                update: GradeUpdateRequest {
                    usual_score: Some(88.0),
                    mid_score: None,
                    experiment_score: None,
                    final_exam_score: None,
                    version: Some(42), // 过期版本
                    unconditional: false,
                },
            },
        ];

        let report = api.batch_update_grades(&items).unwrap();
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.errors[0].id, g2.id);
    }

    #[test]
    fn test_course_list_with_average() {
        let (_tmp, api) = setup_test_env();

        api.create_grade(&create_req("S001", "C001")).unwrap();
        // 第二条分项不同: final = 0.2*100 + 0.3*100 + 0.1*100 + 0.4*100 = 100
        api.create_grade(&GradeCreateRequest {
            student_id: "S002".to_string(),
            course_id: "C001".to_string(),
            usual_score: Some(100.0),
            mid_score: Some(100.0),
            experiment_score: Some(100.0),
            final_exam_score: Some(100.0),
        })
        .unwrap();
        // 第三条缺分项，不计入平均
        api.create_grade(&GradeCreateRequest {
            student_id: "S003".to_string(),
            course_id: "C001".to_string(),
            usual_score: Some(50.0),
            mid_score: None,
            experiment_score: None,
            final_exam_score: None,
        })
        .unwrap();

        let resp = api.list_course_grades("C001").unwrap();
        assert_eq!(resp.grades.len(), 3);
        // (70 + 100) / 2 = 85
        assert!((resp.average_final_score.unwrap() - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_student_list_with_average_gpa() {
        let (_tmp, api) = setup_test_env();

        api.create_grade(&create_req("S001", "C001")).unwrap(); // gpa 2.0
        api.create_grade(&GradeCreateRequest {
            student_id: "S001".to_string(),
            course_id: "C002".to_string(),
            usual_score: Some(100.0),
            mid_score: Some(100.0),
            experiment_score: Some(100.0),
            final_exam_score: Some(100.0),
        })
        .unwrap(); // gpa 4.0

        let resp = api.list_student_grades("S001").unwrap();
        assert_eq!(resp.grades.len(), 2);
        assert!((resp.average_gpa.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recalculate_course_via_api() {
        let (_tmp, api) = setup_test_env();
        api.create_grade(&create_req("S001", "C001")).unwrap();

        let resp = api.recalculate_course("C001").unwrap();
        assert_eq!(resp.scanned, 1);
        assert_eq!(resp.updated, 0); // 派生字段本就一致
    }
}
