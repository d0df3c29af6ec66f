// ==========================================
// 应用集成测试
// ==========================================
// 职责: 验证 AppState 组装与 API 全链路
// ==========================================


#[cfg(test)]
mod app_integration_test {
    use grade_system::api::grade_api::{GradeCreateRequest, GradeUpdateRequest};
    use grade_system::api::{ApiError, EnrollRequest};
    use grade_system::app::{AppState, Collaborators};
    use grade_system::engine::enrollment::DirectoryLookup;
    use grade_system::engine::events::{EnrollmentEvent, EnrollmentEventPublisher};
    use rusqlite::params;
    use std::error::Error;
    use std::sync::{Arc, Mutex};

    use crate::test_helpers::create_test_db;

    struct StaticDirectory;

    impl DirectoryLookup for StaticDirectory {
        fn student_exists(&self, student_id: &str) -> bool {
            student_id.starts_with('S')
        }
        fn course_exists(&self, course_id: &str) -> bool {
            course_id.starts_with('C')
        }
    }

    struct RecordingPublisher {
        events: Mutex<Vec<EnrollmentEvent>>,
    }

    impl EnrollmentEventPublisher for RecordingPublisher {
        fn publish(&self, event: EnrollmentEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn seed_class(db_path: &str, class_id: &str, course_id: &str, capacity: i64) {
        let conn = grade_system::db::open_sqlite_connection(db_path).unwrap();
        conn.execute(
            "INSERT INTO teaching_class
             (class_id, name, course_id, capacity, enrolled_count, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, 'OPEN_FOR_ENROLLMENT',
                     datetime('now'), datetime('now'))",
            params![class_id, format!("{}-班", course_id), course_id, capacity],
        )
        .unwrap();
    }

    #[test]
    fn test_app_state_grade_flow() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path).unwrap();

        let created = state
            .grade_api
            .create_grade(&GradeCreateRequest {
                student_id: "S001".to_string(),
                course_id: "C001".to_string(),
                usual_score: Some(80.0),
                mid_score: Some(70.0),
                experiment_score: Some(90.0),
                final_exam_score: Some(60.0),
            })
            .unwrap();
        assert_eq!(created.gpa, Some(2.0));

        let updated = state
            .grade_api
            .update_grade(
                &created.id,
                &GradeUpdateRequest {
                    usual_score: None,
                    mid_score: None,
                    experiment_score: None,
                    final_exam_score: Some(100.0),
                    version: Some(1),
                    unconditional: false,
                },
            )
            .unwrap();
        assert_eq!(updated.version, 2);

        let recalc = state.grade_api.recalculate_course("C001").unwrap();
        assert_eq!(recalc.scanned, 1);
        assert_eq!(state.lock_manager.active_locks(), 0);
    }

    #[test]
    fn test_app_state_enrollment_flow_with_collaborators() {
        let (_tmp, db_path) = create_test_db().unwrap();
        seed_class(&db_path, "TC001", "C001", 2);

        let publisher = Arc::new(RecordingPublisher {
            events: Mutex::new(Vec::new()),
        });
        let state = AppState::with_collaborators(
            db_path,
            Collaborators {
                directory: Some(Arc::new(StaticDirectory)),
                event_publisher: Some(publisher.clone()),
            },
        )
        .unwrap();

        let resp = state
            .enrollment_api
            .enroll(&EnrollRequest {
                student_id: "S001".to_string(),
                teaching_class_id: "TC001".to_string(),
            })
            .unwrap();
        assert_eq!(resp.status, "ENROLLED");
        assert!(resp.warnings.is_empty());

        // 名册缺失的学生: 选课成功但带告警
        let with_warning = state
            .enrollment_api
            .enroll(&EnrollRequest {
                student_id: "X999".to_string(),
                teaching_class_id: "TC001".to_string(),
            })
            .unwrap();
        assert_eq!(with_warning.warnings.len(), 1);

        // 容量已满
        let err = state
            .enrollment_api
            .enroll(&EnrollRequest {
                student_id: "S003".to_string(),
                teaching_class_id: "TC001".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::ClassFull(_)));

        let class = state.enrollment_api.get_class("TC001").unwrap();
        assert_eq!(class.enrolled_count, 2);

        // 退课后事件共 3 条: 2 次选课 + 1 次退课
        state.enrollment_api.drop_enrollment("S001", "TC001").unwrap();
        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].course_id, "C001");
    }

    #[test]
    fn test_class_administration_flow() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path).unwrap();

        // capacity 缺省时取配置默认值
        let class = state
            .enrollment_api
            .create_class(&grade_system::api::ClassCreateRequest {
                class_id: "TC001".to_string(),
                name: "高等数学-1班".to_string(),
                course_id: "C001".to_string(),
                capacity: None,
            })
            .unwrap();
        assert_eq!(class.capacity, 50);
        assert_eq!(class.status, "PLANNED");

        // PLANNED 状态不可选课
        let err = state
            .enrollment_api
            .enroll(&EnrollRequest {
                student_id: "S001".to_string(),
                teaching_class_id: "TC001".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::ClassNotEnrollable(_)));

        // 开放选课后恢复正常
        let opened = state
            .enrollment_api
            .set_class_status("TC001", "OPEN_FOR_ENROLLMENT")
            .unwrap();
        assert_eq!(opened.status, "OPEN_FOR_ENROLLMENT");
        state
            .enrollment_api
            .enroll(&EnrollRequest {
                student_id: "S001".to_string(),
                teaching_class_id: "TC001".to_string(),
            })
            .unwrap();

        // 非法状态串被拒绝
        let err = state
            .enrollment_api
            .set_class_status("TC001", "NOT_A_STATUS")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_app_state_importer_wired() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let csv_path = dir.path().join("grades.csv");
        std::fs::write(
            &csv_path,
            "student_id,course_id,usual_score,mid_score,experiment_score,final_exam_score\nS001,C001,80,70,90,60\n",
        )
        .unwrap();

        let summary = state.grade_importer.import_csv(&csv_path).unwrap();
        assert_eq!(summary.created, 1);

        let grade = state
            .grade_api
            .get_grade_by_student_and_course("S001", "C001")
            .unwrap();
        assert_eq!(grade.final_score, Some(70.0));
    }
}
