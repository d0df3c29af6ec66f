// ==========================================
// 选课容量测试
// ==========================================
// 职责: 验证容量约束在并发选课/退课下的正确性
// ==========================================


#[cfg(test)]
mod enrollment_capacity_test {
    use grade_system::domain::EnrollmentStatus;
    use grade_system::engine::enrollment::EnrollmentEngine;
    use grade_system::repository::error::RepositoryError;
    use grade_system::repository::{CourseEnrollmentRepository, TeachingClassRepository};
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{
        count_enrollments_with_status, create_test_db, open_shared_conn, read_enrolled_count,
        seed_class,
    };

    // ==========================================
    // 测试辅助函数
    // ==========================================

    struct TestEnv {
        _temp_file: NamedTempFile,
        conn: Arc<Mutex<Connection>>,
        engine: Arc<EnrollmentEngine>,
        enrollment_repo: Arc<CourseEnrollmentRepository>,
    }

    fn setup_test_env() -> TestEnv {
        let (temp_file, db_path) = create_test_db().unwrap();
        let conn = open_shared_conn(&db_path);
        let enrollment_repo = Arc::new(CourseEnrollmentRepository::new(conn.clone()));
        let class_repo = Arc::new(TeachingClassRepository::new(conn.clone()));
        let engine = Arc::new(EnrollmentEngine::new(
            enrollment_repo.clone(),
            class_repo,
        ));
        TestEnv {
            _temp_file: temp_file,
            conn,
            engine,
            enrollment_repo,
        }
    }

    // ==========================================
    // 测试1: 容量竞争 - capacity=1, N 个并发选课
    // ==========================================

    #[test]
    fn test_capacity_race_single_seat() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 1, "OPEN_FOR_ENROLLMENT");

        let n = 8;
        let mut handles = Vec::new();
        for i in 0..n {
            let engine = env.engine.clone();
            handles.push(thread::spawn(move || {
                engine.enroll(&format!("S{:03}", i), "TC001")
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ok_count = results.iter().filter(|r| r.is_ok()).count();
        let full_count = results
            .iter()
            .filter(|r| matches!(r.as_ref().err(), Some(RepositoryError::ClassFull { .. })))
            .count();

        // 恰好 1 个成功，其余 ClassFull
        assert_eq!(ok_count, 1);
        assert_eq!(full_count, n - 1);
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 1);
        assert_eq!(
            count_enrollments_with_status(&env.conn, "TC001", "ENROLLED"),
            1
        );
    }

    // ==========================================
    // 测试2: 选课-退课往返恢复容量
    // ==========================================

    #[test]
    fn test_enroll_drop_round_trip() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");

        env.engine.enroll("S001", "TC001").unwrap();
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 1);

        let outcome = env.engine.drop_enrollment("S001", "TC001").unwrap();
        assert_eq!(outcome.enrollment.status, EnrollmentStatus::Dropped);
        assert!(outcome.enrollment.dropped_at.is_some());

        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 0);
        assert_eq!(
            count_enrollments_with_status(&env.conn, "TC001", "DROPPED"),
            1
        );
        assert_eq!(
            count_enrollments_with_status(&env.conn, "TC001", "ENROLLED"),
            0
        );
    }

    // ==========================================
    // 测试3: 重复选课被拒绝，计数只加一次
    // ==========================================

    #[test]
    fn test_duplicate_enrollment_rejected() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");

        env.engine.enroll("S001", "TC001").unwrap();
        let err = env.engine.enroll("S001", "TC001").unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyEnrolled { .. }));
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 1);
    }

    // ==========================================
    // 测试4: 退课后可重新选课
    // ==========================================

    #[test]
    fn test_reenroll_after_drop() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");

        env.engine.enroll("S001", "TC001").unwrap();
        env.engine.drop_enrollment("S001", "TC001").unwrap();
        env.engine.enroll("S001", "TC001").unwrap();

        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 1);
        // 历史记录保留: 一条 DROPPED + 一条 ENROLLED
        assert_eq!(
            count_enrollments_with_status(&env.conn, "TC001", "DROPPED"),
            1
        );
        assert_eq!(
            count_enrollments_with_status(&env.conn, "TC001", "ENROLLED"),
            1
        );
    }

    // ==========================================
    // 测试5: 非开放状态的教学班拒绝选课
    // ==========================================

    #[test]
    fn test_closed_class_rejects_enrollment() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "ENROLLMENT_CLOSED");

        let err = env.engine.enroll("S001", "TC001").unwrap_err();
        assert!(matches!(err, RepositoryError::ClassNotEnrollable { .. }));
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 0);
    }

    // ==========================================
    // 测试6: 未选课的退课返回 NotEnrolled
    // ==========================================

    #[test]
    fn test_drop_without_enrollment() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");

        let err = env.engine.drop_enrollment("S001", "TC001").unwrap_err();
        assert!(matches!(err, RepositoryError::NotEnrolled { .. }));
    }

    // ==========================================
    // 测试6b: 开课后不再接受退课
    // ==========================================

    #[test]
    fn test_drop_blocked_after_class_starts() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");
        env.engine.enroll("S001", "TC001").unwrap();

        {
            let guard = env.conn.lock().unwrap();
            guard
                .execute(
                    "UPDATE teaching_class SET status = 'ACTIVE' WHERE class_id = 'TC001'",
                    [],
                )
                .unwrap();
        }

        let err = env.engine.drop_enrollment("S001", "TC001").unwrap_err();
        assert!(matches!(err, RepositoryError::ClassNotWithdrawable { .. }));
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 1);

        // 选课截止但未开课时仍可退课
        {
            let guard = env.conn.lock().unwrap();
            guard
                .execute(
                    "UPDATE teaching_class SET status = 'ENROLLMENT_CLOSED' WHERE class_id = 'TC001'",
                    [],
                )
                .unwrap();
        }
        env.engine.drop_enrollment("S001", "TC001").unwrap();
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 0);
    }

    // ==========================================
    // 测试7: 管理性状态转移
    // ==========================================

    #[test]
    fn test_administrative_status_transitions() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");

        let outcome = env.engine.enroll("S001", "TC001").unwrap();
        let enrollment_id = outcome.enrollment.enrollment_id.clone();

        // ENROLLED → COMPLETED 释放容量并记录完成时间
        let completed = env
            .engine
            .update_status(&enrollment_id, EnrollmentStatus::Completed)
            .unwrap();
        assert_eq!(completed.status, EnrollmentStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 0);

        // 终态之后不允许再转移
        let err = env
            .engine
            .update_status(&enrollment_id, EnrollmentStatus::Enrolled)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidStateTransition { .. }));
    }

    // ==========================================
    // 测试7b: 状态机拒绝回退转移与重复 ENROLLED
    // ==========================================
    // 若允许 ENROLLED → PENDING 回退，再次选课后把 PENDING 行
    // 转回 ENROLLED，同一 (student, class) 会出现两条 ENROLLED
    // 记录且 enrolled_count 被重复计入

    #[test]
    fn test_pending_roundtrip_cannot_mint_duplicate_enrolled() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");

        let outcome = env.engine.enroll("S001", "TC001").unwrap();
        let enrollment_id = outcome.enrollment.enrollment_id.clone();

        // 回退转移被拒绝，计数不变
        let err = env
            .engine
            .update_status(&enrollment_id, EnrollmentStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidStateTransition { .. }));
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 1);
        assert_eq!(
            count_enrollments_with_status(&env.conn, "TC001", "ENROLLED"),
            1
        );
    }

    #[test]
    fn test_pending_activation_rejects_existing_enrolled() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");

        env.engine.enroll("S001", "TC001").unwrap();

        // 同一 (student, class) 的历史 PENDING 行
        {
            let guard = env.conn.lock().unwrap();
            guard
                .execute(
                    "INSERT INTO course_enrollment
                     (enrollment_id, student_id, teaching_class_id, status,
                      enrolled_at, dropped_at, completed_at)
                     VALUES ('E-PENDING', 'S001', 'TC001', 'PENDING',
                             '2026-03-01 08:00:00', NULL, NULL)",
                    [],
                )
                .unwrap();
        }

        let err = env
            .enrollment_repo
            .update_status("E-PENDING", EnrollmentStatus::Enrolled)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyEnrolled { .. }));

        // 仍然只有一条 ENROLLED，计数未被重复计入
        assert_eq!(
            count_enrollments_with_status(&env.conn, "TC001", "ENROLLED"),
            1
        );
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 1);
    }

    #[test]
    fn test_pending_activation_takes_capacity_path() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");

        {
            let guard = env.conn.lock().unwrap();
            guard
                .execute(
                    "INSERT INTO course_enrollment
                     (enrollment_id, student_id, teaching_class_id, status,
                      enrolled_at, dropped_at, completed_at)
                     VALUES ('E-PENDING', 'S001', 'TC001', 'PENDING',
                             '2026-03-01 08:00:00', NULL, NULL)",
                    [],
                )
                .unwrap();
        }

        let activated = env
            .enrollment_repo
            .update_status("E-PENDING", EnrollmentStatus::Enrolled)
            .unwrap();
        assert_eq!(activated.status, EnrollmentStatus::Enrolled);
        assert_eq!(read_enrolled_count(&env.conn, "TC001"), 1);
    }

    // ==========================================
    // 测试8: 并发选课+退课的混合场景下计数一致
    // ==========================================

    #[test]
    fn test_mixed_concurrent_enroll_and_drop() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 5, "OPEN_FOR_ENROLLMENT");

        // 先占 3 个座位
        for i in 0..3 {
            env.engine.enroll(&format!("X{:03}", i), "TC001").unwrap();
        }

        let mut handles = Vec::new();
        // 3 个退课 + 6 个新选课并发
        for i in 0..3 {
            let engine = env.engine.clone();
            handles.push(thread::spawn(move || {
                engine.drop_enrollment(&format!("X{:03}", i), "TC001").map(|_| ())
            }));
        }
        for i in 0..6 {
            let engine = env.engine.clone();
            handles.push(thread::spawn(move || {
                engine.enroll(&format!("S{:03}", i), "TC001").map(|_| ())
            }));
        }
        for h in handles {
            // 新选课可能因瞬时满员失败，这里只关心不变量
            let _ = h.join().unwrap();
        }

        let enrolled = count_enrollments_with_status(&env.conn, "TC001", "ENROLLED");
        let count = read_enrolled_count(&env.conn, "TC001");
        // enrolled_count 必须与 ENROLLED 记录数一致，且不超过容量
        assert_eq!(count, enrolled);
        assert!(count <= 5);
    }

    // ==========================================
    // 测试9: is_enrolled / 列表查询
    // ==========================================

    #[test]
    fn test_enrollment_queries() {
        let env = setup_test_env();
        seed_class(&env.conn, "TC001", "C001", 30, "OPEN_FOR_ENROLLMENT");
        seed_class(&env.conn, "TC002", "C002", 30, "OPEN_FOR_ENROLLMENT");

        env.engine.enroll("S001", "TC001").unwrap();
        env.engine.enroll("S001", "TC002").unwrap();
        env.engine.enroll("S002", "TC001").unwrap();

        assert!(env.enrollment_repo.is_enrolled("S001", "TC001").unwrap());
        assert!(!env.enrollment_repo.is_enrolled("S002", "TC002").unwrap());

        let by_student = env.enrollment_repo.find_by_student_id("S001").unwrap();
        assert_eq!(by_student.len(), 2);
        let by_class = env.enrollment_repo.find_by_class_id("TC001").unwrap();
        assert_eq!(by_class.len(), 2);
    }
}
