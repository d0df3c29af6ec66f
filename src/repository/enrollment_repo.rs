// ==========================================
// 教学成绩与选课系统 - 选课记录仓储
// ==========================================
// 职责: course_enrollment 表与 teaching_class.enrolled_count 的
//       原子维护 (本仓储是 enrolled_count 的唯一写入方)
// 并发: 容量检查与计数递增合并为一条条件更新
//       (UPDATE ... SET enrolled_count = enrolled_count + 1
//        WHERE enrolled_count < capacity)，
//       配合 IMMEDIATE 事务，两个并发选课争抢最后一个名额时
//       至多一个能成功
// ==========================================

use crate::domain::enrollment::CourseEnrollment;
use crate::domain::types::{EnrollmentStatus, TeachingClassStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const ENROLLMENT_COLUMNS: &str = "enrollment_id, student_id, teaching_class_id, status, \
     enrolled_at, dropped_at, completed_at";

// ==========================================
// CourseEnrollmentRepository - 选课仓储
// ==========================================
pub struct CourseEnrollmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CourseEnrollmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 选课 (原子)
    ///
    /// 在一个 IMMEDIATE 事务内依次完成:
    /// 1. 读取教学班状态 (非 OPEN_FOR_ENROLLMENT → ClassNotEnrollable)
    /// 2. 查重 (已有 ENROLLED 记录 → AlreadyEnrolled)
    /// 3. 条件递增 enrolled_count (命中 0 行 → ClassFull)
    /// 4. 插入 ENROLLED 选课记录
    ///
    /// IMMEDIATE 事务使 SQLite 写者串行化，检查与递增之间
    /// 不存在其他写入者可插入的窗口
    pub fn enroll(&self, student_id: &str, class_id: &str) -> RepositoryResult<CourseEnrollment> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let enrollment = Self::enroll_in_tx(&tx, student_id, class_id)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(enrollment)
    }

    fn enroll_in_tx(
        tx: &Transaction,
        student_id: &str,
        class_id: &str,
    ) -> RepositoryResult<CourseEnrollment> {
        // 1. 教学班状态
        let row: Option<(String, i64)> = tx
            .query_row(
                "SELECT status, capacity FROM teaching_class WHERE class_id = ?",
                params![class_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (status_str, capacity) = row.ok_or_else(|| RepositoryError::NotFound {
            entity: "TeachingClass".to_string(),
            id: class_id.to_string(),
        })?;

        let status = TeachingClassStatus::from_db_str(&status_str);
        if !status.can_enroll() {
            return Err(RepositoryError::ClassNotEnrollable {
                class_id: class_id.to_string(),
                status: status.to_string(),
            });
        }

        // 2. 查重: 任意时刻同一 (student, class) 至多一条 ENROLLED
        let already: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM course_enrollment
                 WHERE student_id = ? AND teaching_class_id = ? AND status = 'ENROLLED'",
                params![student_id, class_id],
                |row| row.get(0),
            )
            .optional()?;
        if already.is_some() {
            return Err(RepositoryError::AlreadyEnrolled {
                student_id: student_id.to_string(),
                class_id: class_id.to_string(),
            });
        }

        // 3. 容量检查与递增合并为一条条件更新 (存储层原子)
        let rows_affected = tx.execute(
            "UPDATE teaching_class
             SET enrolled_count = enrolled_count + 1
             WHERE class_id = ? AND enrolled_count < capacity",
            params![class_id],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::ClassFull {
                class_id: class_id.to_string(),
                capacity,
            });
        }

        // 4. 插入选课记录
        let enrollment_id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        tx.execute(
            r#"INSERT INTO course_enrollment (
                enrollment_id, student_id, teaching_class_id, status,
                enrolled_at, dropped_at, completed_at
            ) VALUES (?, ?, ?, 'ENROLLED', ?, NULL, NULL)"#,
            params![
                &enrollment_id,
                student_id,
                class_id,
                now.format(DATETIME_FMT).to_string(),
            ],
        )?;

        Ok(CourseEnrollment {
            enrollment_id,
            student_id: student_id.to_string(),
            teaching_class_id: class_id.to_string(),
            status: EnrollmentStatus::Enrolled,
            enrolled_at: now,
            dropped_at: None,
            completed_at: None,
        })
    }

    /// 退课 (原子)
    ///
    /// ENROLLED → DROPPED，设置 dropped_at，递减 enrolled_count
    /// (下限为 0，防御性)
    pub fn drop_enrollment(
        &self,
        student_id: &str,
        class_id: &str,
    ) -> RepositoryResult<CourseEnrollment> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let sql = format!(
            "SELECT {} FROM course_enrollment
             WHERE student_id = ? AND teaching_class_id = ? AND status = 'ENROLLED'",
            ENROLLMENT_COLUMNS
        );
        let enrollment: Option<CourseEnrollment> = tx
            .query_row(&sql, params![student_id, class_id], Self::map_row)
            .optional()?;

        let mut enrollment = enrollment.ok_or_else(|| RepositoryError::NotEnrolled {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
        })?;

        let now = Utc::now().naive_utc();
        tx.execute(
            "UPDATE course_enrollment
             SET status = 'DROPPED', dropped_at = ?
             WHERE enrollment_id = ?",
            params![now.format(DATETIME_FMT).to_string(), &enrollment.enrollment_id],
        )?;

        Self::decrement_enrolled_count(&tx, class_id)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        enrollment.status = EnrollmentStatus::Dropped;
        enrollment.dropped_at = Some(now);
        Ok(enrollment)
    }

    /// 管理性状态转移 (COMPLETED / FAILED 等)
    ///
    /// 转移合法性按 `EnrollmentStatus::can_transition_to` 校验;
    /// 前态为 ENROLLED 且后态不再计入容量时，同事务递减 enrolled_count
    pub fn update_status(
        &self,
        enrollment_id: &str,
        new_status: EnrollmentStatus,
    ) -> RepositoryResult<CourseEnrollment> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let sql = format!(
            "SELECT {} FROM course_enrollment WHERE enrollment_id = ?",
            ENROLLMENT_COLUMNS
        );
        let enrollment: Option<CourseEnrollment> = tx
            .query_row(&sql, params![enrollment_id], Self::map_row)
            .optional()?;

        let mut enrollment = enrollment.ok_or_else(|| RepositoryError::NotFound {
            entity: "CourseEnrollment".to_string(),
            id: enrollment_id.to_string(),
        })?;

        let old_status = enrollment.status;
        if !old_status.can_transition_to(new_status) {
            return Err(RepositoryError::InvalidStateTransition {
                from: old_status.to_string(),
                to: new_status.to_string(),
            });
        }

        // PENDING → ENROLLED 属于选课，必须走查重 + 容量检查路径
        if old_status == EnrollmentStatus::Pending && new_status == EnrollmentStatus::Enrolled {
            let already: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM course_enrollment
                     WHERE student_id = ? AND teaching_class_id = ? AND status = 'ENROLLED'",
                    params![&enrollment.student_id, &enrollment.teaching_class_id],
                    |row| row.get(0),
                )
                .optional()?;
            if already.is_some() {
                return Err(RepositoryError::AlreadyEnrolled {
                    student_id: enrollment.student_id.clone(),
                    class_id: enrollment.teaching_class_id.clone(),
                });
            }

            let rows_affected = tx.execute(
                "UPDATE teaching_class
                 SET enrolled_count = enrolled_count + 1
                 WHERE class_id = ? AND enrolled_count < capacity",
                params![&enrollment.teaching_class_id],
            )?;
            if rows_affected == 0 {
                let capacity: i64 = tx.query_row(
                    "SELECT capacity FROM teaching_class WHERE class_id = ?",
                    params![&enrollment.teaching_class_id],
                    |row| row.get(0),
                )?;
                return Err(RepositoryError::ClassFull {
                    class_id: enrollment.teaching_class_id.clone(),
                    capacity,
                });
            }
        }

        let now = Utc::now().naive_utc();
        let now_str = now.format(DATETIME_FMT).to_string();
        match new_status {
            EnrollmentStatus::Completed => {
                tx.execute(
                    "UPDATE course_enrollment SET status = ?, completed_at = ? WHERE enrollment_id = ?",
                    params![new_status.to_db_str(), &now_str, enrollment_id],
                )?;
                enrollment.completed_at = Some(now);
            }
            EnrollmentStatus::Dropped => {
                tx.execute(
                    "UPDATE course_enrollment SET status = ?, dropped_at = ? WHERE enrollment_id = ?",
                    params![new_status.to_db_str(), &now_str, enrollment_id],
                )?;
                enrollment.dropped_at = Some(now);
            }
            _ => {
                tx.execute(
                    "UPDATE course_enrollment SET status = ? WHERE enrollment_id = ?",
                    params![new_status.to_db_str(), enrollment_id],
                )?;
            }
        }

        // 前态 ENROLLED 且脱离 ENROLLED → 释放名额
        if old_status == EnrollmentStatus::Enrolled && new_status != EnrollmentStatus::Enrolled {
            Self::decrement_enrolled_count(&tx, &enrollment.teaching_class_id)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        enrollment.status = new_status;
        Ok(enrollment)
    }

    /// 查询学生的全部选课记录
    pub fn find_by_student_id(&self, student_id: &str) -> RepositoryResult<Vec<CourseEnrollment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM course_enrollment WHERE student_id = ? ORDER BY enrolled_at",
            ENROLLMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![student_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 查询教学班的全部选课记录
    pub fn find_by_class_id(&self, class_id: &str) -> RepositoryResult<Vec<CourseEnrollment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM course_enrollment WHERE teaching_class_id = ? ORDER BY enrolled_at",
            ENROLLMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![class_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 学生当前是否在某教学班处于 ENROLLED 状态
    pub fn is_enrolled(&self, student_id: &str, class_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM course_enrollment
                 WHERE student_id = ? AND teaching_class_id = ? AND status = 'ENROLLED'",
                params![student_id, class_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 教学班当前 ENROLLED 记录数 (用于与 enrolled_count 一致性核对)
    pub fn count_enrolled(&self, class_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM course_enrollment
             WHERE teaching_class_id = ? AND status = 'ENROLLED'",
            params![class_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 递减 enrolled_count，下限为 0
    ///
    /// 命中 0 行说明计数已经为 0，属于计数漂移 (其他路径的 bug)，
    /// 记录 warn 日志但不向调用方报错
    fn decrement_enrolled_count(tx: &Transaction, class_id: &str) -> RepositoryResult<()> {
        let rows_affected = tx.execute(
            "UPDATE teaching_class
             SET enrolled_count = enrolled_count - 1
             WHERE class_id = ? AND enrolled_count > 0",
            params![class_id],
        )?;
        if rows_affected == 0 {
            tracing::warn!(class_id, "enrolled_count 已为 0，跳过递减");
        }
        Ok(())
    }

    /// 映射数据库行到 CourseEnrollment 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CourseEnrollment> {
        let status_str: String = row.get(3)?;
        Ok(CourseEnrollment {
            enrollment_id: row.get(0)?,
            student_id: row.get(1)?,
            teaching_class_id: row.get(2)?,
            status: EnrollmentStatus::from_db_str(&status_str),
            enrolled_at: parse_datetime(row, 4)?,
            dropped_at: parse_optional_datetime(row, 5)?,
            completed_at: parse_optional_datetime(row, 6)?,
        })
    }
}

fn parse_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_optional_datetime(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) => NaiveDateTime::parse_from_str(&s, DATETIME_FMT)
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
        None => Ok(None),
    }
}
