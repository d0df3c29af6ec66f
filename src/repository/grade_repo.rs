// ==========================================
// 教学成绩与选课系统 - 成绩记录仓储
// ==========================================
// 职责: grade_record 表的数据访问
// 红线: Repository 不含业务逻辑; 派生字段由引擎层计算后传入
// 并发: 条件更新 (UPDATE ... WHERE id=? AND version=?) 在存储层
//       实现 compare-and-swap，不依赖应用内存中的检查
// ==========================================

use crate::domain::grade::GradeRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::{Arc, Mutex};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const GRADE_COLUMNS: &str = "id, student_id, course_id, usual_score, mid_score, \
     experiment_score, final_exam_score, final_score, gpa, version, created_at, updated_at";

/// 持久化一次成绩写入所需的全部字段 (引擎层组装)
///
/// 派生字段 final_score / gpa 必须与四个分项一致，由成绩引擎保证
#[derive(Debug, Clone)]
pub struct GradeWrite {
    pub usual_score: Option<f64>,
    pub mid_score: Option<f64>,
    pub experiment_score: Option<f64>,
    pub final_exam_score: Option<f64>,
    pub final_score: Option<f64>,
    pub gpa: Option<f64>,
}

// ==========================================
// GradeRecordRepository - 成绩记录仓储
// ==========================================
pub struct GradeRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl GradeRecordRepository {
    /// 创建新的成绩仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建成绩记录 (version 从 1 开始)
    ///
    /// # 错误
    /// - `RepositoryError::DuplicateRecord`: 该 (student_id, course_id) 已有记录
    pub fn create(
        &self,
        id: &str,
        student_id: &str,
        course_id: &str,
        write: &GradeWrite,
    ) -> RepositoryResult<GradeRecord> {
        let conn = self.get_conn()?;
        let now = Utc::now().naive_utc();
        let now_str = now.format(DATETIME_FMT).to_string();

        let result = conn.execute(
            r#"INSERT INTO grade_record (
                id, student_id, course_id,
                usual_score, mid_score, experiment_score, final_exam_score,
                final_score, gpa, version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)"#,
            params![
                id,
                student_id,
                course_id,
                write.usual_score,
                write.mid_score,
                write.experiment_score,
                write.final_exam_score,
                write.final_score,
                write.gpa,
                &now_str,
                &now_str,
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("UNIQUE") {
                    return Err(RepositoryError::DuplicateRecord {
                        student_id: student_id.to_string(),
                        course_id: course_id.to_string(),
                    });
                }
                return Err(e.into());
            }
        }

        Ok(GradeRecord {
            id: id.to_string(),
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            usual_score: write.usual_score,
            mid_score: write.mid_score,
            experiment_score: write.experiment_score,
            final_exam_score: write.final_exam_score,
            final_score: write.final_score,
            gpa: write.gpa,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// 按ID查询成绩记录
    ///
    /// 每次读取都命中数据库最新已提交状态 (无进程内缓存)，
    /// 乐观锁协议依赖这一新鲜度
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<GradeRecord>> {
        let conn = self.get_conn()?;

        let sql = format!("SELECT {} FROM grade_record WHERE id = ?", GRADE_COLUMNS);
        match conn.query_row(&sql, params![id], Self::map_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按 (student_id, course_id) 查询成绩记录
    pub fn find_by_student_and_course(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> RepositoryResult<Option<GradeRecord>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM grade_record WHERE student_id = ? AND course_id = ?",
            GRADE_COLUMNS
        );
        match conn.query_row(&sql, params![student_id, course_id], Self::map_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询学生的全部成绩记录
    pub fn find_by_student_id(&self, student_id: &str) -> RepositoryResult<Vec<GradeRecord>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM grade_record WHERE student_id = ? ORDER BY created_at",
            GRADE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![student_id], Self::map_row)?
            .collect::<Result<Vec<GradeRecord>, _>>()?;

        Ok(records)
    }

    /// 查询课程的全部成绩记录
    pub fn find_by_course_id(&self, course_id: &str) -> RepositoryResult<Vec<GradeRecord>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM grade_record WHERE course_id = ? ORDER BY created_at",
            GRADE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![course_id], Self::map_row)?
            .collect::<Result<Vec<GradeRecord>, _>>()?;

        Ok(records)
    }

    /// 带版本检查的更新 (乐观锁)
    ///
    /// # 并发控制
    /// 条件更新 `WHERE id = ? AND version = ?`: 两个携带同一
    /// expected_version 的并发写入，至多一个能命中该行，
    /// 另一个命中 0 行并返回 VersionConflict
    ///
    /// # 错误
    /// - `RepositoryError::VersionConflict`: version 不匹配 (已被其他调用方修改)
    /// - `RepositoryError::NotFound`: id 不存在
    pub fn update_checked(
        &self,
        id: &str,
        expected_version: i64,
        write: &GradeWrite,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let now_str = Utc::now().naive_utc().format(DATETIME_FMT).to_string();

        let rows_affected = conn.execute(
            r#"UPDATE grade_record
               SET usual_score = ?, mid_score = ?, experiment_score = ?,
                   final_exam_score = ?, final_score = ?, gpa = ?,
                   version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
            params![
                write.usual_score,
                write.mid_score,
                write.experiment_score,
                write.final_exam_score,
                write.final_score,
                write.gpa,
                &now_str,
                id,
                expected_version,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是version冲突
            let actual: Option<i64> = conn
                .query_row(
                    "SELECT version FROM grade_record WHERE id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;

            return match actual {
                Some(actual_version) => Err(RepositoryError::VersionConflict {
                    grade_id: id.to_string(),
                    expected: expected_version,
                    actual: actual_version,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "GradeRecord".to_string(),
                    id: id.to_string(),
                }),
            };
        }

        Ok(expected_version + 1)
    }

    /// 无条件更新 (last-writer-wins，仅限系统纠偏写入)
    ///
    /// 不检查 version，但仍然递增 version 以保持版本链单调
    pub fn update_unconditional(&self, id: &str, write: &GradeWrite) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let now_str = Utc::now().naive_utc().format(DATETIME_FMT).to_string();

        let rows_affected = conn.execute(
            r#"UPDATE grade_record
               SET usual_score = ?, mid_score = ?, experiment_score = ?,
                   final_exam_score = ?, final_score = ?, gpa = ?,
                   version = version + 1, updated_at = ?
               WHERE id = ?"#,
            params![
                write.usual_score,
                write.mid_score,
                write.experiment_score,
                write.final_exam_score,
                write.final_score,
                write.gpa,
                &now_str,
                id,
            ],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "GradeRecord".to_string(),
                id: id.to_string(),
            });
        }

        let new_version: i64 = conn.query_row(
            "SELECT version FROM grade_record WHERE id = ?",
            params![id],
            |row| row.get(0),
        )?;
        Ok(new_version)
    }

    /// 课程范围内重算派生字段 (单事务: 读-算-写)
    ///
    /// 返回 (扫描行数, 改写行数)
    pub fn recompute_derived_by_course<F>(
        &self,
        course_id: &str,
        recompute: F,
    ) -> RepositoryResult<(usize, usize)>
    where
        F: Fn(&GradeRecord) -> (Option<f64>, Option<f64>),
    {
        self.recompute_derived_where("course_id", course_id, recompute)
    }

    /// 学生范围内重算派生字段 (单事务: 读-算-写)
    pub fn recompute_derived_by_student<F>(
        &self,
        student_id: &str,
        recompute: F,
    ) -> RepositoryResult<(usize, usize)>
    where
        F: Fn(&GradeRecord) -> (Option<f64>, Option<f64>),
    {
        self.recompute_derived_where("student_id", student_id, recompute)
    }

    /// 系统纠偏写: 扫描与回写必须在同一 IMMEDIATE 事务内，
    /// 否则两次持锁之间提交的乐观编辑会被按旧读回写覆盖掉。
    /// 只改写派生字段，分项保持事务内读到的原值;
    /// 派生字段已一致的行跳过，改写的行递增 version
    fn recompute_derived_where<F>(
        &self,
        column: &str,
        value: &str,
        recompute: F,
    ) -> RepositoryResult<(usize, usize)>
    where
        F: Fn(&GradeRecord) -> (Option<f64>, Option<f64>),
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = format!(
            "SELECT {} FROM grade_record WHERE {} = ? ORDER BY created_at",
            GRADE_COLUMNS, column
        );
        let records = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params![value], Self::map_row)?
                .collect::<Result<Vec<GradeRecord>, _>>()?;
            rows
        };

        let now_str = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
        let mut updated = 0;
        for record in &records {
            let (final_score, gpa) = recompute(record);
            if final_score == record.final_score && gpa == record.gpa {
                continue;
            }

            tx.execute(
                r#"UPDATE grade_record
                   SET final_score = ?, gpa = ?,
                       version = version + 1, updated_at = ?
                   WHERE id = ?"#,
                params![final_score, gpa, &now_str, &record.id],
            )?;
            updated += 1;
        }
        tx.commit()?;

        Ok((records.len(), updated))
    }

    /// 课程平均总评成绩 (仅统计 final_score 非空的记录)
    pub fn course_average_final_score(&self, course_id: &str) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;

        let avg: Option<f64> = conn.query_row(
            "SELECT AVG(final_score) FROM grade_record WHERE course_id = ? AND final_score IS NOT NULL",
            params![course_id],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    /// 学生平均绩点
    pub fn student_average_gpa(&self, student_id: &str) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;

        let avg: Option<f64> = conn.query_row(
            "SELECT AVG(gpa) FROM grade_record WHERE student_id = ? AND gpa IS NOT NULL",
            params![student_id],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    /// 映射数据库行到 GradeRecord 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<GradeRecord> {
        Ok(GradeRecord {
            id: row.get(0)?,
            student_id: row.get(1)?,
            course_id: row.get(2)?,
            usual_score: row.get(3)?,
            mid_score: row.get(4)?,
            experiment_score: row.get(5)?,
            final_exam_score: row.get(6)?,
            final_score: row.get(7)?,
            gpa: row.get(8)?,
            version: row.get(9)?,
            created_at: parse_datetime(row, 10)?,
            updated_at: parse_datetime(row, 11)?,
        })
    }
}

fn parse_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
