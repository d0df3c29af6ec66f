// ==========================================
// 教学成绩与选课系统 - 教学班仓储
// ==========================================
// 职责: teaching_class 表的查询与状态维护
// 红线: enrolled_count 的增减只允许选课仓储在事务内执行，
//       本仓储不提供计数写接口
// ==========================================

use crate::domain::enrollment::TeachingClass;
use crate::domain::types::TeachingClassStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// TeachingClassRepository - 教学班仓储
// ==========================================
pub struct TeachingClassRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TeachingClassRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建教学班 (enrolled_count 从 0 开始)
    pub fn create(
        &self,
        class_id: &str,
        name: &str,
        course_id: &str,
        capacity: i64,
        status: TeachingClassStatus,
    ) -> RepositoryResult<()> {
        if capacity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "capacity".to_string(),
                message: format!("容量必须为正整数，实际为 {}", capacity),
            });
        }

        let conn = self.get_conn()?;
        let now_str = Utc::now().naive_utc().format(DATETIME_FMT).to_string();

        conn.execute(
            r#"INSERT INTO teaching_class (
                class_id, name, course_id, capacity, enrolled_count,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 0, ?, ?, ?)"#,
            params![
                class_id,
                name,
                course_id,
                capacity,
                status.to_db_str(),
                &now_str,
                &now_str,
            ],
        )?;

        Ok(())
    }

    /// 按ID查询教学班
    pub fn find_by_id(&self, class_id: &str) -> RepositoryResult<Option<TeachingClass>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT class_id, name, course_id, capacity, enrolled_count,
                      status, created_at, updated_at
               FROM teaching_class
               WHERE class_id = ?"#,
            params![class_id],
            Self::map_row,
        ) {
            Ok(tc) => Ok(Some(tc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 更新教学班状态 (开放选课 / 截止 / 取消等管理操作)
    pub fn update_status(
        &self,
        class_id: &str,
        status: TeachingClassStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now_str = Utc::now().naive_utc().format(DATETIME_FMT).to_string();

        let rows_affected = conn.execute(
            "UPDATE teaching_class SET status = ?, updated_at = ? WHERE class_id = ?",
            params![status.to_db_str(), &now_str, class_id],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "TeachingClass".to_string(),
                id: class_id.to_string(),
            });
        }
        Ok(())
    }

    /// 映射数据库行到 TeachingClass 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<TeachingClass> {
        let status_str: String = row.get(5)?;
        Ok(TeachingClass {
            class_id: row.get(0)?,
            name: row.get(1)?,
            course_id: row.get(2)?,
            capacity: row.get(3)?,
            enrolled_count: row.get(4)?,
            status: TeachingClassStatus::from_db_str(&status_str),
            created_at: parse_datetime(row, 6)?,
            updated_at: parse_datetime(row, 7)?,
        })
    }
}

fn parse_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
