// ==========================================
// 教学成绩与选课系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 用于提示/告警（不做自动迁移），避免静默在旧库上运行导致隐性错误
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建库 (幂等)
///
/// - grade_record: (student_id, course_id) 唯一, version 单调递增
/// - teaching_class: capacity / enrolled_count 由选课仓储独占写入
/// - course_enrollment: 选课记录，允许同一 (student, class) 的历史多行
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS grade_record (
            id                TEXT PRIMARY KEY,
            student_id        TEXT NOT NULL,
            course_id         TEXT NOT NULL,
            usual_score       REAL,
            mid_score         REAL,
            experiment_score  REAL,
            final_exam_score  REAL,
            final_score       REAL,
            gpa               REAL,
            version           INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            UNIQUE (student_id, course_id)
        );
        CREATE INDEX IF NOT EXISTS idx_grade_record_student ON grade_record (student_id);
        CREATE INDEX IF NOT EXISTS idx_grade_record_course ON grade_record (course_id);

        CREATE TABLE IF NOT EXISTS teaching_class (
            class_id        TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            course_id       TEXT NOT NULL,
            capacity        INTEGER NOT NULL CHECK (capacity > 0),
            enrolled_count  INTEGER NOT NULL DEFAULT 0 CHECK (enrolled_count >= 0),
            status          TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS course_enrollment (
            enrollment_id      TEXT PRIMARY KEY,
            student_id         TEXT NOT NULL,
            teaching_class_id  TEXT NOT NULL REFERENCES teaching_class (class_id),
            status             TEXT NOT NULL,
            enrolled_at        TEXT NOT NULL,
            dropped_at         TEXT,
            completed_at       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_enrollment_student ON course_enrollment (student_id);
        CREATE INDEX IF NOT EXISTS idx_enrollment_class ON course_enrollment (teaching_class_id);

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id  TEXT NOT NULL,
            key       TEXT NOT NULL,
            value     TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS schema_version (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
