// ==========================================
// 教学成绩与选课系统 - 仓储层错误类型
// ==========================================
// 依据: Rust 错误处理最佳实践
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 并发控制错误 =====
    #[error("乐观锁冲突: grade_id={grade_id}, expected_version={expected}, actual_version={actual}")]
    VersionConflict {
        grade_id: String,
        expected: i64,
        actual: i64,
    },

    #[error("悲观锁获取超时: scope={scope}, 等待{waited_ms}ms")]
    LockTimeout { scope: String, waited_ms: u64 },

    // ===== 业务冲突错误 =====
    #[error("成绩记录已存在: student_id={student_id}, course_id={course_id}")]
    DuplicateRecord {
        student_id: String,
        course_id: String,
    },

    #[error("学生已选该教学班: student_id={student_id}, class_id={class_id}")]
    AlreadyEnrolled {
        student_id: String,
        class_id: String,
    },

    #[error("学生未选该教学班: student_id={student_id}, class_id={class_id}")]
    NotEnrolled {
        student_id: String,
        class_id: String,
    },

    #[error("教学班已满: class_id={class_id}, capacity={capacity}")]
    ClassFull { class_id: String, capacity: i64 },

    #[error("教学班不可选课: class_id={class_id}, status={status}")]
    ClassNotEnrollable { class_id: String, status: String },

    #[error("教学班不可退课: class_id={class_id}, status={status}")]
    ClassNotWithdrawable { class_id: String, status: String },

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 数据质量错误 =====
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl RepositoryError {
    /// 冲突类错误: 调用方应重读后重试，核心不做内部重试
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(
            self,
            RepositoryError::VersionConflict { .. } | RepositoryError::ClassFull { .. }
        )
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
