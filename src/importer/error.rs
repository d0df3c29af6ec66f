// ==========================================
// 教学成绩与选课系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 行级数据错误 =====
    #[error("行 {row}: 主键缺失 (student_id / course_id 为空)")]
    PrimaryKeyMissing { row: usize },

    #[error("行 {row}: {message}")]
    RowError { row: usize, message: String },

    // ===== 持久化错误 =====
    #[error("持久化失败: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}
