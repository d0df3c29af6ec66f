// ==========================================
// 教学成绩与选课系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// 红线: 所有错误信息必须包含显式原因，冲突类错误必须可被
//       调用方程序化识别 (用于重试决策)
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 乐观锁冲突: 调用方应重新读取后重试
    #[error("版本冲突: {0}")]
    VersionConflict(String),

    /// 范围锁等待超时
    #[error("锁等待超时: {0}")]
    LockTimeout(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("教学班已满: {0}")]
    ClassFull(String),

    #[error("教学班不可选: {0}")]
    ClassNotEnrollable(String),

    #[error("教学班不可退: {0}")]
    ClassNotWithdrawable(String),

    #[error("重复选课: {0}")]
    AlreadyEnrolled(String),

    #[error("未选该课: {0}")]
    NotEnrolled(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 是否为调用方重读后可重试的冲突类错误
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, ApiError::VersionConflict(_) | ApiError::LockTimeout(_))
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::VersionConflict {
                grade_id,
                expected,
                actual,
            } => ApiError::VersionConflict(format!(
                "成绩记录{}已被其他用户修改（期望version={}，实际version={}），请重新读取后重试",
                grade_id, expected, actual
            )),
            RepositoryError::LockTimeout { scope, waited_ms } => ApiError::LockTimeout(format!(
                "范围{}的锁在{}ms内未获取到，请稍后重试",
                scope, waited_ms
            )),

            // 选课业务错误
            RepositoryError::ClassFull { class_id, capacity } => ApiError::ClassFull(format!(
                "教学班{}容量{}已满",
                class_id, capacity
            )),
            RepositoryError::ClassNotEnrollable { class_id, status } => {
                ApiError::ClassNotEnrollable(format!(
                    "教学班{}当前状态{}不接受选课",
                    class_id, status
                ))
            }
            RepositoryError::ClassNotWithdrawable { class_id, status } => {
                ApiError::ClassNotWithdrawable(format!(
                    "教学班{}当前状态{}不接受退课",
                    class_id, status
                ))
            }
            RepositoryError::AlreadyEnrolled {
                student_id,
                class_id,
            } => ApiError::AlreadyEnrolled(format!(
                "学生{}已在教学班{}中",
                student_id, class_id
            )),
            RepositoryError::NotEnrolled {
                student_id,
                class_id,
            } => ApiError::NotEnrolled(format!(
                "学生{}未选教学班{}",
                student_id, class_id
            )),
            RepositoryError::DuplicateRecord {
                student_id,
                course_id,
            } => ApiError::BusinessRuleViolation(format!(
                "学生{}在课程{}已有成绩记录",
                student_id, course_id
            )),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_is_retryable() {
        let api_err: ApiError = RepositoryError::VersionConflict {
            grade_id: "G001".to_string(),
            expected: 3,
            actual: 5,
        }
        .into();
        assert!(api_err.is_retryable_conflict());
        assert!(api_err.to_string().contains("version=5"));
    }

    #[test]
    fn test_class_full_maps_to_business_error() {
        let api_err: ApiError = RepositoryError::ClassFull {
            class_id: "TC001".to_string(),
            capacity: 50,
        }
        .into();
        assert!(!api_err.is_retryable_conflict());
        assert!(matches!(api_err, ApiError::ClassFull(_)));
    }
}
