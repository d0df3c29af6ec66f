// ==========================================
// 教学成绩与选课系统 - 领域类型定义
// ==========================================
// 职责: 选课状态、教学班状态等枚举类型
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 选课状态 (Enrollment Status)
// ==========================================
// 状态机: PENDING → ENROLLED → {DROPPED, COMPLETED, FAILED}
// 红线: 只有 ENROLLED 计入教学班 enrolled_count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Pending,   // 待审核
    Enrolled,  // 已选课
    Dropped,   // 已退课
    Completed, // 已完成
    Failed,    // 不通过
}

impl EnrollmentStatus {
    /// 转换为数据库存储字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "PENDING",
            EnrollmentStatus::Enrolled => "ENROLLED",
            EnrollmentStatus::Dropped => "DROPPED",
            EnrollmentStatus::Completed => "COMPLETED",
            EnrollmentStatus::Failed => "FAILED",
        }
    }

    /// 从数据库字符串解析 (未知值回落为 Pending)
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "ENROLLED" => EnrollmentStatus::Enrolled,
            "DROPPED" => EnrollmentStatus::Dropped,
            "COMPLETED" => EnrollmentStatus::Completed,
            "FAILED" => EnrollmentStatus::Failed,
            _ => EnrollmentStatus::Pending,
        }
    }

    /// 是否为终态 (终态不再计入容量，也不允许再转移)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Dropped | EnrollmentStatus::Completed | EnrollmentStatus::Failed
        )
    }

    /// 状态机转移合法性: PENDING → ENROLLED → {DROPPED, COMPLETED, FAILED}
    ///
    /// 回退转移 (如 ENROLLED → PENDING) 一律拒绝，否则同一
    /// (student, class) 可经 PENDING 往返铸出第二条 ENROLLED 记录
    pub fn can_transition_to(&self, to: EnrollmentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, to),
            (EnrollmentStatus::Pending, EnrollmentStatus::Enrolled)
                | (EnrollmentStatus::Enrolled, EnrollmentStatus::Dropped)
                | (EnrollmentStatus::Enrolled, EnrollmentStatus::Completed)
                | (EnrollmentStatus::Enrolled, EnrollmentStatus::Failed)
        )
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 教学班状态 (Teaching Class Status)
// ==========================================
// 只有 OPEN_FOR_ENROLLMENT 状态允许选课
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeachingClassStatus {
    Planned,           // 计划中
    OpenForEnrollment, // 开放选课
    EnrollmentClosed,  // 选课截止
    Active,            // 开课中
    Completed,         // 已结课
    Cancelled,         // 已取消
    Suspended,         // 已暂停
}

impl TeachingClassStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TeachingClassStatus::Planned => "PLANNED",
            TeachingClassStatus::OpenForEnrollment => "OPEN_FOR_ENROLLMENT",
            TeachingClassStatus::EnrollmentClosed => "ENROLLMENT_CLOSED",
            TeachingClassStatus::Active => "ACTIVE",
            TeachingClassStatus::Completed => "COMPLETED",
            TeachingClassStatus::Cancelled => "CANCELLED",
            TeachingClassStatus::Suspended => "SUSPENDED",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "OPEN_FOR_ENROLLMENT" => TeachingClassStatus::OpenForEnrollment,
            "ENROLLMENT_CLOSED" => TeachingClassStatus::EnrollmentClosed,
            "ACTIVE" => TeachingClassStatus::Active,
            "COMPLETED" => TeachingClassStatus::Completed,
            "CANCELLED" => TeachingClassStatus::Cancelled,
            "SUSPENDED" => TeachingClassStatus::Suspended,
            _ => TeachingClassStatus::Planned,
        }
    }

    /// 是否允许学生选课
    pub fn can_enroll(&self) -> bool {
        *self == TeachingClassStatus::OpenForEnrollment
    }

    /// 是否允许退课
    pub fn can_withdraw(&self) -> bool {
        matches!(
            self,
            TeachingClassStatus::OpenForEnrollment | TeachingClassStatus::EnrollmentClosed
        )
    }
}

impl fmt::Display for TeachingClassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
