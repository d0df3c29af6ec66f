// ==========================================
// 教学成绩与选课系统 - 选课领域实体
// ==========================================
// 职责: 定义教学班与选课记录实体
// 红线: enrolled_count 只允许选课仓储写入，
//       且任意时刻 0 <= enrolled_count <= capacity
// ==========================================

use crate::domain::types::{EnrollmentStatus, TeachingClassStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 教学班 (容量的归属实体)
///
/// 不变式: enrolled_count 恒等于引用本班且 status=ENROLLED 的选课记录数，
/// 并发选课/退课下同样成立
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachingClass {
    /// 教学班ID (UUID)
    pub class_id: String,
    /// 教学班名称
    pub name: String,
    /// 课程ID
    pub course_id: String,
    /// 容量上限 (正整数)
    pub capacity: i64,
    /// 当前已选人数
    pub enrolled_count: i64,
    /// 教学班状态
    pub status: TeachingClassStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TeachingClass {
    /// 是否还有空位
    pub fn has_capacity(&self) -> bool {
        self.enrolled_count < self.capacity
    }
}

/// 选课记录
///
/// 同一 (student_id, teaching_class_id) 允许存在多条历史记录
/// (选课→退课→再选课)，但任意时刻至多一条 status=ENROLLED
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEnrollment {
    /// 选课记录ID (UUID)
    pub enrollment_id: String,
    /// 学生ID
    pub student_id: String,
    /// 教学班ID
    pub teaching_class_id: String,
    /// 选课状态
    pub status: EnrollmentStatus,
    /// 选课时间
    pub enrolled_at: NaiveDateTime,
    /// 退课时间
    pub dropped_at: Option<NaiveDateTime>,
    /// 完成时间
    pub completed_at: Option<NaiveDateTime>,
}
