// ==========================================
// 教学成绩与选课系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod enrollment;
pub mod grade;
pub mod types;

// 重导出核心类型
pub use enrollment::{CourseEnrollment, TeachingClass};
pub use grade::GradeRecord;
pub use types::{EnrollmentStatus, TeachingClassStatus};
