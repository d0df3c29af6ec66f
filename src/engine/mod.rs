// ==========================================
// 教学成绩与选课系统 - 引擎层
// ==========================================
// 职责: 实现成绩与选课的业务规则引擎，不拼 SQL
// 分层: 引擎编排仓储与纯函数计算，持久化细节留在仓储层
// ==========================================

pub mod enrollment;
pub mod events;
pub mod grade_update;
pub mod lock_manager;
pub mod recalc;
pub mod score;

// 重导出核心引擎
pub use enrollment::{DirectoryLookup, EnrollmentEngine, EnrollmentOutcome};
pub use events::{
    EnrollmentEvent, EnrollmentEventPublisher, EnrollmentEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use grade_update::{BatchItemError, BatchUpdateReport, GradeUpdateCommand, GradeUpdateEngine};
pub use lock_manager::{LockGuard, LockManager, LockMode, LockScope};
pub use recalc::{RecalcEngine, RecalcSummary};
pub use score::{compute_derived, gpa_of, Derived};
