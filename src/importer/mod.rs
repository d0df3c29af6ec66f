// ==========================================
// 教学成绩与选课系统 - 导入层
// ==========================================
// 职责: 外部成绩数据批量导入
// 支持: CSV
// ==========================================

pub mod error;
pub mod grade_importer;

pub use error::{ImportError, ImportResult};
pub use grade_importer::{GradeImporter, ImportRowError, ImportSummary};
