// ==========================================
// 教学成绩与选课系统 - 成绩领域实体
// ==========================================
// 职责: 定义成绩记录实体
// 红线: final_score / gpa 为派生字段，只能由成绩引擎写入，
//       不允许任何代码路径独立设置
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 成绩记录
///
/// 唯一标识: (student_id, course_id)，每个学生每门课程一条记录
///
/// # 并发控制
/// - `version` 单调递增，每次成功写入 +1
/// - 提交时使用 `UPDATE ... WHERE id = ? AND version = ?` 条件更新，
///   在存储层检测丢失更新
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRecord {
    /// 记录ID (UUID)
    pub id: String,
    /// 学生ID
    pub student_id: String,
    /// 课程ID
    pub course_id: String,
    /// 平时成绩 [0,100]
    pub usual_score: Option<f64>,
    /// 期中成绩 [0,100]
    pub mid_score: Option<f64>,
    /// 实验成绩 [0,100]
    pub experiment_score: Option<f64>,
    /// 期末成绩 [0,100]
    pub final_exam_score: Option<f64>,
    /// 总评成绩 (派生: 四项齐全时才存在)
    pub final_score: Option<f64>,
    /// 绩点 (派生)
    pub gpa: Option<f64>,
    /// 乐观锁版本号
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl GradeRecord {
    /// 四个成绩分项，按权重顺序 (平时/期中/实验/期末)
    pub fn components(&self) -> [Option<f64>; 4] {
        [
            self.usual_score,
            self.mid_score,
            self.experiment_score,
            self.final_exam_score,
        ]
    }
}
