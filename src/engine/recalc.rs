// ==========================================
// 教学成绩与选课系统 - 批量重算引擎
// ==========================================
// 职责: 课程级/学生级成绩派生字段的批量重算
// 并发控制: 重算前获取对应范围的排他锁，期间重叠范围的
//   重算互斥; 锁获取有超时上限
// 写入策略: 重算写入为系统纠偏写，范围内的扫描与回写在
//   同一事务内完成 (改写行仍递增 version，保持版本链单调)
// ==========================================

use crate::domain::GradeRecord;
use crate::engine::lock_manager::{LockManager, LockScope};
use crate::engine::score;
use crate::repository::error::RepositoryResult;
use crate::repository::grade_repo::GradeRecordRepository;
use std::sync::Arc;
use std::time::Duration;

/// 一次批量重算的摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecalcSummary {
    /// 扫描的记录数
    pub scanned: usize,
    /// 实际改写的记录数 (派生字段已一致的记录跳过)
    pub updated: usize,
}

// ==========================================
// RecalcEngine - 批量重算引擎
// ==========================================
pub struct RecalcEngine {
    grade_repo: Arc<GradeRecordRepository>,
    lock_manager: Arc<LockManager>,
    lock_timeout: Duration,
}

impl RecalcEngine {
    pub fn new(
        grade_repo: Arc<GradeRecordRepository>,
        lock_manager: Arc<LockManager>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            grade_repo,
            lock_manager,
            lock_timeout,
        }
    }

    /// 重算某课程的全部成绩记录
    ///
    /// # 错误
    /// - `LockTimeout`: 课程范围排他锁在超时内未获取到
    pub fn recalculate_course(&self, course_id: &str) -> RepositoryResult<RecalcSummary> {
        let _guard = self
            .lock_manager
            .acquire_exclusive(LockScope::Course(course_id.to_string()), self.lock_timeout)?;

        let (scanned, updated) = self
            .grade_repo
            .recompute_derived_by_course(course_id, Self::recompute)?;
        let summary = RecalcSummary { scanned, updated };

        tracing::info!(
            course_id,
            scanned = summary.scanned,
            updated = summary.updated,
            "课程成绩重算完成"
        );
        Ok(summary)
    }

    /// 重算某学生的全部成绩记录
    ///
    /// # 错误
    /// - `LockTimeout`: 学生范围排他锁在超时内未获取到
    pub fn recalculate_student(&self, student_id: &str) -> RepositoryResult<RecalcSummary> {
        let _guard = self
            .lock_manager
            .acquire_exclusive(LockScope::Student(student_id.to_string()), self.lock_timeout)?;

        let (scanned, updated) = self
            .grade_repo
            .recompute_derived_by_student(student_id, Self::recompute)?;
        let summary = RecalcSummary { scanned, updated };

        tracing::info!(
            student_id,
            scanned = summary.scanned,
            updated = summary.updated,
            "学生成绩重算完成"
        );
        Ok(summary)
    }

    fn recompute(record: &GradeRecord) -> (Option<f64>, Option<f64>) {
        let [usual, mid, experiment, final_exam] = record.components();
        let derived = score::compute_derived(usual, mid, experiment, final_exam);
        (derived.final_score, derived.gpa)
    }
}
