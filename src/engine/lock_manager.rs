// ==========================================
// 教学成绩与选课系统 - 悲观锁管理器
// ==========================================
// 职责: 为跨记录批量重算提供共享/排他范围锁
// 约束:
// - 只服务于批量读取-重算路径; 单记录编辑走乐观锁，不经过本模块
// - 锁表为显式持有的可注入组件，随 AppState 生命周期管理，
//   不使用进程级静态集合
// - 排他锁等待必须有超时上限，超时返回 LockTimeout 而不是无限阻塞
// - 释放通过 RAII guard 保证，任何退出路径 (成功/校验失败/panic 展开)
//   都会释放
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::time::{Duration, Instant};

/// 锁范围
///
/// Record 范围携带其 (student_id, course_id)，使 Record 与
/// Student/Course 范围的重叠判定是精确的; Student 与 Course
/// 范围之间的重叠无法在不查库的情况下判定，保守地视为恒重叠
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockScope {
    /// 单条成绩记录
    Record {
        grade_id: String,
        student_id: String,
        course_id: String,
    },
    /// 某学生的全部成绩记录
    Student(String),
    /// 某课程的全部成绩记录
    Course(String),
}

impl LockScope {
    /// 两个范围是否重叠 (重叠的范围之间互斥规则生效)
    pub fn overlaps(&self, other: &LockScope) -> bool {
        use LockScope::*;
        match (self, other) {
            (
                Record { grade_id: a, .. },
                Record { grade_id: b, .. },
            ) => a == b,
            (Record { student_id, .. }, Student(s)) | (Student(s), Record { student_id, .. }) => {
                student_id == s
            }
            (Record { course_id, .. }, Course(c)) | (Course(c), Record { course_id, .. }) => {
                course_id == c
            }
            (Student(a), Student(b)) => a == b,
            (Course(a), Course(b)) => a == b,
            // 学生范围与课程范围可能共享记录，保守判定为重叠
            (Student(_), Course(_)) | (Course(_), Student(_)) => true,
        }
    }
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockScope::Record { grade_id, .. } => write!(f, "record:{}", grade_id),
            LockScope::Student(id) => write!(f, "student:{}", id),
            LockScope::Course(id) => write!(f, "course:{}", id),
        }
    }
}

/// 锁模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// 共享锁: 可与其他共享锁并存
    Shared,
    /// 排他锁: 与一切重叠锁互斥
    Exclusive,
}

#[derive(Debug)]
struct HeldLock {
    id: u64,
    scope: LockScope,
    mode: LockMode,
}

#[derive(Debug, Default)]
struct LockTable {
    next_id: u64,
    held: Vec<HeldLock>,
}

impl LockTable {
    /// 申请与已持有锁是否冲突
    fn conflicts(&self, scope: &LockScope, mode: LockMode) -> bool {
        self.held.iter().any(|h| {
            h.scope.overlaps(scope)
                && (mode == LockMode::Exclusive || h.mode == LockMode::Exclusive)
        })
    }
}

// ==========================================
// LockManager - 范围锁管理器
// ==========================================
pub struct LockManager {
    state: Mutex<LockTable>,
    cond: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockTable::default()),
            cond: Condvar::new(),
        }
    }

    /// 申请排他锁，最多等待 timeout
    pub fn acquire_exclusive(
        &self,
        scope: LockScope,
        timeout: Duration,
    ) -> RepositoryResult<LockGuard<'_>> {
        self.acquire(scope, LockMode::Exclusive, timeout)
    }

    /// 申请共享锁，最多等待 timeout
    pub fn acquire_shared(
        &self,
        scope: LockScope,
        timeout: Duration,
    ) -> RepositoryResult<LockGuard<'_>> {
        self.acquire(scope, LockMode::Shared, timeout)
    }

    fn acquire(
        &self,
        scope: LockScope,
        mode: LockMode,
        timeout: Duration,
    ) -> RepositoryResult<LockGuard<'_>> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut table = self.state.lock();

        while table.conflicts(&scope, mode) {
            let result = self.cond.wait_until(&mut table, deadline);
            if result.timed_out() && table.conflicts(&scope, mode) {
                return Err(RepositoryError::LockTimeout {
                    scope: scope.to_string(),
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
        }

        table.next_id += 1;
        let id = table.next_id;
        tracing::debug!(scope = %scope, ?mode, lock_id = id, "范围锁已获取");
        table.held.push(HeldLock { id, scope, mode });

        Ok(LockGuard { manager: self, id })
    }

    fn release(&self, id: u64) {
        let mut table = self.state.lock();
        table.held.retain(|h| h.id != id);
        drop(table);
        // 唤醒所有等待者，由它们重新检查冲突
        self.cond.notify_all();
    }

    /// 当前持有的锁数量 (诊断用)
    pub fn active_locks(&self) -> usize {
        self.state.lock().held.len()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 范围锁 RAII guard，Drop 时释放
#[must_use = "guard 被丢弃时锁即释放"]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    id: u64,
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("id", &self.id).finish()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(self.id);
    }
}
