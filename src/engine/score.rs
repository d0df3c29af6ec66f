// ==========================================
// 教学成绩与选课系统 - 成绩计算引擎
// ==========================================
// 职责: 由四个成绩分项计算总评成绩与绩点
// 红线: 纯函数、无副作用、确定性; 派生字段只能由本引擎产出，
//       每次成功写入前重新计算，不做独立缓存
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};

/// 成绩分项权重: 平时 20% / 期中 30% / 实验 10% / 期末 40%
pub const USUAL_WEIGHT: f64 = 0.2;
pub const MID_WEIGHT: f64 = 0.3;
pub const EXPERIMENT_WEIGHT: f64 = 0.1;
pub const FINAL_EXAM_WEIGHT: f64 = 0.4;

/// 派生计算结果
///
/// 四个分项齐全时两个字段均为 Some，任一缺失时均为 None
/// (不做部分计算，不做默认值兜底)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    pub final_score: Option<f64>,
    pub gpa: Option<f64>,
}

/// 计算总评成绩与绩点 (纯函数)
///
/// # 公式
/// - final_score = 0.2*平时 + 0.3*期中 + 0.1*实验 + 0.4*期末
/// - gpa: >=90 → 4.0; <60 → 0.0; 否则 1.0 + (final_score - 60) * 0.1
///   (60 分 1.0 到 90 分 4.0 的连续斜坡)
pub fn compute_derived(
    usual: Option<f64>,
    mid: Option<f64>,
    experiment: Option<f64>,
    final_exam: Option<f64>,
) -> Derived {
    let (Some(u), Some(m), Some(e), Some(f)) = (usual, mid, experiment, final_exam) else {
        return Derived {
            final_score: None,
            gpa: None,
        };
    };

    let final_score =
        u * USUAL_WEIGHT + m * MID_WEIGHT + e * EXPERIMENT_WEIGHT + f * FINAL_EXAM_WEIGHT;

    Derived {
        final_score: Some(final_score),
        gpa: Some(gpa_of(final_score)),
    }
}

/// 总评成绩到绩点的分段映射
pub fn gpa_of(final_score: f64) -> f64 {
    if final_score >= 90.0 {
        4.0
    } else if final_score < 60.0 {
        0.0
    } else {
        1.0 + (final_score - 60.0) * 0.1
    }
}

/// 校验单个成绩分项取值范围 [0,100]
pub fn validate_component(field: &str, value: Option<f64>) -> RepositoryResult<()> {
    if let Some(v) = value {
        if !(0.0..=100.0).contains(&v) || v.is_nan() {
            return Err(RepositoryError::FieldValueError {
                field: field.to_string(),
                message: format!("成绩必须在 [0,100] 范围内，实际为 {}", v),
            });
        }
    }
    Ok(())
}
