// ==========================================
// 工程成本修订台账系统 - 输入校验器
// ==========================================
// 职责: 成本项/单据创建与修订的入参校验
// 约定: 校验消息走 i18n, 前端直接展示
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::i18n::{t, t_with_args};

/// 名称非空且不超长
pub fn validate_title(title: &str) -> ApiResult<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(t("validation.title_empty")));
    }
    if trimmed.chars().count() > 200 {
        return Err(ApiError::InvalidInput(t("validation.title_too_long")));
    }
    Ok(())
}

/// 数量/单价必须为非负有限数
pub fn validate_values(amount: f64, price: f64) -> ApiResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ApiError::InvalidInput(t_with_args(
            "validation.invalid_amount",
            &[("value", &amount.to_string())],
        )));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::InvalidInput(t_with_args(
            "validation.invalid_price",
            &[("value", &price.to_string())],
        )));
    }
    Ok(())
}

/// 非空ID (uuid 文本主键)
pub fn validate_id(id: &str, field: &str) -> ApiResult<()> {
    if id.trim().is_empty() {
        return Err(ApiError::InvalidInput(t_with_args(
            "validation.empty_id",
            &[("field", field)],
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_title_rejected() {
        assert!(validate_title("  ").is_err());
        assert!(validate_title("脚手架租赁").is_ok());
    }

    #[test]
    fn test_negative_values_rejected() {
        assert!(validate_values(-1.0, 5.0).is_err());
        assert!(validate_values(3.0, -0.5).is_err());
        assert!(validate_values(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        assert!(validate_values(f64::NAN, 1.0).is_err());
        assert!(validate_values(1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(validate_id("", "project_id").is_err());
        assert!(validate_id("p-1", "project_id").is_ok());
    }
}
