use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_.-]+$").unwrap()
});

/// 验证邮箱并返回详细错误信息
pub fn validate_email_format(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }

    if !validator::validate_email(email) {
        return Err(AppError::Validation("Email format is invalid".to_string()));
    }

    if email.len() > 254 {
        return Err(AppError::Validation("Email is too long".to_string()));
    }

    Ok(())
}

/// 规范化用户名：去除首尾空白并转为小写
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// 验证用户名格式（规范化之后）
pub fn validate_username(username: &str, max_len: usize) -> Result<()> {
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }

    if username.len() < 3 {
        return Err(AppError::Validation("Username must be at least 3 characters".to_string()));
    }

    if username.len() > max_len {
        return Err(AppError::Validation(format!(
            "Username cannot be longer than {} characters",
            max_len
        )));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(AppError::Validation(
            "Username may only contain letters, numbers, dots, underscores and hyphens".to_string(),
        ));
    }

    Ok(())
}

/// 验证显示名称
pub fn validate_full_name(full_name: &str) -> Result<()> {
    if full_name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    if full_name.chars().count() > 50 {
        return Err(AppError::Validation("Name cannot be longer than 50 characters".to_string()));
    }

    Ok(())
}

pub fn validate_bio(bio: &str, max_len: usize) -> Result<()> {
    if bio.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "Bio cannot be longer than {} characters",
            max_len
        )));
    }
    Ok(())
}

/// 解析逗号分隔的发质目标
pub fn parse_goals(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .map(|g| g.to_string())
        .collect()
}

pub fn join_goals(goals: &[String]) -> String {
    goals.join(", ")
}

/// Canonical text form of a goals input, whatever its spacing.
pub fn normalize_goals_input(input: &str) -> String {
    join_goals(&parse_goals(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_email_format() {
        assert!(validate_email_format("user@example.com").is_ok());
        assert!(validate_email_format("test.email+tag@domain.co.uk").is_ok());
        assert!(validate_email_format("@domain.com").is_err());
        assert!(validate_email_format("user@").is_err());

        assert!(validate_email_format("").is_err());
        assert!(validate_email_format("invalid-email").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("laila_hunte", 30).is_ok());
        assert!(validate_username("curls.by-mare", 30).is_ok());

        assert!(validate_username("", 30).is_err());
        assert!(validate_username("ab", 30).is_err());
        assert!(validate_username("user@name", 30).is_err());
        assert!(validate_username("Upper", 30).is_err());
        assert!(validate_username(&"a".repeat(31), 30).is_err());
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  LailaHunte "), "lailahunte");
    }

    #[test]
    fn test_validate_full_name() {
        assert!(validate_full_name("Laila Hunte").is_ok());
        assert!(validate_full_name("   ").is_err());
        assert!(validate_full_name(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_goals_round_trip() {
        let goals = parse_goals("growth, moisture, length");
        assert_eq!(goals, vec!["growth", "moisture", "length"]);
        assert_eq!(join_goals(&goals), "growth, moisture, length");
    }

    #[test]
    fn test_goals_irregular_spacing() {
        assert_eq!(
            normalize_goals_input("  growth,moisture ,,   length  ,"),
            "growth, moisture, length"
        );
        assert!(parse_goals(" , ,").is_empty());
    }

    proptest! {
        #[test]
        fn prop_goals_normalization_is_stable(
            goals in proptest::collection::vec("[a-z][a-z ]{0,10}[a-z]", 0..6),
            pad in "[ ]{0,3}",
        ) {
            let messy = goals
                .iter()
                .map(|g| format!("{pad}{g}{pad}"))
                .collect::<Vec<_>>()
                .join(",");

            let parsed = parse_goals(&messy);
            prop_assert_eq!(&parsed, &goals);

            let normalized = normalize_goals_input(&messy);
            prop_assert_eq!(normalize_goals_input(&normalized), normalized.clone());
            prop_assert_eq!(normalized, goals.join(", "));
        }
    }
}
