use crate::{BrError, Result};

/// 校验拼接进 SQL 的标识符（库名、表名、分区名、标签、仓库名）
///
/// 标识符无法作为绑定参数传递，只允许字母、数字、`_`、`.`、`-`。
pub fn validate_identifier(value: &str) -> Result<&str> {
    let valid = !value.is_empty()
        && !value.starts_with(['.', '-'])
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid {
        Ok(value)
    } else {
        Err(BrError::InvalidIdentifier(value.to_string()))
    }
}

pub fn validate_all<'a, I>(values: I) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    for value in values {
        validate_identifier(value)?;
    }
    Ok(())
}

/// 单引号字符串字面量
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "''");
    format!("'{escaped}'")
}

/// LIKE 模式中的前缀，转义通配符
pub fn like_prefix(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    quote_literal_raw(&format!("{escaped}%"))
}

fn quote_literal_raw(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// 校验后的标识符；不是普通单词（含 `-`、`.` 或以数字开头）时加反引号
pub fn quote_identifier(value: &str) -> Result<String> {
    let value = validate_identifier(value)?;
    let bare = value.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        Ok(value.to_string())
    } else {
        Ok(format!("`{value}`"))
    }
}

/// `db.name`，两部分分别引用
pub fn qualified(database: &str, name: &str) -> Result<String> {
    Ok(format!(
        "{}.{}",
        quote_identifier(database)?,
        quote_identifier(name)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        for ok in ["sales", "sales.orders", "p20251015", "my-backup-v1", "t_1"] {
            assert!(validate_identifier(ok).is_ok(), "{ok}");
        }
    }

    #[test]
    fn test_rejects_injection_attempts() {
        for bad in ["", "t; DROP TABLE x", "t'", "a b", "`t`", ".hidden", "t)--"] {
            assert!(
                matches!(validate_identifier(bad), Err(BrError::InvalidIdentifier(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("daily-v"), "'daily-v%'");
        assert_eq!(like_prefix("a_b"), r"'a\_b%'");
    }

    #[test]
    fn test_quote_identifier_only_when_needed() {
        assert_eq!(quote_identifier("orders").unwrap(), "orders");
        assert_eq!(quote_identifier("nightly-v1").unwrap(), "`nightly-v1`");
        assert_eq!(quote_identifier("2025q4").unwrap(), "`2025q4`");
        assert!(quote_identifier("a`b").is_err());
    }

    #[test]
    fn test_qualified_quotes_each_part() {
        assert_eq!(qualified("sales", "orders").unwrap(), "sales.orders");
        assert_eq!(qualified("sales", "inc-v2").unwrap(), "sales.`inc-v2`");
    }
}
