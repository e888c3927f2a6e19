//! SQL text helpers for the toolset.

use regex::Regex;
use std::sync::LazyLock;

static COLUMN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,299}$").expect("Invalid regex"));

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z]*[ \t]*\r?\n)?(.*?)```").expect("Invalid regex")
});

/// Whether `name` is a plain column name that is safe to quote with backticks.
pub fn is_column_name(name: &str) -> bool {
    COLUMN_NAME.is_match(name)
}

/// Extract SQL from a model reply, removing Markdown code fences.
pub fn strip_sql_fences(text: &str) -> String {
    let text = text.trim();
    let sql = match CODE_FENCE.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
        None => text,
    };
    sql.trim().trim_end_matches(';').trim().to_string()
}

/// Query used when SQL generation fails.
pub fn fallback_query(quoted_table: &str) -> String {
    format!("SELECT * FROM {} LIMIT 10", quoted_table)
}

/// Counts per value of one dimension, largest first.
pub fn dimension_statistics(quoted_table: &str, dimension: &str) -> String {
    format!(
        "SELECT `{dim}`, COUNT(*) AS fraud_count\nFROM {table}\nGROUP BY `{dim}`\nORDER BY fraud_count DESC\nLIMIT 20",
        dim = dimension,
        table = quoted_table
    )
}

/// Overall row count plus distinct counts of every dimension.
pub fn overall_statistics(quoted_table: &str, dimensions: &[String]) -> String {
    let mut columns = vec!["COUNT(*) AS total_fraud_cases".to_string()];
    columns.extend(
        dimensions
            .iter()
            .filter(|d| is_column_name(d))
            .map(|d| format!("COUNT(DISTINCT `{d}`) AS unique_{d}", d = d)),
    );
    format!("SELECT\n  {}\nFROM {}", columns.join(",\n  "), quoted_table)
}
