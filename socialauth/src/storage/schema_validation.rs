use sqlx::{Pool, Postgres, Row, Sqlite};

/// Validates that a Postgres table has the expected columns and data types.
pub(crate) async fn validate_postgres_table_schema<E>(
    pool: &Pool<Postgres>,
    table_name: &str,
    expected_columns: &[(&str, &str)],
    error_mapper: impl Fn(String) -> E,
) -> Result<(), E> {
    let rows = sqlx::query(
        "SELECT column_name, data_type FROM information_schema.columns
         WHERE table_name = $1 ORDER BY column_name",
    )
    .bind(table_name)
    .fetch_all(pool)
    .await
    .map_err(|e| error_mapper(e.to_string()))?;

    let actual_columns: Vec<(String, String)> = rows
        .iter()
        .map(|row| {
            let name: String = row.get("column_name");
            let type_: String = row.get("data_type");
            (name, type_)
        })
        .collect();

    compare_columns(table_name, expected_columns, &actual_columns, error_mapper)
}

/// Validates that a SQLite table has the expected columns and declared types.
pub(crate) async fn validate_sqlite_table_schema<E>(
    pool: &Pool<Sqlite>,
    table_name: &str,
    expected_columns: &[(&str, &str)],
    error_mapper: impl Fn(String) -> E,
) -> Result<(), E> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table_name})"))
        .fetch_all(pool)
        .await
        .map_err(|e| error_mapper(e.to_string()))?;

    let actual_columns: Vec<(String, String)> = rows
        .iter()
        .map(|row| {
            let name: String = row.get("name");
            let type_: String = row.get("type");
            (name, type_.to_uppercase())
        })
        .collect();

    compare_columns(table_name, expected_columns, &actual_columns, error_mapper)
}

fn compare_columns<E>(
    table_name: &str,
    expected_columns: &[(&str, &str)],
    actual_columns: &[(String, String)],
    error_mapper: impl Fn(String) -> E,
) -> Result<(), E> {
    if actual_columns.is_empty() {
        return Err(error_mapper(format!(
            "Schema validation failed: Table '{table_name}' does not exist"
        )));
    }

    for (expected_name, expected_type) in expected_columns {
        match actual_columns.iter().find(|(name, _)| name == expected_name) {
            Some((_, actual_type)) if actual_type.eq_ignore_ascii_case(expected_type) => {}
            Some((_, actual_type)) => {
                return Err(error_mapper(format!(
                    "Schema validation failed: Column '{expected_name}' in '{table_name}' has type '{actual_type}' but expected '{expected_type}'"
                )));
            }
            None => {
                return Err(error_mapper(format!(
                    "Schema validation failed: Missing column '{expected_name}' in '{table_name}'"
                )));
            }
        }
    }

    for (actual_name, _) in actual_columns {
        if !expected_columns.iter().any(|(name, _)| name == actual_name) {
            tracing::warn!(
                "Extra column '{}' found in table '{}'",
                actual_name,
                table_name
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actual(cols: &[(&str, &str)]) -> Vec<(String, String)> {
        cols.iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_compare_columns_accepts_matching_schema() {
        let expected = [("id", "TEXT"), ("verified", "BOOLEAN")];
        let result = compare_columns(
            "emails",
            &expected,
            &actual(&[("id", "TEXT"), ("verified", "boolean"), ("extra", "TEXT")]),
            |e| e,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_compare_columns_reports_missing_and_mismatched() {
        let expected = [("id", "TEXT"), ("verified", "BOOLEAN")];

        let missing = compare_columns("emails", &expected, &actual(&[("id", "TEXT")]), |e| e);
        assert!(missing.unwrap_err().contains("Missing column 'verified'"));

        let mismatched = compare_columns(
            "emails",
            &expected,
            &actual(&[("id", "INTEGER"), ("verified", "BOOLEAN")]),
            |e| e,
        );
        assert!(mismatched.unwrap_err().contains("has type 'INTEGER'"));

        let absent = compare_columns("emails", &expected, &[], |e| e);
        assert!(absent.unwrap_err().contains("does not exist"));
    }
}
