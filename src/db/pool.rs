//! Postgres pool and schema setup for the metrics key-value table

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("migrations/001_initial.sql"),
)];

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}

/// Split a script on `;`, leaving `$$ ... $$` bodies intact
fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_body = false;
    let bytes = sql.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'$') => {
                in_body = !in_body;
                i += 1;
            }
            b';' if !in_body => {
                push_statement(&mut statements, &sql[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    push_statement(&mut statements, &sql[start..]);

    statements
}

fn push_statement<'a>(statements: &mut Vec<&'a str>, chunk: &'a str) {
    let is_sql = chunk.lines().any(|line| {
        let line = line.trim().trim_end_matches(';').trim_end();
        !line.is_empty() && !line.starts_with("--")
    });
    if is_sql {
        statements.push(chunk.trim());
    }
}

/// Apply the schema. Every statement is idempotent, so this runs on each start.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for (name, script) in MIGRATIONS {
        for statement in split_statements(script) {
            sqlx::query(statement).execute(pool).await.map_err(|e| {
                tracing::error!("Migration {} failed: {}", name, e);
                e
            })?;
        }
        tracing::debug!("Applied migration {}", name);
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_function_bodies_whole() {
        let sql = "CREATE TABLE t (a INT);\n\
                   CREATE FUNCTION f() RETURNS TRIGGER AS $$ BEGIN NEW.a = 1; RETURN NEW; END; $$ LANGUAGE plpgsql;\n\
                   -- trailing comment\n";
        let statements = split_statements(sql);

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "CREATE TABLE t (a INT);");
        assert!(statements[1].starts_with("CREATE FUNCTION"));
        assert!(statements[1].ends_with("LANGUAGE plpgsql;"));
    }

    #[test]
    fn test_split_skips_comment_only_chunks() {
        let statements = split_statements("-- header\n-- more\n;\nSELECT 1");
        assert_eq!(statements, vec!["SELECT 1"]);
    }

    #[test]
    fn test_initial_migration_creates_kv_table() {
        let statements = split_statements(MIGRATIONS[0].1);
        assert!(statements
            .iter()
            .any(|s| s.contains("CREATE TABLE IF NOT EXISTS kv_entries")));
        assert!(statements.iter().all(|s| s.ends_with(';')));
    }
}
