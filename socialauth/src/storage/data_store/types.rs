use sqlx::{PgPool, SqlitePool};

/// Connection pool of the relational store backing every table.
#[derive(Clone, Debug)]
pub(crate) enum DataStore {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl DataStore {
    pub(crate) fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            Self::Sqlite(pool) => Some(pool),
            Self::Postgres(_) => None,
        }
    }

    pub(crate) fn as_postgres(&self) -> Option<&PgPool> {
        match self {
            Self::Postgres(pool) => Some(pool),
            Self::Sqlite(_) => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
        }
    }

    /// Open a lazily connecting pool for `kind` at `url`.
    pub(crate) fn connect_lazy(kind: &str, url: &str) -> Result<Self, String> {
        match kind {
            "sqlite" => {
                let opts = url
                    .parse::<sqlx::sqlite::SqliteConnectOptions>()
                    .map_err(|e| format!("Invalid SQLite URL: {e}"))?
                    .create_if_missing(true);
                Ok(Self::Sqlite(SqlitePool::connect_lazy_with(opts)))
            }
            "postgres" => PgPool::connect_lazy(url)
                .map(Self::Postgres)
                .map_err(|e| format!("Invalid Postgres URL: {e}")),
            other => Err(format!(
                "Unsupported data store type: {other}. Supported types are 'sqlite' and 'postgres'"
            )),
        }
    }
}
