//! `mysql_async` implementation of [`TableSink`].

use async_trait::async_trait;
use mysql_async::{prelude::*, Conn, OptsBuilder, Params, Pool, TxOpts, Value};
use tracing::{debug, info};

use crate::ddl::{
    create_database_sql, drop_table_sql, insert_sql, quote_ident, rows_per_statement, upsert_sql,
    TableLayout, TABLE_EXISTS_SQL,
};
use crate::error::SinkError;
use crate::sink::{TableSink, WriteBatch, WriteMode};

/// MariaDB connection options
#[derive(Clone, Debug)]
pub struct TargetOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database to sync into; created if missing.
    pub database: String,
}

impl TargetOpts {
    /// `user@host:port/database`, safe to log.
    pub fn display_target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// MariaDB target holding a single connection for the whole run.
pub struct MySQLSink {
    pool: Pool,
    conn: Conn,
}

impl MySQLSink {
    /// Connect to the server, create the target database if needed and
    /// select it.
    pub async fn connect(opts: &TargetOpts) -> Result<Self, SinkError> {
        let builder = OptsBuilder::default()
            .ip_or_hostname(opts.host.clone())
            .tcp_port(opts.port)
            .user(Some(opts.user.clone()))
            .pass(Some(opts.password.clone()));

        let pool = Pool::new(builder);
        let mut conn = pool.get_conn().await?;

        conn.query_drop(create_database_sql(&opts.database)).await?;
        conn.query_drop(format!("USE {}", quote_ident(&opts.database)))
            .await?;

        info!("Connected to MariaDB at {}", opts.display_target());
        Ok(Self { pool, conn })
    }

    /// Close the connection and the pool.
    pub async fn close(self) -> Result<(), SinkError> {
        drop(self.conn);
        self.pool.disconnect().await?;
        info!("MariaDB connection closed");
        Ok(())
    }
}

#[async_trait]
impl TableSink for MySQLSink {
    async fn table_exists(&mut self, table: &str) -> Result<bool, SinkError> {
        let count: Option<u64> = self.conn.exec_first(TABLE_EXISTS_SQL, (table,)).await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn recreate_table(&mut self, layout: &TableLayout) -> Result<(), SinkError> {
        self.conn.query_drop(drop_table_sql(&layout.table)).await?;

        let sql = layout.create_table_sql();
        debug!("CREATE TABLE SQL: {}", sql);
        self.conn.query_drop(sql).await?;
        Ok(())
    }

    async fn ensure_table(&mut self, layout: &TableLayout) -> Result<bool, SinkError> {
        if self.table_exists(&layout.table).await? {
            return Ok(false);
        }

        let sql = layout.create_table_sql();
        debug!("CREATE TABLE SQL: {}", sql);
        self.conn.query_drop(sql).await?;
        Ok(true)
    }

    async fn write_batch(&mut self, batch: &WriteBatch<'_>) -> Result<u64, SinkError> {
        if batch.rows.is_empty() {
            return Ok(0);
        }
        batch.validate()?;

        let chunk_size = rows_per_statement(batch.columns.len());
        let mut tx = self.conn.start_transaction(TxOpts::default()).await?;

        for chunk in batch.rows.chunks(chunk_size) {
            let sql = match batch.mode {
                WriteMode::Insert => insert_sql(batch.table, batch.columns, chunk.len()),
                WriteMode::Upsert => upsert_sql(
                    batch.table,
                    batch.columns,
                    batch.primary_key.unwrap_or_default(),
                    chunk.len(),
                ),
            };

            let params: Vec<Value> = chunk
                .iter()
                .flat_map(|row| row.iter().cloned().map(Value::from))
                .collect();

            tx.exec_drop(sql, Params::Positional(params)).await?;
        }

        tx.commit().await?;

        debug!(
            "Committed {} rows into table '{}'",
            batch.rows.len(),
            batch.table
        );
        Ok(batch.rows.len() as u64)
    }
}
