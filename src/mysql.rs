// ABOUTME: MySQL connection helpers and status queries
// ABOUTME: Fresh connection per use; no pool is held across shipping cycles

use anyhow::{Context, Result};
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Row};

use crate::config::EndpointConfig;

/// The master's current binlog write position, as reported by
/// `SHOW MASTER STATUS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterStatus {
    /// Binlog file identifier, e.g. `mysql-bin-changelog.000002`
    pub file: String,
    /// Offset of the next event the master will write
    pub position: u64,
}

/// Open a fresh connection to one endpoint. Callers disconnect before the
/// loop sleeps; connections never outlive a single cycle.
pub async fn connect(endpoint: &EndpointConfig) -> mysql_async::Result<Conn> {
    let opts = OptsBuilder::default()
        .ip_or_hostname(endpoint.host.clone())
        .tcp_port(endpoint.port)
        .user(Some(endpoint.user.clone()))
        .pass(Some(endpoint.password.clone()));
    Conn::new(Opts::from(opts)).await
}

/// Query the master's current binlog file and position.
pub async fn master_status(conn: &mut Conn) -> Result<MasterStatus> {
    let row: Option<Row> = conn
        .query_first("SHOW MASTER STATUS")
        .await
        .context("SHOW MASTER STATUS failed")?;
    let mut row = row.context(
        "master did not report a binlog position; is binary logging (log_bin) enabled?",
    )?;

    let file: String = row
        .take("File")
        .context("SHOW MASTER STATUS returned no File column")?;
    let position: u64 = row
        .take("Position")
        .context("SHOW MASTER STATUS returned no Position column")?;

    Ok(MasterStatus { file, position })
}

/// Row count of one table, used by the consistency probe and the seed
/// commands for progress reporting.
pub async fn count_rows(conn: &mut Conn, database: &str, table: &str) -> Result<u64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}.{}",
        quote_ident(database),
        quote_ident(table)
    );
    let count: Option<u64> = conn
        .query_first(sql)
        .await
        .with_context(|| format!("failed to count rows in {}.{}", database, table))?;
    count.context("COUNT(*) returned no row")
}

/// Quote a MySQL identifier with backticks, escaping embedded backticks.
pub fn quote_ident(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}
