// ABOUTME: External MySQL client tool invocation (mysqlbinlog, mysqldump, mysql)
// ABOUTME: Argument vectors only, structured results, bounded wall-clock timeouts

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use which::which;

use crate::binlog::LogRange;
use crate::config::EndpointConfig;

/// Structured result of one external tool invocation. Exit code and stderr
/// text are the only signal these tools give; stdout is usually redirected
/// to a file by the caller.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// `None` when the tool was terminated by a signal or timed out
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable failure description for error payloads and logs.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        match self.exit_code {
            Some(code) => format!("exit code {}: {}", code, stderr),
            None if stderr.is_empty() => "terminated without an exit code".to_string(),
            None => stderr.to_string(),
        }
    }
}

/// Run a prepared command with a wall-clock timeout.
///
/// A timeout kills the child (via kill_on_drop) and is reported as a failed
/// `ToolOutput`, indistinguishable from a tool failure for the caller's
/// purposes. Spawn errors (binary missing, permissions) surface as `Err`.
pub async fn run_tool(name: &str, mut command: Command, timeout: Duration) -> Result<ToolOutput> {
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    let child = command
        .spawn()
        .with_context(|| format!("failed to spawn {}", name))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => {
            let output = output.with_context(|| format!("failed to wait for {}", name))?;
            Ok(ToolOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
        Err(_) => Ok(ToolOutput {
            exit_code: None,
            stdout: String::new(),
            stderr: format!("{} timed out after {}s", name, timeout.as_secs()),
        }),
    }
}

/// Base invocation for a MySQL client tool against one endpoint. The
/// password travels through MYSQL_PWD rather than the argument vector so it
/// never shows up in process listings.
fn client_command(program: &str, endpoint: &EndpointConfig) -> Command {
    let mut command = Command::new(program);
    command
        .arg("--host")
        .arg(&endpoint.host)
        .arg("--port")
        .arg(endpoint.port.to_string())
        .arg("--user")
        .arg(&endpoint.user)
        .env("MYSQL_PWD", &endpoint.password);
    command
}

/// Extract one binlog range from the master into an artifact file.
pub async fn extract_binlog(
    master: &EndpointConfig,
    binlog_file: &str,
    range: LogRange,
    artifact: &Path,
    timeout: Duration,
) -> Result<ToolOutput> {
    let out = std::fs::File::create(artifact)
        .with_context(|| format!("failed to create artifact file {:?}", artifact))?;

    let mut command = client_command("mysqlbinlog", master);
    command
        .arg("--read-from-remote-server")
        .arg("--start-position")
        .arg(range.start.to_string())
        // --stop-position is exclusive; the range is inclusive on both ends
        .arg("--stop-position")
        .arg((range.end + 1).to_string())
        .arg(binlog_file)
        .stdout(Stdio::from(out));

    run_tool("mysqlbinlog", command, timeout).await
}

/// Feed a SQL file (segment artifact or seed dump) to the mysql client.
pub async fn apply_sql_file(
    endpoint: &EndpointConfig,
    input: &Path,
    timeout: Duration,
) -> Result<ToolOutput> {
    let input_file = std::fs::File::open(input)
        .with_context(|| format!("failed to open {:?} for apply", input))?;

    let mut command = client_command("mysql", endpoint);
    command.stdin(Stdio::from(input_file)).stdout(Stdio::piped());

    run_tool("mysql", command, timeout).await
}

/// Dump one database (schema and data) from the master into a file.
pub async fn dump_database(
    master: &EndpointConfig,
    database: &str,
    out_path: &Path,
    timeout: Duration,
) -> Result<ToolOutput> {
    let out = std::fs::File::create(out_path)
        .with_context(|| format!("failed to create dump file {:?}", out_path))?;

    let mut command = client_command("mysqldump", master);
    command
        .arg("--databases")
        .arg(database)
        .arg("--single-transaction")
        .arg("--set-gtid-purged=OFF")
        .stdout(Stdio::from(out));

    run_tool("mysqldump", command, timeout).await
}

/// Check that the named MySQL client tools are installed and in PATH.
pub fn check_required_tools(tools: &[&str]) -> Result<()> {
    let mut missing = Vec::new();

    for tool in tools {
        if which(tool).is_err() {
            missing.push(*tool);
        }
    }

    if !missing.is_empty() {
        bail!(
            "Missing required MySQL client tools: {}\n\
             \n\
             Please install the MySQL client package:\n\
             - Ubuntu/Debian: sudo apt-get install mysql-client\n\
             - macOS: brew install mysql-client\n\
             - RHEL/CentOS: sudo yum install mysql\n\
             - Windows: Download from https://dev.mysql.com/downloads/",
            missing.join(", ")
        );
    }

    Ok(())
}
