use std::time::Duration;

use globset::Glob;
use tokio::fs::File;

use crate::error::AdapterError;
use crate::ssh::{HostEntry, SshAdapter};
use ops_events::{BoundedLineReader, Line};

const MAX_LINE_BYTES: usize = 256 * 1024;

/// Reads the tail of a log file, optionally filtered by a substring or a
/// simple glob.
///
/// Hosts whose address resolves to the loopback interface are read directly
/// off the local filesystem (no SSH hop needed for logs produced by the same
/// machine the server runs on); every other host is read by composing a
/// `tail`/`grep` pipeline executed over the pooled SSH adapter, so both
/// capabilities in §4.6 share one entry point.
pub struct LogReader<'a> {
    ssh: &'a SshAdapter,
}

impl<'a> LogReader<'a> {
    pub fn new(ssh: &'a SshAdapter) -> Self {
        Self { ssh }
    }

    pub async fn tail(
        &self,
        host: &HostEntry,
        path: &str,
        filter: Option<&str>,
        tail: u32,
        timeout: Duration,
    ) -> Result<Vec<String>, AdapterError> {
        if is_loopback(&host.address) {
            self.tail_local(path, filter, tail).await
        } else {
            self.tail_remote(host, path, filter, tail, timeout).await
        }
    }

    async fn tail_local(
        &self,
        path: &str,
        filter: Option<&str>,
        tail: u32,
    ) -> Result<Vec<String>, AdapterError> {
        let file = File::open(path)
            .await
            .map_err(|e| AdapterError::NotFound(format!("{path}: {e}")))?;
        let mut reader = BoundedLineReader::new(file, MAX_LINE_BYTES);
        let matcher = filter.map(compile_matcher);

        let mut ring: Vec<String> = Vec::with_capacity(tail as usize);
        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|e| AdapterError::Permanent(e.to_string()))?
        {
            let text = match line {
                Line::Text { bytes, .. } => String::from_utf8_lossy(&bytes).into_owned(),
                Line::TooLong { .. } => continue,
            };
            if matcher.as_ref().is_some_and(|m| !m(&text)) {
                continue;
            }
            if ring.len() == tail as usize {
                ring.remove(0);
            }
            ring.push(text);
        }
        Ok(ring)
    }

    async fn tail_remote(
        &self,
        host: &HostEntry,
        path: &str,
        filter: Option<&str>,
        tail: u32,
        timeout: Duration,
    ) -> Result<Vec<String>, AdapterError> {
        let mut command = format!("tail -n {} -- {}", tail, shell_quote(path));
        if let Some(filter) = filter {
            command = format!("{command} | grep -F -- {}", shell_quote(filter));
        }
        let output = self.ssh.execute(host, &command, timeout).await?;
        if output.exit_code != 0 && output.exit_code != 1 {
            // exit code 1 from grep just means "no lines matched"
            return Err(AdapterError::Permanent(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

fn is_loopback(address: &str) -> bool {
    matches!(address, "localhost" | "127.0.0.1" | "::1")
}

fn compile_matcher(pattern: &str) -> Box<dyn Fn(&str) -> bool> {
    if pattern.contains(['*', '?', '[']) {
        if let Ok(glob) = Glob::new(pattern) {
            let matcher = glob.compile_matcher();
            return Box::new(move |line: &str| matcher.is_match(line));
        }
    }
    let needle = pattern.to_string();
    Box::new(move |line: &str| line.contains(&needle))
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_matcher_matches_contained_text() {
        let matcher = compile_matcher("ERROR");
        assert!(matcher("2026-07-31 ERROR boom"));
        assert!(!matcher("all good"));
    }

    #[test]
    fn glob_matcher_matches_wildcard_pattern() {
        let matcher = compile_matcher("*timeout*");
        assert!(matcher("request timeout after 30s"));
        assert!(!matcher("request completed"));
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
