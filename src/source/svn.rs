// src/source/svn.rs

use super::svn_xml::parse_log_xml;
use super::{Cursor, HeadRevision, RevisionSource};
use crate::error::SourceError;
use crate::model::RevisionRecord;
use std::process::Command;
use tracing::debug;

/// Reads a remote Subversion log through the `svn` command-line client.
///
/// Request timeouts, TLS and authentication prompts are the client's
/// business; we only pass `--non-interactive` and optional credentials.
#[derive(Debug, Clone)]
pub struct SvnCliSource {
    url: String,
    program: String,
    username: Option<String>,
    password: Option<String>,
}

impl SvnCliSource {
    pub fn new(url: impl Into<String>) -> Self {
        SvnCliSource { url: url.into(), program: "svn".to_string(), username: None, password: None }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Use a different `svn` binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, args: &[&str]) -> Result<String, SourceError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--non-interactive");
        if let Some(username) = &self.username {
            cmd.arg("--username").arg(username);
        }
        if let Some(password) = &self.password {
            cmd.arg("--password").arg(password);
        }
        cmd.args(args);

        debug!(program = %self.program, ?args, "running svn");
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(SourceError::Command {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl RevisionSource for SvnCliSource {
    fn head_revision(&mut self) -> Result<HeadRevision, SourceError> {
        let out = self.run(&["info", "--show-item", "revision", "-r", "HEAD", &self.url])?;
        Ok(out.trim().parse().map(HeadRevision::Number).unwrap_or(HeadRevision::Symbolic))
    }

    fn log_page(&mut self, from: Cursor, limit: usize) -> Result<Vec<RevisionRecord>, SourceError> {
        let range = format!("{from}:0");
        let limit = limit.to_string();
        let xml = self.run(&["log", "--xml", "--verbose", "-r", &range, "--limit", &limit, &self.url])?;
        parse_log_xml(&xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_client_is_an_io_error() {
        let mut source = SvnCliSource::new("https://svn.example.org/repo")
            .with_program("definitely-not-an-installed-svn-client");
        assert!(matches!(source.head_revision(), Err(SourceError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn failing_client_reports_exit_status() {
        let mut source = SvnCliSource::new("https://svn.example.org/repo").with_program("false");
        let err = source.log_page(Cursor::Head, 10).unwrap_err();
        assert!(matches!(err, SourceError::Command { ref program, .. } if program == "false"));
    }
}
