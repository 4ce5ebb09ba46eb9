//! Client for the event console status socket
//!
//! The event console speaks a small Livestatus-like protocol: a request is
//! written, the write side is shut down, and the reply is read until an
//! empty line or EOF. Table replies are tab separated, starting with a
//! header line naming the columns.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LqlError, Result};
use crate::parser::ExternalCommand;

/// Field separator within list values
pub const LIST_SEPARATOR: char = '\x01';

/// Marker the event console uses for an empty list
pub const EMPTY_LIST: &str = "\x02";

/// Event console section of the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConsoleConfig {
    pub enabled: bool,
    pub socket_path: PathBuf,
    /// Read and write timeout for one request
    pub timeout_secs: u64,
}

impl Default for EventConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            socket_path: PathBuf::from("/var/run/mkeventd/status"),
            timeout_secs: 10,
        }
    }
}

/// Split a list value into its elements
pub fn split_list(text: &str) -> impl Iterator<Item = &str> {
    let empty = text.is_empty() || text == EMPTY_LIST;
    text.split(LIST_SEPARATOR).filter(move |_| !empty)
}

#[derive(Debug, Clone)]
pub struct EventConsoleClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl EventConsoleClient {
    pub fn new(config: &EventConsoleConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// A client for the configured socket, `None` when the event console is
    /// disabled
    pub fn from_config(config: &EventConsoleConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config))
    }

    fn gateway(&self, what: &str, err: std::io::Error) -> LqlError {
        LqlError::Gateway(format!(
            "{} event console at {}: {}",
            what,
            self.socket_path.display(),
            err
        ))
    }

    /// Send one request and return the connection for reading the reply
    fn send(&self, request: &str) -> Result<UnixStream> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| self.gateway("cannot connect to", e))?;
        debug!("connected to event console at {}", self.socket_path.display());
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|e| self.gateway("cannot configure connection to", e))?;
        stream
            .write_all(request.as_bytes())
            .and_then(|_| stream.shutdown(Shutdown::Write))
            .map_err(|e| self.gateway("cannot send request to", e))?;
        Ok(stream)
    }

    /// Send a table request and start reading the reply
    pub fn query(&self, request: &str) -> Result<Reply> {
        let stream = self.send(request)?;
        let mut reply = Reply {
            reader: BufReader::new(stream),
            header: Vec::new(),
            source: self.socket_path.display().to_string(),
        };
        reply.header = reply.next_line()?.map(split_fields).unwrap_or_default();
        Ok(reply)
    }

    /// Forward an `EC_` command with the prefix removed
    pub fn send_command(&self, command: &ExternalCommand) -> Result<()> {
        let name = command.name.strip_prefix("EC_").unwrap_or(&command.name);
        let text = if command.arguments.is_empty() {
            format!("COMMAND {}", name)
        } else {
            format!("COMMAND {};{}", name, command.arguments)
        };
        let mut stream = self.send(&text)?;
        let mut sink = Vec::new();
        stream
            .read_to_end(&mut sink)
            .map_err(|e| self.gateway("cannot read reply from", e))?;
        info!("forwarded command {} to the event console", name);
        Ok(())
    }
}

fn split_fields(line: String) -> Vec<String> {
    line.split('\t').map(str::to_string).collect()
}

/// A streamed table reply
pub struct Reply {
    reader: BufReader<UnixStream>,
    header: Vec<String>,
    source: String,
}

impl Reply {
    /// Column names, empty when the reply had no lines at all
    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).map_err(|e| {
            LqlError::Gateway(format!("cannot read reply from event console at {}: {}", self.source, e))
        })?;
        let line = line.trim_end_matches('\n').to_string();
        if n == 0 || line.is_empty() {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// The next row, `None` at the end of the reply
    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let fields = split_fields(line);
        if fields.len() != self.header.len() {
            return Err(LqlError::Gateway(format!(
                "invalid reply from event console at {}: expected {} fields, got {}",
                self.source,
                self.header.len(),
                fields.len()
            )));
        }
        Ok(Some(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::thread;

    fn fake_console(reply: &'static str) -> (tempfile::TempDir, EventConsoleConfig, thread::JoinHandle<String>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = String::new();
            stream.read_to_string(&mut request).unwrap();
            stream.write_all(reply.as_bytes()).unwrap();
            request
        });
        let config = EventConsoleConfig {
            enabled: true,
            socket_path: path,
            timeout_secs: 5,
        };
        (dir, config, handle)
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a\x01b").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(split_list("").count(), 0);
        assert_eq!(split_list("\x02").count(), 0);
    }

    #[test]
    fn test_query_reads_rows() {
        let (_dir, config, handle) = fake_console("event_id\tevent_text\n1\tdisk full\n2\tok\n");
        let client = EventConsoleClient::new(&config);
        let mut reply = client.query("GET events\n").unwrap();
        assert_eq!(reply.header(), ["event_id", "event_text"]);
        assert_eq!(reply.next_row().unwrap().unwrap(), vec!["1", "disk full"]);
        assert_eq!(reply.next_row().unwrap().unwrap(), vec!["2", "ok"]);
        assert!(reply.next_row().unwrap().is_none());
        assert_eq!(handle.join().unwrap(), "GET events\n");
    }

    #[test]
    fn test_field_count_mismatch_is_gateway_error() {
        let (_dir, config, _handle) = fake_console("event_id\tevent_text\n1\n");
        let mut reply = EventConsoleClient::new(&config).query("GET events\n").unwrap();
        assert!(matches!(reply.next_row(), Err(LqlError::Gateway(_))));
    }

    #[test]
    fn test_unreachable_console_is_gateway_error() {
        let config = EventConsoleConfig {
            enabled: true,
            socket_path: PathBuf::from("/nonexistent/lql-test/status"),
            timeout_secs: 1,
        };
        let err = EventConsoleClient::new(&config).query("GET events\n").err().unwrap();
        assert!(matches!(err, LqlError::Gateway(_)));
    }

    #[test]
    fn test_command_drops_prefix() {
        let (_dir, config, handle) = fake_console("");
        let command = crate::parser::parse_external_command("[1] EC_DELETE;12;admin").unwrap();
        EventConsoleClient::new(&config).send_command(&command).unwrap();
        assert_eq!(handle.join().unwrap(), "COMMAND DELETE;12;admin");
    }

    #[test]
    fn test_command_reply_timeout_is_gateway_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = String::new();
            stream.read_to_string(&mut request).unwrap();
            thread::sleep(Duration::from_millis(2500));
        });
        let config = EventConsoleConfig {
            enabled: true,
            socket_path: path,
            timeout_secs: 1,
        };
        let command = crate::parser::parse_external_command("EC_RELOAD").unwrap();
        let err = EventConsoleClient::new(&config).send_command(&command).unwrap_err();
        assert!(err.to_string().starts_with("cannot read reply from event console"));
        handle.join().unwrap();
    }

    #[test]
    fn test_disabled_console_has_no_client() {
        assert!(EventConsoleClient::from_config(&EventConsoleConfig::default()).is_none());
    }
}
