//! Unix socket listener with a thread per connection

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{LqlError, Result};
use crate::parser::ResponseHeader;
use crate::server::buffer::OutputBuffer;
use crate::server::store::Store;

/// How often the accept loop looks at the shutdown flag
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Rows between two checks whether the client hung up
const HANGUP_CHECK_INTERVAL: u32 = 256;

pub struct Server {
    store: Arc<Store>,
    listener: UnixListener,
    socket_path: PathBuf,
    max_connections: usize,
    idle_timeout: Duration,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

/// Counts a connection as active while alive
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Server {
    /// Bind the configured socket, replacing a stale socket file
    pub fn bind(store: Arc<Store>, config: &Config, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let socket_path = config.socket_path.clone();
        if socket_path.exists() {
            debug!("removing stale socket {}", socket_path.display());
            std::fs::remove_file(&socket_path)?;
        }
        let listener = UnixListener::bind(&socket_path)?;
        listener.set_nonblocking(true)?;
        info!("listening on {}", socket_path.display());
        Ok(Self {
            store,
            listener,
            socket_path,
            max_connections: config.max_connections.max(1),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs.max(1)),
            shutdown,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until shutdown
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, _)) => self.spawn_connection(stream)?,
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => warn!("accept failed: {}", e),
            }
        }
        info!("stopped listening on {}", self.socket_path.display());
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!("cannot remove {}: {}", self.socket_path.display(), e);
        }
        Ok(())
    }

    fn spawn_connection(&self, stream: UnixStream) -> Result<()> {
        stream.set_nonblocking(false)?;
        if self.active.fetch_add(1, Ordering::SeqCst) >= self.max_connections {
            self.active.fetch_sub(1, Ordering::SeqCst);
            warn!(
                "rejecting connection, {} connections are active",
                self.max_connections
            );
            return Ok(());
        }
        let guard = ConnectionGuard(Arc::clone(&self.active));
        let store = Arc::clone(&self.store);
        let idle_timeout = self.idle_timeout;
        let shutdown = Arc::clone(&self.shutdown);
        thread::Builder::new()
            .name("lql-connection".to_string())
            .spawn(move || {
                let _guard = guard;
                debug!("connection opened");
                if let Err(e) = handle_connection(stream, &store, idle_timeout, &shutdown) {
                    debug!("connection closed with error: {}", e);
                } else {
                    debug!("connection closed");
                }
            })?;
        Ok(())
    }
}

/// Serve requests on one connection until the client is done
pub fn handle_connection(
    stream: UnixStream,
    store: &Store,
    idle_timeout: Duration,
    shutdown: &AtomicBool,
) -> Result<()> {
    stream.set_read_timeout(Some(idle_timeout))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    while !shutdown.load(Ordering::SeqCst) {
        let text = match read_request(&mut reader) {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(e @ LqlError::IncompleteRequest(_)) => {
                let mut buffer = OutputBuffer::new(ResponseHeader::Off);
                buffer.set_error(&e);
                writer.write_all(buffer.finish().as_bytes())?;
                break;
            }
            Err(e) => return Err(e),
        };
        let rows = std::cell::Cell::new(0u32);
        let client_gone = || {
            rows.set(rows.get().wrapping_add(1));
            rows.get() % HANGUP_CHECK_INTERVAL == 0 && peer_closed(&writer)
        };
        let answer = store.answer_request(&text, &client_gone);
        writer.write_all(answer.output.as_bytes())?;
        writer.flush()?;
        if !answer.keepalive {
            break;
        }
    }
    Ok(())
}

/// Read lines up to an empty line or EOF
///
/// `None` means the client closed the connection or stayed idle between
/// requests.
fn read_request(reader: &mut impl BufRead) -> Result<Option<String>> {
    let mut text = String::new();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let content = line.trim_end_matches(['\n', '\r']);
                if content.is_empty() {
                    if text.is_empty() {
                        continue;
                    }
                    break;
                }
                text.push_str(content);
                text.push('\n');
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if text.is_empty() && line.is_empty() {
                    debug!("connection idle, closing");
                    return Ok(None);
                }
                return Err(LqlError::IncompleteRequest(
                    "Timeout while reading request".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok((!text.is_empty()).then_some(text))
}

/// Whether the client closed its end of the connection
fn peer_closed(stream: &UnixStream) -> bool {
    let mut fd = libc::pollfd {
        fd: stream.as_raw_fd(),
        events: 0,
        revents: 0,
    };
    // SAFETY: `fd` points to one valid pollfd for a descriptor owned by
    // `stream`, which outlives the call.
    let ready = unsafe { libc::poll(&mut fd, 1, 0) };
    if ready < 0 {
        error!("poll on client connection failed");
        return false;
    }
    ready > 0 && fd.revents & (libc::POLLHUP | libc::POLLERR) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionContext;
    use crate::monitoring::snapshot::fixtures::site;
    use crate::monitoring::LiveCore;
    use std::io::{Cursor, Read};
    use std::net::Shutdown;

    #[test]
    fn test_read_request_stops_at_blank_line() {
        let mut input = Cursor::new("\nGET hosts\nColumns: name\n\nGET status\n");
        assert_eq!(
            read_request(&mut input).unwrap().as_deref(),
            Some("GET hosts\nColumns: name\n")
        );
        assert_eq!(read_request(&mut input).unwrap().as_deref(), Some("GET status\n"));
        assert_eq!(read_request(&mut input).unwrap(), None);
    }

    fn store() -> Store {
        Store::new(Arc::new(LiveCore::new(site())), ExecutionContext::default(), None)
    }

    #[test]
    fn test_keepalive_connection() {
        let (mut client, server) = UnixStream::pair().unwrap();
        let handle = thread::spawn(move || {
            let shutdown = AtomicBool::new(false);
            handle_connection(server, &store(), Duration::from_secs(5), &shutdown)
        });
        client
            .write_all(b"GET hosts\nColumns: name\nKeepAlive: on\nResponseHeader: fixed16\n\n")
            .unwrap();
        client.write_all(b"GET status\nColumns: nagios_pid\n\n").unwrap();
        client.shutdown(Shutdown::Write).unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        handle.join().unwrap().unwrap();
        assert_eq!(reply, "200           9\nh1\nh2\nh3\n4242\n");
    }

    #[test]
    fn test_connection_closes_without_keepalive() {
        let (mut client, server) = UnixStream::pair().unwrap();
        let handle = thread::spawn(move || {
            let shutdown = AtomicBool::new(false);
            handle_connection(server, &store(), Duration::from_secs(5), &shutdown)
        });
        client.write_all(b"GET status\nColumns: nagios_pid\n\n").unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        handle.join().unwrap().unwrap();
        assert_eq!(reply, "4242\n");
    }

    #[test]
    fn test_incomplete_request_times_out() {
        let (mut client, server) = UnixStream::pair().unwrap();
        let handle = thread::spawn(move || {
            let shutdown = AtomicBool::new(false);
            handle_connection(server, &store(), Duration::from_millis(100), &shutdown)
        });
        client.write_all(b"GET hosts\nColumns: name").unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        handle.join().unwrap().unwrap();
        assert_eq!(reply, "Timeout while reading request\n");
    }

    #[test]
    fn test_peer_closed() {
        let (client, server) = UnixStream::pair().unwrap();
        assert!(!peer_closed(&server));
        client.shutdown(Shutdown::Write).unwrap();
        assert!(!peer_closed(&server));
        drop(client);
        assert!(peer_closed(&server));
    }

    #[test]
    fn test_server_answers_on_socket() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            socket_path: dir.path().join("live"),
            ..Config::default()
        };
        let shutdown = Arc::new(AtomicBool::new(false));
        let server = Server::bind(Arc::new(store()), &config, Arc::clone(&shutdown)).unwrap();
        let path = server.socket_path().to_path_buf();
        let handle = thread::spawn(move || server.run());

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"GET hosts\nColumns: name\nFilter: state = 1\n\n").unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "h2\n");

        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap().unwrap();
        assert!(!path.exists());
    }
}
