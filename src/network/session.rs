//! Relay server sessions
//!
//! A [`Dialer`] opens and authenticates a [`Session`] to one gateway. The
//! delivery worker only talks to these traits; [`TcpDialer`] is the APRS-IS
//! implementation.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::constants::{CONNECT_TIMEOUT, DRAIN_BUFFER_SIZE, SOFTWARE_NAME, SOFTWARE_VERSION};
use crate::error::NetworkError;
use crate::network::gateway::{AddressFamily, Gateway};

/// An authenticated, streaming connection to a relay server
pub trait Session: Send {
    /// Write some bytes; may write fewer than given
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read and discard pending server data without blocking.
    ///
    /// Returns the number of bytes discarded; an orderly close by the
    /// server is an error.
    fn drain(&mut self) -> io::Result<usize>;

    /// Close the connection
    fn close(&mut self) -> io::Result<()>;
}

/// Opens sessions to gateways
pub trait Dialer: Send {
    type Session: Session;

    /// Connect to `gateway` and complete the login exchange
    fn dial(&mut self, gateway: &Gateway) -> Result<Self::Session, NetworkError>;
}

/// Credentials and options for the login line
#[derive(Debug, Clone)]
pub struct Login {
    pub callsign: String,
    pub passcode: String,
    pub filter: String,
}

impl Login {
    /// `user CALL pass CODE vers NAME VERSION filter EXPR\r\n`
    pub fn command(&self) -> String {
        format!(
            "user {} pass {} vers {} {} filter {}\r\n",
            self.callsign, self.passcode, SOFTWARE_NAME, SOFTWARE_VERSION, self.filter
        )
    }
}

/// APRS-IS TCP dialer
pub struct TcpDialer {
    login: Login,
    family: AddressFamily,
    timeout: Duration,
}

impl TcpDialer {
    pub fn new(login: Login, family: AddressFamily) -> Self {
        Self {
            login,
            family,
            timeout: CONNECT_TIMEOUT,
        }
    }

    /// Override the connect and login timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn open_socket(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;
        socket.set_keepalive(true)?;
        socket.connect_timeout(&addr.into(), self.timeout)?;
        Ok(socket.into())
    }
}

impl Dialer for TcpDialer {
    type Session = TcpSession;

    fn dial(&mut self, gateway: &Gateway) -> Result<TcpSession, NetworkError> {
        let addr = gateway.resolve(self.family)?;
        tracing::info!("Connecting to {} ({})", gateway, addr);

        let mut stream = self
            .open_socket(addr)
            .map_err(|e| NetworkError::ConnectionFailed(format!("{}: {}", addr, e)))?;
        tracing::info!("Connected to {}", addr);

        stream.set_read_timeout(Some(self.timeout))?;
        // a relay that stops reading must surface as a send error
        stream.set_write_timeout(Some(self.timeout))?;
        let mut reader = BufReader::new(stream.try_clone()?);

        let greeting = read_server_line(&mut reader)?;
        tracing::info!("{}", greeting);

        tracing::info!(
            "Login {} ({} {})",
            self.login.callsign,
            SOFTWARE_NAME,
            SOFTWARE_VERSION
        );
        stream.write_all(self.login.command().as_bytes())?;

        let response = read_server_line(&mut reader)?;
        tracing::info!("{}", response);

        stream.set_read_timeout(None)?;
        Ok(TcpSession::new(stream))
    }
}

/// Read one line sent by the server, for logging only
fn read_server_line<R: BufRead>(reader: &mut R) -> Result<String, NetworkError> {
    let mut line = Vec::new();
    let read = reader.read_until(b'\n', &mut line).map_err(|e| {
        NetworkError::LoginFailed(format!("no server response: {}", e))
    })?;
    if read == 0 {
        return Err(NetworkError::Closed);
    }
    Ok(String::from_utf8_lossy(&line)
        .trim_matches(|c: char| c == ' ' || c == '\r' || c == '\n')
        .to_string())
}

/// Logged-in TCP stream
pub struct TcpSession {
    stream: TcpStream,
    drain_buffer: Vec<u8>,
}

impl TcpSession {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            drain_buffer: vec![0u8; DRAIN_BUFFER_SIZE],
        }
    }
}

impl Session for TcpSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn drain(&mut self) -> io::Result<usize> {
        self.stream.set_nonblocking(true)?;
        let result = self.stream.read(&mut self.drain_buffer);
        self.stream.set_nonblocking(false)?;

        match result {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn login() -> Login {
        Login {
            callsign: "N0CALL".into(),
            passcode: "13023".into(),
            filter: "r/38/-171/1".into(),
        }
    }

    #[test]
    fn test_login_command() {
        let command = login().command();
        assert!(command.starts_with("user N0CALL pass 13023 vers multimon-igate "));
        assert!(command.ends_with(" filter r/38/-171/1\r\n"));
    }

    #[test]
    fn test_dial_performs_login_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"# aprsc 2.1.14\r\n").unwrap();
            let mut reader = BufReader::new(conn.try_clone().unwrap());
            let mut login = String::new();
            reader.read_line(&mut login).unwrap();
            conn.write_all(b"# logresp N0CALL verified, server T2TEST\r\n").unwrap();
            let mut frame = String::new();
            reader.read_line(&mut frame).unwrap();
            (login, frame)
        });

        let gateway: Gateway = format!("127.0.0.1:{}", port).parse().unwrap();
        let mut dialer = TcpDialer::new(login(), AddressFamily::Ipv4)
            .with_timeout(Duration::from_secs(5));
        let mut session = dialer.dial(&gateway).unwrap();

        let line = b"N0CALL>APRS,TCPIP*:>hi\r\n";
        let mut written = 0;
        while written < line.len() {
            written += session.write(&line[written..]).unwrap();
        }

        let (login_line, frame_line) = server.join().unwrap();
        assert!(login_line.starts_with("user N0CALL pass 13023"));
        assert_eq!(frame_line, "N0CALL>APRS,TCPIP*:>hi\r\n");
    }

    #[test]
    fn test_drain_detects_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        let mut session = TcpSession::new(client);

        assert_eq!(session.drain().unwrap(), 0);

        drop(server_side);
        // the FIN may take a moment to arrive on loopback
        let mut closed = false;
        for _ in 0..50 {
            if session.drain().is_err() {
                closed = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(closed);
    }
}
