use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use divercite::{InboundEvent, MoveIntent, WireMessage};
use tracing::{debug, trace, warn};

/// Connecting blocks the UI loop, so it must give up quickly.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// A live connection to the game server.
///
/// Incoming messages are read on a separate thread and handed to the UI
/// loop through a channel, in the order they arrived.
pub struct Connection {
    stream: TcpStream,
    writer: BufWriter<TcpStream>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Connects and identifies as a viewer.
    ///
    /// On failure, a [`InboundEvent::TransportFailed`] is sent and `None` returned.
    pub fn open(address: &str, timeout: Duration, events: Sender<InboundEvent>) -> Option<Self> {
        match Self::try_open(address, timeout, events.clone()) {
            Ok(connection) => Some(connection),
            Err(err) => {
                let reason = format!("Could not connect to {}: {}", address, err);
                // The receiver only goes away when the viewer shuts down.
                let _ = events.send(InboundEvent::TransportFailed(reason));
                None
            }
        }
    }

    fn try_open(
        address: &str,
        timeout: Duration,
        events: Sender<InboundEvent>,
    ) -> anyhow::Result<Self> {
        let stream = connect_timeout(address, timeout)?;
        let mut connection = Self {
            writer: BufWriter::new(stream.try_clone()?),
            stream: stream.try_clone()?,
            reader: None,
        };
        connection.write_message(&WireMessage::identify(&viewer_identifier()))?;
        events.send(InboundEvent::Connected)?;
        connection.reader = Some(std::thread::spawn(move || read_messages(stream, events)));
        Ok(connection)
    }

    pub fn send(&mut self, intent: MoveIntent) -> anyhow::Result<()> {
        self.write_message(&WireMessage::interact(intent)?)
    }

    fn write_message(&mut self, msg: &WireMessage) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(msg)?;
        trace!(name: "Sending message", message = %line);
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Unblocks the reader thread.
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Tries every address `address` resolves to, each for at most `timeout`.
fn connect_timeout(address: &str, timeout: Duration) -> anyhow::Result<TcpStream> {
    let mut last_err = None;
    for addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!(%addr, "Connection attempt failed: {}", err);
                last_err = Some(err);
            }
        }
    }
    match last_err {
        Some(err) => Err(err.into()),
        None => anyhow::bail!("'{}' does not resolve to any address", address),
    }
}

/// Servers tell viewers apart from players by this prefix.
fn viewer_identifier() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    format!("__GUI__{}", millis)
}

fn read_messages(stream: TcpStream, events: Sender<InboundEvent>) {
    let mut reader = BufReader::new(stream);
    let mut buf = String::new();
    loop {
        buf.clear();
        let event = match reader.read_line(&mut buf) {
            Ok(0) => InboundEvent::Disconnected,
            Ok(_) => {
                let line = buf.trim_end();
                if line.is_empty() {
                    continue;
                }
                trace!(name: "Received message", message = %line);
                match serde_json::from_str::<WireMessage>(line) {
                    Ok(msg) => match msg.into_inbound() {
                        Some(event) => event,
                        None => {
                            debug!("Ignoring message without a known event");
                            continue;
                        }
                    },
                    Err(err) => {
                        warn!("Ignoring malformed message: {}", err);
                        continue;
                    }
                }
            }
            Err(err) => InboundEvent::TransportFailed(format!("Connection broke: {}", err)),
        };
        let last = matches!(
            event,
            InboundEvent::Disconnected | InboundEvent::TransportFailed(_)
        );
        if events.send(event).is_err() || last {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Instant;

    use divercite::{GridCell, PieceKind};
    use serde_json::json;

    use super::*;

    #[test]
    fn exchanges_lines_with_a_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut identify = String::new();
            reader.read_line(&mut identify).unwrap();
            writeln!(writer, r#"{{"event": "chat", "data": 1}}"#).unwrap();
            writeln!(writer, "not json").unwrap();
            writeln!(writer, r#"{{"event": "ActionNotPermitted"}}"#).unwrap();
            writeln!(writer, r#"{{"event": "done", "data": {{"1": 5}}}}"#).unwrap();
            let mut interact = String::new();
            reader.read_line(&mut interact).unwrap();
            (identify, interact)
        });

        let (tx, rx) = mpsc::channel();
        let mut connection = Connection::open(&address, CONNECT_TIMEOUT, tx).unwrap();
        assert_eq!(rx.recv().unwrap(), InboundEvent::Connected);
        assert_eq!(rx.recv().unwrap(), InboundEvent::ActionRejected);
        assert_eq!(
            rx.recv().unwrap(),
            InboundEvent::GameOver(json!({"1": 5}))
        );
        let intent = MoveIntent {
            piece: "YR".parse::<PieceKind>().unwrap(),
            cell: GridCell { row: 1, col: 3 },
        };
        connection.send(intent).unwrap();

        let (identify, interact) = server.join().unwrap();
        let identify: WireMessage = serde_json::from_str(&identify).unwrap();
        assert_eq!(identify.event, "identify");
        assert!(identify.data["identifier"]
            .as_str()
            .unwrap()
            .starts_with("__GUI__"));
        let interact: serde_json::Value = serde_json::from_str(&interact).unwrap();
        assert_eq!(
            interact,
            json!({"event": "interact", "data": {"piece": "YR", "position": [1, 3]}})
        );
        // The server closed its end.
        assert_eq!(rx.recv().unwrap(), InboundEvent::Disconnected);
    }

    #[test]
    fn failed_connects_are_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let (tx, rx) = mpsc::channel();
        assert!(Connection::open(&address, CONNECT_TIMEOUT, tx).is_none());
        assert!(matches!(
            rx.recv().unwrap(),
            InboundEvent::TransportFailed(_)
        ));
    }

    #[test]
    fn connecting_gives_up_after_the_timeout() {
        // Not routable, so the attempt either fails at once or times out.
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        assert!(Connection::open("10.255.255.1:9", Duration::from_millis(200), tx).is_none());
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(matches!(
            rx.recv().unwrap(),
            InboundEvent::TransportFailed(_)
        ));

        let (tx, rx) = mpsc::channel();
        assert!(Connection::open("no port here", CONNECT_TIMEOUT, tx).is_none());
        assert!(matches!(
            rx.recv().unwrap(),
            InboundEvent::TransportFailed(_)
        ));
    }
}
