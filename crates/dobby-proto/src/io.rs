//! The physical (or simulated) connection to a loom (spec §4.5 "Loom
//! connection kinds").
//!
//! Three transports share one interface: a TCP socket for gen 4's network
//! dialect, a Unix domain socket for the `DRAWBOY_SOCKET` test harness, and
//! a real serial port for gen 1–3 hardware. `serialport` is blocking, so
//! the serial variant is driven from a dedicated thread via
//! `spawn_blocking` and bridged to async callers with an mpsc channel, the
//! same shape the teacher uses for other blocking-API integrations.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;

use crate::dialect::Generation;

/// How to reach the loom: a hostname/port for gen 4, a device path for
/// gen 1–3 hardware, or a Unix socket path for the test harness (selected
/// via `DRAWBOY_SOCKET`, never by the user-facing CLI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoomAddress {
    Tcp(String, u16),
    Serial(String),
    UnixSocket(String),
}

/// A half-duplex byte conduit to the loom, abstracting over the three
/// [`LoomAddress`] kinds behind one `read`/`write` surface.
pub enum LoomConn {
    Tcp(TcpStream),
    Unix(UnixStream),
    Serial(SerialConn),
}

impl LoomConn {
    pub async fn connect(address: &LoomAddress, generation: Generation) -> Result<Self> {
        match address {
            LoomAddress::Tcp(host, port) => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .with_context(|| format!("connecting to loom at {host}:{port}"))?;
                Ok(LoomConn::Tcp(stream))
            }
            LoomAddress::UnixSocket(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .with_context(|| format!("connecting to test harness socket {path}"))?;
                Ok(LoomConn::Unix(stream))
            }
            LoomAddress::Serial(device) => {
                Ok(LoomConn::Serial(SerialConn::open(device, generation)?))
            }
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            LoomConn::Tcp(s) => s.read(buf).await,
            LoomConn::Unix(s) => s.read(buf).await,
            LoomConn::Serial(s) => s.read(buf).await,
        }
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            LoomConn::Tcp(s) => s.write_all(data).await,
            LoomConn::Unix(s) => s.write_all(data).await,
            LoomConn::Serial(s) => s.write_all(data).await,
        }
    }
}

/// A serial port driven on a blocking worker thread; reads and writes are
/// relayed across channels so the runtime's `tokio::select!` loop can treat
/// it like any other async conduit.
pub struct SerialConn {
    rx: mpsc::Receiver<io::Result<Vec<u8>>>,
    tx: mpsc::Sender<Vec<u8>>,
}

impl SerialConn {
    fn open(device: &str, generation: Generation) -> Result<Self> {
        let (data_bits, parity_even, stop_bits) = generation.framing();
        let mut port = serialport::new(device, generation.baud())
            .data_bits(match data_bits {
                7 => serialport::DataBits::Seven,
                _ => serialport::DataBits::Eight,
            })
            .parity(if parity_even {
                serialport::Parity::Even
            } else {
                serialport::Parity::None
            })
            .stop_bits(match stop_bits {
                2 => serialport::StopBits::Two,
                _ => serialport::StopBits::One,
            })
            .timeout(Duration::from_millis(200))
            .open()
            .with_context(|| format!("opening serial device {device}"))?;

        let (read_tx, read_rx) = mpsc::channel::<io::Result<Vec<u8>>>(16);
        let (write_tx, mut write_rx) = mpsc::channel::<Vec<u8>>(16);

        let reader_port = port.try_clone().with_context(|| "cloning serial handle for reader thread")?;
        std::thread::spawn(move || {
            let mut port = reader_port;
            let mut buf = [0u8; 256];
            loop {
                match io::Read::read(&mut port, &mut buf) {
                    Ok(0) => continue,
                    Ok(n) => {
                        if read_tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        let _ = read_tx.blocking_send(Err(e));
                        return;
                    }
                }
            }
        });

        std::thread::spawn(move || {
            while let Some(bytes) = write_rx.blocking_recv() {
                if io::Write::write_all(&mut port, &bytes).is_err() {
                    return;
                }
            }
        });

        Ok(Self {
            rx: read_rx,
            tx: write_tx,
        })
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.rx.recv().await {
            Some(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.tx
            .send(data.to_vec())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "serial writer thread gone"))
    }
}
