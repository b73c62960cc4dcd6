//! Byte transport underneath a session.
//!
//! A UHID transport preserves event boundaries: `/dev/uhid` hands out one
//! event per `read(2)`, and the simulated channel is a connected Unix
//! datagram pair so that the same holds in tests.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tokio::io::unix::AsyncFd;
use tokio::net::UnixDatagram;

pub enum Endpoint {
    /// One end of a simulated channel.
    Socket(UnixDatagram),
    /// A non-blocking `/dev/uhid` handle.
    Device(AsyncFd<File>),
}

impl Endpoint {
    /// Opens a UHID character device in non-blocking mode.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open_device(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)?;
        Ok(Endpoint::Device(AsyncFd::new(file)?))
    }

    pub async fn send(&self, frame: &[u8]) -> io::Result<usize> {
        match self {
            Endpoint::Socket(socket) => socket.send(frame).await,
            Endpoint::Device(fd) => loop {
                let mut guard = fd.writable().await?;
                match guard.try_io(|inner| {
                    let mut file = inner.get_ref();
                    file.write(frame)
                }) {
                    Ok(result) => return result,
                    Err(_would_block) => continue,
                }
            },
        }
    }

    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Endpoint::Socket(socket) => socket.recv(buf).await,
            Endpoint::Device(fd) => loop {
                let mut guard = fd.readable().await?;
                match guard.try_io(|inner| {
                    let mut file = inner.get_ref();
                    file.read(buf)
                }) {
                    Ok(result) => return result,
                    Err(_would_block) => continue,
                }
            },
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Endpoint::Socket(_))
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Socket(_) => f.write_str("Endpoint::Socket"),
            Endpoint::Device(_) => f.write_str("Endpoint::Device"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_socket_endpoint_preserves_boundaries() -> io::Result<()> {
        let (a, b) = UnixDatagram::pair()?;
        let endpoint = Endpoint::Socket(a);

        endpoint.send(&[1, 2, 3]).await?;
        endpoint.send(&[4, 5]).await?;

        let mut buf = [0u8; 16];
        assert_eq!(b.recv(&mut buf).await?, 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(b.recv(&mut buf).await?, 2);
        assert!(endpoint.is_simulated());
        Ok(())
    }

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        let result = Endpoint::open_device(Path::new("/nonexistent/uhid"));
        assert!(result.is_err());
    }
}
