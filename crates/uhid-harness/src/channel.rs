//! Simulated channel between the harness and the session under test.
//!
//! A connected datagram socket pair: every event the session writes arrives
//! as exactly one read on the harness side, and vice versa.

use std::io;
use std::rc::Rc;

use tokio::net::UnixDatagram;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

use crate::session::SessionEvent;
use crate::task::TaskGuard;

/// Harness-side endpoint.
#[derive(Debug, Clone)]
pub struct SimChannel {
    socket: Rc<UnixDatagram>,
}

impl SimChannel {
    /// Allocates the pair, returning the harness endpoint and the endpoint
    /// to hand to the session.
    ///
    /// # Errors
    ///
    /// Fails if the socket pair cannot be created.
    pub fn pair() -> io::Result<(Self, UnixDatagram)> {
        let (harness, device) = UnixDatagram::pair()?;
        debug!("simulated channel allocated");
        Ok((
            Self {
                socket: Rc::new(harness),
            },
            device,
        ))
    }

    /// Starts a readiness watch posting one [`SessionEvent::Frame`] per
    /// datagram the session writes.
    ///
    /// Datagrams longer than `capacity` are reported as `capacity + 1`
    /// bytes, never truncated to a length that could match.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `LocalSet`.
    pub fn watch(&self, events: UnboundedSender<SessionEvent>, capacity: usize) -> TaskGuard {
        let socket = Rc::clone(&self.socket);
        TaskGuard::spawn(async move {
            let mut buf = vec![0u8; capacity + 1];
            loop {
                let event = match socket.recv(&mut buf).await {
                    Ok(len) => {
                        trace!(len, "channel readable");
                        SessionEvent::Frame(buf.get(..len).unwrap_or_default().to_vec())
                    }
                    Err(e) => SessionEvent::ChannelError(e.to_string()),
                };
                let stop = matches!(event, SessionEvent::ChannelError(_));
                if events.send(event).is_err() || stop {
                    return;
                }
            }
        })
    }

    /// Writes one frame towards the session.
    ///
    /// # Errors
    ///
    /// Propagates socket errors.
    pub async fn send(&self, frame: &[u8]) -> io::Result<usize> {
        self.socket.send(frame).await
    }

    /// Clone of the socket for a task that writes on the harness's behalf.
    pub(crate) fn socket(&self) -> Rc<UnixDatagram> {
        Rc::clone(&self.socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn test_watch_reports_each_datagram() -> io::Result<()> {
        LocalSet::new()
            .run_until(async {
                let (channel, device) = SimChannel::pair()?;
                let (tx, mut rx) = mpsc::unbounded_channel();
                let _watch = channel.watch(tx, 8);

                device.send(&[1, 2, 3]).await?;
                device.send(&[4]).await?;

                assert!(matches!(rx.recv().await, Some(SessionEvent::Frame(f)) if f == [1, 2, 3]));
                assert!(matches!(rx.recv().await, Some(SessionEvent::Frame(f)) if f == [4]));
                Ok(())
            })
            .await
    }

    #[tokio::test]
    async fn test_watch_keeps_oversized_datagram_distinguishable() -> io::Result<()> {
        LocalSet::new()
            .run_until(async {
                let (channel, device) = SimChannel::pair()?;
                let (tx, mut rx) = mpsc::unbounded_channel();
                let _watch = channel.watch(tx, 4);

                device.send(&[9; 4]).await?;
                device.send(&[9; 12]).await?;

                assert!(matches!(rx.recv().await, Some(SessionEvent::Frame(f)) if f.len() == 4));
                assert!(matches!(rx.recv().await, Some(SessionEvent::Frame(f)) if f.len() == 5));
                Ok(())
            })
            .await
    }

    #[tokio::test]
    async fn test_send_reaches_device() -> io::Result<()> {
        let (channel, device) = SimChannel::pair()?;
        assert_eq!(channel.send(&[7, 8]).await?, 2);
        let mut buf = [0u8; 4];
        assert_eq!(device.recv(&mut buf).await?, 2);
        Ok(())
    }
}
