//! Loopback sender for testing.
//!
//! Hands every outbound frame to an in-process [`tokio::sync::mpsc`]
//! channel instead of a socket. Dropping the receiver simulates a closed
//! connection.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use roomchat_proto::frame::OutboundFrame;

use super::{FrameSender, TransportError};

/// In-process [`FrameSender`] backed by an unbounded channel.
#[derive(Debug)]
pub struct LoopbackSender {
    tx: Mutex<Option<mpsc::UnboundedSender<OutboundFrame>>>,
}

impl LoopbackSender {
    /// Create a sender and the receiver that observes its frames.
    ///
    /// # Example
    ///
    /// ```rust
    /// use roomchat::transport::FrameSender;
    /// use roomchat::transport::loopback::LoopbackSender;
    /// use roomchat_proto::frame::{FrameKind, OutboundFrame};
    ///
    /// let (sender, mut rx) = LoopbackSender::new();
    /// sender
    ///     .send(&OutboundFrame::text(FrameKind::Room, "r1", "hi"))
    ///     .unwrap();
    /// assert_eq!(rx.try_recv().unwrap().to, "r1");
    /// ```
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl FrameSender for LoopbackSender {
    fn send(&self, frame: &OutboundFrame) -> Result<(), TransportError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(TransportError::Unavailable)?;
        tx.send(frame.clone())
            .map_err(|_| TransportError::Unavailable)
    }

    fn is_connected(&self) -> bool {
        self.tx.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn close(&self) {
        self.tx.lock().take();
    }
}
