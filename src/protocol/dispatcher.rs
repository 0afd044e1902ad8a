use crate::error::Result;
use crate::reactor::connection::Connection;
use std::sync::Arc;

/// Sink for reassembled frames.
///
/// Called once per complete frame, on the worker thread that owns the
/// connection, in the order frames arrived. Calls for one connection never
/// overlap; calls for connections on different workers may run concurrently.
///
/// Returning an error is treated like a read failure: the connection is
/// disconnected and no further frames from the same buffer are delivered.
pub trait FrameProcessor: Send + Sync + 'static {
    fn process(&self, connection: &Arc<Connection>, frame: &[u8]) -> Result<()>;
}

impl<F> FrameProcessor for F
where
    F: Fn(&Arc<Connection>, &[u8]) -> Result<()> + Send + Sync + 'static,
{
    #[inline]
    fn process(&self, connection: &Arc<Connection>, frame: &[u8]) -> Result<()> {
        self(connection, frame)
    }
}
