//! Blocking client for the subset of the Music Player Daemon protocol that
//! mpdqueue needs: handshake, `password`, `status`, `update`, `add` and `close`.
//!
//! # Framing
//!
//! Responses are not length-prefixed. A read cycle collects bytes until the
//! socket stays quiet for the configured read timeout (250 ms by default) and
//! then splits them into lines. See [`response::read_until_idle`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use mpdqueue_client::{Connection, ConnectionOptions, IndexSyncWaiter, SyncOptions, SystemClock};
//! use mpdqueue_core::ServerEndpoint;
//!
//! let endpoint = ServerEndpoint::new("localhost", 6600, None)?;
//! let mut connection = Connection::connect(&endpoint, &ConnectionOptions::default())?;
//! IndexSyncWaiter::new(SystemClock, SyncOptions::default())
//!     .sync(&mut connection, "Artist/Album")?;
//! connection.add("Artist/Album/01 Intro.flac")?;
//! connection.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod connection;
mod error;
pub mod response;
mod sync;
pub mod testing;
mod transport;

pub use connection::{quote_argument, Connection, Connector, TcpConnector};
pub use error::{EnqueueError, MpdError, MpdResult};
pub use response::Response;
pub use sync::{Clock, IndexSyncWaiter, SyncError, SyncOptions, SyncReport, SyncState, SystemClock};
pub use transport::{ConnectionOptions, TcpTransport, Transport};
