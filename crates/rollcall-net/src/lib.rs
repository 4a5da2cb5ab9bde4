// Outbound networking: the central datastore client, the relay transport used
// by submitting devices, and the reachability signal that drives resyncs.

pub mod connectivity;
pub mod datastore;
pub mod error;
pub mod relay_client;

pub use connectivity::{Connectivity, NetworkMonitor};
pub use datastore::{CentralDatastore, DatastoreConfig, RealtimeDatabase};
pub use error::{Channel, NetError};
pub use relay_client::{HttpRelayTransport, RelayTransport};
