//! The Storage Node Client (§2 item 3), the storage-node chooser
//! contract, and the Check Stream (§4.3).

pub mod check_stream;
pub mod chooser;
pub mod client;

pub use check_stream::{check_stream, CheckStreamError, CheckStreamHandle};
pub use chooser::{ChooserError, FakeStorageNodeChooser, StorageNodeChooser, StorageNodeDescriptor};
pub use client::{
    FakeStorageNodeTransport, GetOutcome, PutOutcome, StorageError, StorageNodePool,
    StorageNodeTransport,
};
