//! Generated client/server stubs for the metadata shard RPC surface.
//! The shard server itself is implemented by an out-of-scope external
//! collaborator; this crate only carries the wire contract.

pub mod shard {
    tonic::include_proto!("ringgate.shard");
}
