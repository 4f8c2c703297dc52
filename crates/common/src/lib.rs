/**
 * The allocation tree and the backends that
 *  store it.
 * Describes the nodes, listing pages and errors
 *  the gateway consumes, plus in-memory and local
 *  filesystem implementations.
 */
pub mod allocation;
/**
 * Gateway configuration, constructed once
 *  at startup.
 */
pub mod config;
/**
 * Bucket / object view of an allocation.
 *  Path mapping, listings, object io and
 *  error translation.
 */
pub mod gateway;

pub mod prelude {
    pub use crate::allocation::{
        Allocation, AllocationError, LocalAllocation, MemoryAllocation, Node, NodeKind,
    };
    pub use crate::config::GatewayConfig;
    pub use crate::gateway::{AllocationGateway, GatewayError, RangeSpec, StorageGateway};
}
