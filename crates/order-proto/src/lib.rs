/// Generated gRPC protocol definitions for the Order service.
///
/// Messages and the `OrderService` client and server are generated from
/// `proto/order.proto` at build time.
pub mod pb {
    tonic::include_proto!("pb");
}

// Re-export commonly used types for convenience
pub use pb::*;
