//! # Core Module
//!
//! Concurrency primitives shared by the rest of the pipeline.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `SwapCell`: Atomically replaceable value whose `swap` returns the displaced value
//! - `SerialExecutor`: Single-consumer mailbox thread that runs posted jobs in order

pub mod mailbox;
pub mod mt_resource;
pub mod swap_cell;

pub use mailbox::SerialExecutor;
pub use mt_resource::MtResource;
pub use swap_cell::SwapCell;
