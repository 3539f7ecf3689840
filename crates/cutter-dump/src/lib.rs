//! cutter-dump: direct-to-local database backups
//!
//! Runs vendor dump tools inside throwaway containers, optionally reaching
//! the database through an SSH local forward opened on a jump host:
//!
//! - [`port`] picks a free loopback port for the forward
//! - [`tunnel`] owns the ssh subprocess and its readiness probe
//! - [`compose`] turns a job into a container + compressor pipeline
//! - [`executor`] runs that pipeline into the artifact file
//! - [`runner`] sequences the above and always tears the tunnel down
//! - [`catalog`] lists dump files already on disk

pub mod catalog;
pub mod compose;
pub mod executor;
pub mod port;
pub mod runner;
pub mod tunnel;

pub use compose::{CommandComposer, CommandSpec, ComposedCommand, ConnectionParams, NetworkMode, Topology};
pub use executor::{DumpExecutor, ExecutionResult};
pub use port::allocate_ephemeral_port;
pub use runner::BackupRunner;
pub use tunnel::{TunnelHandle, TunnelState, TunnelSupervisor};
