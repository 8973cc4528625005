//! bkd-core: hierarchical drive over a flat object store
//!
//! This crate provides the engine behind the bkd CLI:
//! - Path parsing and resolution against a drive root
//! - Drive mount/unmount and scoping
//! - Navigation (existence, classification, synthetic directory listing)
//! - Create, copy, move and remove mapped onto flat store primitives
//! - Buffered write and streaming read sessions
//! - Configuration and drive profiles
//!
//! The crate is independent of any specific S3 SDK: the store is reached
//! through the [`ObjectStore`] trait, and [`MemoryStore`] implements it in
//! memory for tests and scratch drives.

pub mod config;
pub mod content;
pub mod crud;
pub mod drive;
pub mod error;
pub mod memory;
pub mod nav;
pub mod path;
pub mod profile;
pub mod traits;
pub mod transfer;

pub use config::{Config, ConfigManager};
pub use content::{ContentReader, ContentWriter, open_reader, open_writer};
pub use crud::{Action, ItemType, Plan};
pub use drive::{DriveConnection, MountOptions, UnmountError};
pub use error::{Error, Result, StoreError};
pub use memory::MemoryStore;
pub use nav::{EntryKind, EntryStream, ObjectEntry};
pub use path::{ParsedPath, PathResolver};
pub use profile::{DriveProfile, ProfileManager};
pub use traits::{ByteStream, CompletedPart, ContainerInfo, ObjectMeta, ObjectStore, StoreResult};
pub use transfer::TransferConfig;
