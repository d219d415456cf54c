//! Virtual file system abstraction for the Kiln asset pipeline.
//!
//! Provides a unified API for reading, writing and scanning the project's
//! data, cache and temporary trees through the [`VfsProvider`] trait and the
//! [`Vfs`] router.
//!
//! # Architecture
//!
//! The VFS returns boxed futures (`Pin<Box<dyn Future + Send>>`) from all
//! operations. The asset manager runs on a single cooperative tick, so it
//! drives them with [`poll_now`]; the built-in providers complete on the
//! first poll.
//!
//! ```ignore
//! let mut vfs = Vfs::new();
//! vfs.mount("data", FileSystemProvider::new("./Data"));
//! vfs.mount("cache", FileSystemProvider::new("./Cache"));
//!
//! let files = poll_now(vfs.scan("data/Models", ScanKind::Files))?;
//! let stat = poll_now(vfs.stat("data/Models/Hero.gltf"))?;
//! ```
//!
//! # Providers
//!
//! - [`MemoryProvider`] — In-memory storage with a deterministic modification
//!   clock, used by tests and tools (read-write)
//! - [`FileSystemProvider`] — Native filesystem access (read-write, native only)
//!
//! Custom providers implement the [`VfsProvider`] trait.
//!
//! # Read-Only vs Read-Write
//!
//! All providers must implement read operations. Write operations are optional
//! and default to returning [`VfsError::ReadOnly`]. Use
//! [`VfsProvider::is_read_only()`] to check capability.

mod error;
#[cfg(all(feature = "filesystem", not(target_arch = "wasm32")))]
mod filesystem;
mod memory;
pub mod path;
mod poll;
mod provider;
mod time;
mod vfs;

pub use error::VfsError;
#[cfg(all(feature = "filesystem", not(target_arch = "wasm32")))]
pub use filesystem::FileSystemProvider;
pub use memory::MemoryProvider;
pub use poll::poll_now;
pub use provider::{FileStat, ScanKind, VfsFuture, VfsProvider};
pub use time::FileTime;
pub use vfs::Vfs;
