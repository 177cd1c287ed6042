//! Kestrel VM Relocatable Archive
//!
//! This crate builds and reads the relocatable snapshot archive: a
//! contiguous, memory-mappable image of runtime metadata produced once at
//! dump time and mapped back later at a possibly different base address.
//! It provides:
//! - **Arena and regions**: reserve once, lazily commit, bump-allocate,
//!   pack into aligned consecutive regions (`arena`, `region` modules)
//! - **Pointer map**: one bit per pointer-bearing word slot, compacted and
//!   persisted next to the image, applied by the relocator at load time
//!   (`pointer_map`, `relocate` modules)
//! - **Serialization**: a symmetric field-visitor protocol with a writing
//!   and a reading implementation (`visit`, `writer`, `reader` modules)
//!
//! # Example
//!
//! ```rust,ignore
//! use kestrel_archive::{ArenaConfig, DumpSession, FieldVisitor, Region};
//!
//! let mut session = DumpSession::new(ArenaConfig::default());
//! let mut rw = Region::new("rw");
//! rw.init(session.arena());
//!
//! let mut writer = session.writer(&mut rw, &heap);
//! metadata.visit_fields(&mut writer)?;
//!
//! rw.pack(None, session.arena())?;
//! session.compact(0..rw.end())?;
//! let (arena, map) = session.into_parts();
//! // persist arena.bytes() and map.bitmap().as_words()
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod align;
pub mod arena;
pub mod bitmap;
pub mod error;
pub mod heap;
pub mod pointer_map;
pub mod reader;
pub mod region;
pub mod relocate;
pub mod session;
pub mod visit;
pub mod writer;

pub use arena::{Arena, ArenaConfig};
pub use bitmap::Bitmap;
pub use error::{ArchiveError, ArchiveResult, FailureKind};
pub use heap::{HeapRef, ObjectHeap};
pub use pointer_map::PointerMap;
pub use reader::ArchiveReader;
pub use region::{Region, RegionStats};
pub use relocate::Relocator;
pub use session::DumpSession;
pub use visit::FieldVisitor;
pub use writer::ArchiveWriter;

/// Size in bytes of one archive word slot. Words are stored native-endian;
/// the image is mapped, never parsed.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Alignment of every allocation's start offset and size.
pub const OBJECT_ALIGNMENT: usize = 8;

/// Largest arena offset an archived cross-reference can encode. Bounded
/// arenas refuse to grow past it.
pub const MAX_ARCHIVE_DELTA: usize = 0x7fff_ffff;
