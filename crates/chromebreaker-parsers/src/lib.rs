//! chromebreaker-parsers
//!
//! Readers and writers for Chrome Engine mesh assets.
//!
//! # Supported Formats
//!
//! | Format       | Extension        | Description |
//! |--------------|------------------|-------------|
//! | MSH          | `.msh`           | Chunk-based mesh container (read and write) |
//! | RP6          | `.rpack`, `.rp6` | Resource pack with compressed type sections (read) |
//! | Compact mesh | (RP6 mesh parts) | Pointer-relocated mesh image (read) |
//!
//! # Example
//!
//! ```rust,ignore
//! use chromebreaker_parsers::{CompactMeshAssembler, MshWriter, ParseOptions, Rp6Parser};
//! use chromebreaker_core::ResourceType;
//!
//! let extraction = Rp6Parser::new().extract_file("level.rpack".as_ref(), &ParseOptions::default())?;
//! for resource in &extraction.resources {
//!     if resource.resource_type() == ResourceType::Mesh {
//!         let mesh = CompactMeshAssembler::new().assemble(&resource.parts)?;
//!         let bytes = MshWriter::new().to_bytes(&mesh)?;
//!     }
//! }
//! ```

pub mod binary;
pub mod chunk;
pub mod compact;
pub mod logging;
pub mod msh;
pub mod rp6;
pub mod source;
pub mod traits;

// Re-export main types
pub use traits::{ErrorKind, Outcome, ParseError, ParseOptions, ParseResult, Parser};

pub use binary::Record;
pub use chunk::{Chunk, ChunkHeader, ChunkReader, ChunkWriter, CHUNK_HEADER_SIZE};
pub use compact::{CompactMeshAssembler, DecodedVertices, MeshFixups, ResolvedImage, SurfaceId, VertexLayout};
pub use msh::{ChunkTag, MeshBlock, MshFile, MshNode, MshParser, MshWriter};
pub use rp6::{Extraction, ResourceInfo, Rp6Archive, Rp6Parser, SectionCodec, SectionDecompressor};
pub use source::FileSource;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
