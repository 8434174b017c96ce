// chromebreaker-parsers/src/rp6/archive.rs
//! RP6 archive index tables and extracted resources

use bytes::Bytes;
use chromebreaker_core::ResourceType;

use super::entry::{LogicalEntry, MainHeader, PhysicalEntry, SectionHeader};
use crate::binary::cstring_at;

/// Parsed RP6 index: header, the three tables and the name block
#[derive(Debug, Clone, Default)]
pub struct Rp6Archive {
    pub header: MainHeader,
    pub sections: Vec<SectionHeader>,
    pub physical: Vec<PhysicalEntry>,
    pub logical: Vec<LogicalEntry>,
    /// Byte offset of each logical entry's name inside `names`
    pub name_offsets: Vec<u32>,
    pub names: Bytes,
}

impl Rp6Archive {
    /// Number of logical resources
    pub fn resource_count(&self) -> usize {
        self.logical.len()
    }

    /// Name of logical resource `index`, or "" when the offset is missing
    pub fn name_of(&self, index: usize) -> String {
        self.name_offsets
            .get(index)
            .map(|&offset| cstring_at(&self.names, offset as usize))
            .unwrap_or_default()
    }

    /// Sum of declared uncompressed section sizes
    pub fn total_data_size(&self) -> u64 {
        self.sections.iter().map(|s| u64::from(s.data_size)).sum()
    }

    /// Number of sections stored compressed
    pub fn compressed_section_count(&self) -> usize {
        self.sections.iter().filter(|s| s.is_compressed()).count()
    }

    /// Logical indices whose file type matches `kind`
    pub fn find_by_type(&self, kind: ResourceType) -> Vec<usize> {
        self.logical
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.file_type() == kind.code())
            .map(|(index, _)| index)
            .collect()
    }

    /// Logical indices whose name contains `pattern`, ignoring case
    pub fn find(&self, pattern: &str) -> Vec<usize> {
        let pattern = pattern.to_lowercase();
        (0..self.logical.len())
            .filter(|&index| self.name_of(index).to_lowercase().contains(&pattern))
            .collect()
    }
}

/// A logical resource with its resolved byte parts, in part order
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    pub logical_index: usize,
    /// Name as stored in the archive, unsanitized
    pub name: String,
    pub file_type: u32,
    pub parts: Vec<Bytes>,
}

impl ResourceInfo {
    pub fn resource_type(&self) -> ResourceType {
        ResourceType::from_code(self.file_type)
    }

    /// Total size of all resolved parts
    pub fn size(&self) -> usize {
        self.parts.iter().map(Bytes::len).sum()
    }
}
