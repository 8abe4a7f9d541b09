//! # Identity Mapping
//!
//! External linking and decharging tools address feature maps by their
//! position in a map list. The original file identity only survives as a
//! `[FileID_<n>]` token embedded in each map's display name. This module
//! turns those positions into [`FileId`]s once, validates the mapping
//! eagerly, and hands out [`FeatureRef`]s for every downstream lookup.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use uuid::Uuid;

use crate::model::{FeatureRef, FileId, GroupMember, MapDescriptor, MapIndex, SampleFile};
use crate::table::{TableError, WriteOnceMap};

const TOKEN_OPEN: &str = "[FileID_";
const TOKEN_CLOSE: char = ']';

/// Errors raised while building or querying the identity table
#[derive(Debug, thiserror::Error)]
pub enum IdentityMappingError {
    /// The map name carries no `[FileID_<n>]` token
    #[error("Map {index} ('{name}') carries no [FileID_<n>] token")]
    MissingToken {
        /// Map position
        index: MapIndex,
        /// Map display name
        name: String,
    },

    /// The token is present but does not hold an integer
    #[error("Map {index} ('{name}') has a malformed file token")]
    MalformedToken {
        /// Map position
        index: MapIndex,
        /// Map display name
        name: String,
    },

    /// Two maps carry the same file token
    #[error("File id {0} is referenced by more than one map")]
    DuplicateToken(FileId),

    /// The map list repeats a position
    #[error("Map position {0} appears more than once")]
    DuplicateIndex(MapIndex),

    /// The token names a file that is not part of the run
    #[error("Map {index} refers to unknown file id {file}")]
    UnknownFile {
        /// Map position
        index: MapIndex,
        /// Embedded file id
        file: FileId,
    },

    /// Two input samples share an id
    #[error("Sample file id {0} is used twice")]
    DuplicateSample(FileId),

    /// Number of maps and exported inputs disagree
    #[error("Linker reported {maps} maps for {samples} exported files")]
    MapCountMismatch {
        /// Maps in the linker output
        maps: usize,
        /// Exported sample files
        samples: usize,
    },

    /// A group member refers to a map position outside the table
    #[error("Map position {0} is not part of the identity table")]
    UnmappedIndex(MapIndex),

    /// A file has no position in the map list
    #[error("File {0} has no map position")]
    UnmappedFile(FileId),

    /// Internal table write conflict
    #[error("Identity table error: {0}")]
    Table(#[from] TableError),
}

/// Name under which a sample is exported for the external tools.
///
/// The name embeds the file token parsed back by [`parse_file_token`].
pub fn exported_map_name(sample: &SampleFile) -> String {
    format!("{}{TOKEN_OPEN}{}{TOKEN_CLOSE}.mzML", Uuid::new_v4(), sample.id)
}

/// Extract the file id embedded in a map display name.
///
/// Returns `Ok(None)` when no token is present.
pub fn parse_file_token(name: &str) -> Result<Option<FileId>, std::num::ParseIntError> {
    let Some(start) = name.find(TOKEN_OPEN) else {
        return Ok(None);
    };
    let rest = &name[start + TOKEN_OPEN.len()..];
    let end = rest.find(TOKEN_CLOSE).unwrap_or(rest.len());
    rest[..end].trim().parse::<i32>().map(|id| Some(FileId(id)))
}

/// Validated bijection between map positions and sample files
#[derive(Debug, Clone)]
pub struct IdentityTable {
    by_index: WriteOnceMap<MapIndex, FileId>,
    by_file: BTreeMap<FileId, MapIndex>,
    samples: HashMap<FileId, SampleFile>,
}

impl IdentityTable {
    /// File bound to a map position
    pub fn file_for(&self, index: MapIndex) -> Option<FileId> {
        self.by_index.get(&index).copied()
    }

    /// Map position bound to a file
    pub fn index_for(&self, file: FileId) -> Option<MapIndex> {
        self.by_file.get(&file).copied()
    }

    /// Translate a consensus group member into a stable feature reference
    pub fn resolve(&self, member: &GroupMember) -> Result<FeatureRef, IdentityMappingError> {
        self.file_for(member.map)
            .map(|file| FeatureRef::new(file, member.feature_id))
            .ok_or(IdentityMappingError::UnmappedIndex(member.map))
    }

    /// Sample registered under `file`
    pub fn sample(&self, file: FileId) -> Option<&SampleFile> {
        self.samples.get(&file)
    }

    /// Mapped files in ascending id order
    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.by_file.keys().copied()
    }

    /// Number of mapped files
    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    /// Whether no file is mapped
    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}

/// Builds the [`IdentityTable`] for a run
#[derive(Debug, Default)]
pub struct IdentityMapper;

impl IdentityMapper {
    /// Create a mapper
    pub fn new() -> Self {
        Self
    }

    /// Bind every map of the linker's map list to one input sample.
    ///
    /// With a single sample the sole map is bound directly; otherwise each map
    /// name must carry a unique `[FileID_<n>]` token naming an input sample.
    pub fn build(
        &self,
        maps: &[MapDescriptor],
        samples: &[SampleFile],
    ) -> Result<IdentityTable, IdentityMappingError> {
        let mut registered = HashMap::with_capacity(samples.len());
        for sample in samples {
            if registered.insert(sample.id, sample.clone()).is_some() {
                return Err(IdentityMappingError::DuplicateSample(sample.id));
            }
        }

        if maps.len() != samples.len() {
            return Err(IdentityMappingError::MapCountMismatch {
                maps: maps.len(),
                samples: samples.len(),
            });
        }

        let mut by_index = WriteOnceMap::new("identity");
        let mut by_file = BTreeMap::new();

        if let ([map], [sample]) = (maps, samples) {
            by_index.insert(map.index, sample.id)?;
            by_file.insert(sample.id, map.index);
            debug!("Single file run: map {} -> file {}", map.index, sample.id);
        } else {
            for map in maps {
                let file = match parse_file_token(&map.name) {
                    Ok(Some(file)) => file,
                    Ok(None) => {
                        return Err(IdentityMappingError::MissingToken {
                            index: map.index,
                            name: map.name.clone(),
                        })
                    }
                    Err(_) => {
                        return Err(IdentityMappingError::MalformedToken {
                            index: map.index,
                            name: map.name.clone(),
                        })
                    }
                };

                if !registered.contains_key(&file) {
                    return Err(IdentityMappingError::UnknownFile {
                        index: map.index,
                        file,
                    });
                }
                if by_index.contains_key(&map.index) {
                    return Err(IdentityMappingError::DuplicateIndex(map.index));
                }
                if by_file.insert(file, map.index).is_some() {
                    return Err(IdentityMappingError::DuplicateToken(file));
                }
                by_index.insert(map.index, file)?;
                debug!("Map {} -> file {}", map.index, file);
            }
        }

        Ok(IdentityTable {
            by_index,
            by_file,
            samples: registered,
        })
    }
}
