//! Save/load of stocks, profiles and whole simulations.
//!
//! Every blob is bitcode-encoded with a versioned header. Each persisted
//! type implements [`Persist`] with its own magic number, so a stock blob
//! can never be loaded as a profile or the other way round.
//!
//! Persistence runs between ticks only; nothing here touches a tick in
//! flight.

use crate::id::{CompoundId, EntityId};
use crate::profile::{ConfigurationError, ProcessorProfile, ProfileLookup};
use crate::registry::Registry;
use crate::sim::SimState;
use crate::simulation::{Entity, Simulation};
use crate::step::StepConfig;
use crate::stock::CompoundStock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a serialized compound stock.
pub const STOCK_MAGIC: u32 = 0xB10C_0001;

/// Magic number identifying a serialized processor profile.
pub const PROFILE_MAGIC: u32 = 0xB10C_0002;

/// Magic number identifying a serialized simulation.
pub const SIMULATION_MAGIC: u32 = 0xB10C_0003;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{expected:08X}, got 0x{found:08X}")]
    InvalidMagic { expected: u32, found: u32 },
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    /// The stored owner-kind label has no live profile.
    #[error("no processor profile registered for owner kind '{0}'")]
    UnresolvedProfile(String),
    #[error("stored profile is invalid: {0}")]
    Configuration(#[from] ConfigurationError),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every serialized snapshot. Enables format detection
/// and version checking before the payload is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
}

impl SnapshotHeader {
    /// Create a header for the current format version.
    pub fn new(magic: u32) -> Self {
        Self {
            magic,
            version: FORMAT_VERSION,
        }
    }

    /// Validate the header against the expected magic number.
    pub fn validate(&self, expected: u32) -> Result<(), DeserializeError> {
        if self.magic != expected {
            return Err(DeserializeError::InvalidMagic {
                expected,
                found: self.magic,
            });
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializeError> {
    bitcode::serialize(value).map_err(|e| SerializeError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, DeserializeError> {
    bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Persist
// ---------------------------------------------------------------------------

/// Save/load for one concrete persisted type.
///
/// `Context` is whatever the type needs to reconnect to live state on load:
/// stocks need a [`ProfileLookup`], profiles need nothing.
pub trait Persist: Sized {
    type Context: ?Sized;

    fn save(&self) -> Result<Vec<u8>, SerializeError>;

    fn load(data: &[u8], context: &Self::Context) -> Result<Self, DeserializeError>;
}

// ---------------------------------------------------------------------------
// Stocks
// ---------------------------------------------------------------------------

/// The stored form of a stock: amounts plus the label of its kind. The
/// profile itself is not stored; it is resolved again on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StockRecord {
    owner_kind: String,
    compounds: Vec<(CompoundId, f64)>,
}

impl StockRecord {
    fn capture(stock: &CompoundStock) -> Self {
        Self {
            owner_kind: stock.owner_kind().to_string(),
            compounds: stock.iter().collect(),
        }
    }

    fn restore(self, lookup: &dyn ProfileLookup) -> Result<CompoundStock, DeserializeError> {
        let profile = lookup
            .resolve(&self.owner_kind)
            .ok_or_else(|| DeserializeError::UnresolvedProfile(self.owner_kind.clone()))?;
        let mut stock = CompoundStock::new(profile, &self.owner_kind);
        for (id, amount) in self.compounds {
            stock.restore_amount(id, amount);
        }
        Ok(stock)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StockSnapshot {
    header: SnapshotHeader,
    record: StockRecord,
}

impl Persist for CompoundStock {
    type Context = dyn ProfileLookup;

    fn save(&self) -> Result<Vec<u8>, SerializeError> {
        encode(&StockSnapshot {
            header: SnapshotHeader::new(STOCK_MAGIC),
            record: StockRecord::capture(self),
        })
    }

    fn load(data: &[u8], lookup: &Self::Context) -> Result<Self, DeserializeError> {
        deserialize(data, lookup)
    }
}

/// Serialize a stock to an opaque blob.
pub fn serialize(stock: &CompoundStock) -> Result<Vec<u8>, SerializeError> {
    stock.save()
}

/// Deserialize a stock, resolving its owner kind through `lookup`.
pub fn deserialize(data: &[u8], lookup: &dyn ProfileLookup) -> Result<CompoundStock, DeserializeError> {
    let snapshot: StockSnapshot = decode(data)?;
    snapshot.header.validate(STOCK_MAGIC)?;
    snapshot.record.restore(lookup)
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct ProfileSnapshot {
    header: SnapshotHeader,
    profile: ProcessorProfile,
}

impl Persist for ProcessorProfile {
    type Context = ();

    fn save(&self) -> Result<Vec<u8>, SerializeError> {
        encode(&ProfileSnapshot {
            header: SnapshotHeader::new(PROFILE_MAGIC),
            profile: self.clone(),
        })
    }

    /// Stored profiles go through the same validation as freshly
    /// configured ones.
    fn load(data: &[u8], _context: &()) -> Result<Self, DeserializeError> {
        let snapshot: ProfileSnapshot = decode(data)?;
        snapshot.header.validate(PROFILE_MAGIC)?;
        let validated = snapshot.profile.to_builder().build()?;
        Ok(Arc::unwrap_or_clone(validated))
    }
}

// ---------------------------------------------------------------------------
// Simulations
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct EntityRecord<L> {
    stock: StockRecord,
    location: L,
}

#[derive(Debug, Serialize, Deserialize)]
struct SimulationSnapshot<L> {
    header: SnapshotHeader,
    sim_state: SimState,
    config: StepConfig,
    entities: Vec<EntityRecord<L>>,
}

/// Result of loading a simulation.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// New ids of restored entities, in saved order.
    pub restored: Vec<EntityId>,
    /// Owner-kind labels of stocks that could not be resolved and were
    /// dropped.
    pub skipped: Vec<String>,
}

impl<L: Serialize + DeserializeOwned + Clone> Simulation<L> {
    /// Serialize every live entity plus the tick counter and step config.
    /// The registry is not stored; it is supplied again on load.
    pub fn save(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = SimulationSnapshot {
            header: SnapshotHeader::new(SIMULATION_MAGIC),
            sim_state: self.sim_state.clone(),
            config: self.config,
            entities: self
                .entities
                .values()
                .map(|e| EntityRecord {
                    stock: StockRecord::capture(&e.stock),
                    location: e.location.clone(),
                })
                .collect(),
        };
        encode(&snapshot)
    }

    /// Restore a simulation.
    ///
    /// Entities whose owner kind `lookup` cannot resolve are skipped and
    /// listed in the report; the rest load normally. Entity ids are
    /// reassigned.
    pub fn load(
        data: &[u8],
        registry: Arc<Registry>,
        lookup: &dyn ProfileLookup,
    ) -> Result<(Self, LoadReport), DeserializeError> {
        let snapshot: SimulationSnapshot<L> = decode(data)?;
        snapshot.header.validate(SIMULATION_MAGIC)?;

        let mut entities = SlotMap::with_key();
        let mut report = LoadReport::default();
        for record in snapshot.entities {
            let label = record.stock.owner_kind.clone();
            match record.stock.restore(lookup) {
                Ok(stock) => {
                    let id = entities.insert(Entity {
                        stock,
                        location: record.location,
                    });
                    report.restored.push(id);
                }
                Err(e) => {
                    log::warn!("skipping saved stock: {e}");
                    report.skipped.push(label);
                }
            }
        }

        let simulation = Simulation {
            registry,
            config: snapshot.config,
            sim_state: snapshot.sim_state,
            entities,
        };
        Ok((simulation, report))
    }
}
