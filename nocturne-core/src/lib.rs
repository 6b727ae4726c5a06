//! # nocturne-core
//!
//! The mix engine: a single-writer mix store, backend reconciliation, the
//! sleep timer, lifecycle handling and saved mixes, driven from one engine
//! thread behind `MixHandle`.

pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod randomizer;
pub mod saved_mixes;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod timer;

pub use config::Config;
pub use engine::{Engine, EngineCmd, EngineFeedback, MixHandle, MixReadState};
pub use error::EngineError;
pub use lifecycle::LifecycleCoordinator;
pub use randomizer::{random_catalog_mix, random_mix};
pub use saved_mixes::{
    JsonFileRepository, MemoryRepository, MixRepository, RepositoryError, SavedMix, SavedMixes,
};
pub use snapshot::BackendSnapshot;
pub use store::{MixStore, StoreEvent};
pub use sync::{plan, SyncMixUseCase, SyncPlan, SyncReport};
pub use timer::{TimerEvent, TimerOrchestrator};
