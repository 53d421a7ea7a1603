//! Cultivation progression engine.
//!
//! One [`Engine`] per play session owns the character and every subsystem.
//! Rule code receives a [`RuleContext`] for the duration of an action and
//! communicates with other subsystems only by publishing [`ProgressEvent`]s.

pub mod character;
pub mod clock;
pub mod combat;
pub mod content;
pub mod context;
pub mod crafting;
pub mod encounter;
pub mod errors;
pub mod log;
pub mod progress;
pub mod quest;
pub mod reputation;
pub mod reward;
pub mod rng;
pub mod snapshot;
pub mod storage;
pub mod types;
pub mod world;

pub use character::{cultivation_label, Activity, CharacterState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use combat::{CombatAction, CombatRejection, CombatResolver, CombatSession, TurnOutcome, TurnReport};
pub use content::ContentTables;
pub use context::RuleContext;
pub use crafting::{success_rate, CraftRejection, CraftResult, CraftingJob, CraftingScheduler};
pub use encounter::{AdventureRejection, AdventureState, EncounterSelector, EventStats};
pub use errors::{ActionError, EngineError};
pub use log::{GameLog, LogCategory, LogEntry};
pub use progress::{ProgressBus, ProgressEvent, ProgressListener};
pub use quest::{MainProgress, QuestDetail, QuestRejection, QuestStatus, QuestTracker};
pub use reputation::{FactionLedger, FactionRejection};
pub use reward::apply_rewards;
pub use rng::{pick_weighted, RandomSource, ScriptedRandom, SeededRandom};
pub use snapshot::GameSnapshot;
pub use storage::{SaveRecord, SaveStore, SaveStoreBuilder};
pub use world::{Action, ActionOutcome, Engine, EngineSettings, WorldRejection, WorldState};
