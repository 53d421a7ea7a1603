//! # Cultivation - a text RPG progression engine
//!
//! A single-player cultivation (xianxia) game engine: a character levels up
//! through cultivation realms by fighting, gathering, crafting pills and
//! artifacts, completing quests and serving a sect. There is no UI here; hosts
//! drive an [`engine::Engine`] with [`engine::Action`]s and render its typed
//! outcomes and game log.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cultivation::engine::{Action, ContentTables, Engine, EngineSettings, SeededRandom, SystemClock};
//!
//! let content = Arc::new(ContentTables::builtin());
//! let mut engine = Engine::new(
//!     content,
//!     "Lin Feng",
//!     Box::new(SeededRandom::from_seed(7)),
//!     Arc::new(SystemClock),
//!     EngineSettings::default(),
//! );
//! let outcome = engine.execute(Action::Perform { action: "meditate".into() });
//! println!("{:?}", outcome);
//! println!("{}", engine.to_json().unwrap());
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - character state, rules subsystems, snapshots and save slots
//! - [`config`] - TOML configuration for the command-line host
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Engine         │ ← validates actions, owns the session
//! └─────────────────┘
//!          │ RuleContext
//! ┌─────────────────┐
//! │  Subsystems     │ ← combat, crafting, quests, factions, encounters
//! └─────────────────┘
//!          │ ProgressEvent
//! ┌─────────────────┐
//! │  Progress bus   │ ← quest objectives and external listeners
//! └─────────────────┘
//! ```

pub mod config;
pub mod engine;
