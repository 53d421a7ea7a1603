use chrono::{DateTime, Utc};

use crate::engine::character::CharacterState;
use crate::engine::content::ContentTables;
use crate::engine::log::{GameLog, LogCategory};
use crate::engine::progress::{ProgressBus, ProgressEvent};
use crate::engine::rng::RandomSource;

/// Borrowed view of one session handed to every rule function for the
/// duration of a single action.
pub struct RuleContext<'a> {
    pub content: &'a ContentTables,
    pub character: &'a mut CharacterState,
    pub log: &'a mut GameLog,
    pub bus: &'a mut ProgressBus,
    pub rng: &'a mut dyn RandomSource,
    pub now: DateTime<Utc>,
}

impl<'a> RuleContext<'a> {
    pub fn record(&mut self, category: LogCategory, message: impl Into<String>) {
        self.log.push(category, message, self.now);
    }

    pub fn emit(&mut self, event: ProgressEvent) {
        self.bus.publish(event);
    }

    pub fn roll(&mut self) -> f64 {
        self.rng.next_f64()
    }

    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.rng.uniform(low, high)
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use super::*;
    use crate::engine::rng::ScriptedRandom;
    use chrono::TimeZone;

    /// Owned pieces of a session for resolver unit tests.
    pub struct Fixture {
        pub content: ContentTables,
        pub character: CharacterState,
        pub log: GameLog,
        pub bus: ProgressBus,
        pub rng: ScriptedRandom,
        pub now: DateTime<Utc>,
    }

    impl Fixture {
        pub fn new(content: ContentTables) -> Self {
            let character = CharacterState::new("Lin", &content.starting_location.clone());
            Self {
                content,
                character,
                log: GameLog::default(),
                bus: ProgressBus::new(),
                rng: ScriptedRandom::new(Vec::<f64>::new()),
                now: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            }
        }

        pub fn builtin() -> Self {
            Self::new(ContentTables::builtin())
        }

        pub fn script(&mut self, draws: impl IntoIterator<Item = f64>) {
            for d in draws {
                self.rng.push(d);
            }
        }

        pub fn ctx(&mut self) -> RuleContext<'_> {
            RuleContext {
                content: &self.content,
                character: &mut self.character,
                log: &mut self.log,
                bus: &mut self.bus,
                rng: &mut self.rng,
                now: self.now,
            }
        }

        pub fn drain(&mut self) -> Vec<ProgressEvent> {
            std::iter::from_fn(|| self.bus.pop()).collect()
        }

        pub fn messages(&self) -> Vec<String> {
            self.log.entries().map(|e| e.message.clone()).collect()
        }
    }
}
