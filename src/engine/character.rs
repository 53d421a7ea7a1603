//! The character record and its invariant-preserving mutators.
//!
//! Every method here keeps `0 <= hp <= max_hp`, `0 <= mp <= max_mp`,
//! `experience < experience_to_next`, positive inventory counts and
//! non-negative currency. Callers never poke the fields directly to change
//! resources.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::engine::content::ContentTables;
use crate::engine::types::{Alignment, EquipSlot, StatBonus};

pub const STARTING_MAX_HP: u32 = 100;
pub const STARTING_MAX_MP: u32 = 50;
pub const STARTING_ATTACK: i32 = 10;
pub const STARTING_DEFENSE: i32 = 5;
pub const STARTING_AGILITY: i32 = 5;
pub const STARTING_GOLD: i64 = 100;
pub const STARTING_ATTRIBUTE: i32 = 5;
pub const STARTING_EXPERIENCE_TO_NEXT: u64 = 100;

/// Cultivation label for a level. Content gates on substrings of this label.
pub fn cultivation_label(level: u32) -> String {
    let level = level.max(1);
    let (tier, base) = match level {
        1..=9 => ("Body Tempering", 1),
        10..=19 => ("Foundation Establishment", 10),
        20..=29 => ("Core Formation", 20),
        _ => ("Nascent Soul", 30),
    };
    format!("{} {}", tier, level - base + 1)
}

fn next_requirement(current: u64) -> u64 {
    // floor(current * 1.5)
    (current.saturating_mul(3) / 2).max(1)
}

/// Which blocking activity currently holds the busy token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Combat,
    Crafting,
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activity::Combat => write!(f, "in combat"),
            Activity::Crafting => write!(f, "crafting"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillProgress {
    pub level: u32,
    pub experience: u64,
}

impl Default for SkillProgress {
    fn default() -> Self {
        Self {
            level: 1,
            experience: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CraftStats {
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    /// Successes with quality 5 or higher.
    pub perfect: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CraftingProfile {
    pub level: u32,
    pub experience: u64,
    pub experience_to_next: u64,
    #[serde(default)]
    pub known_recipes: BTreeSet<String>,
    #[serde(default)]
    pub stats: CraftStats,
    #[serde(default)]
    pub quality_bonus: i32,
    #[serde(default)]
    pub success_bonus: f64,
}

impl Default for CraftingProfile {
    fn default() -> Self {
        Self {
            level: 1,
            experience: 0,
            experience_to_next: STARTING_EXPERIENCE_TO_NEXT,
            known_recipes: BTreeSet::new(),
            stats: CraftStats::default(),
            quality_bonus: 0,
            success_bonus: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Equipment {
    #[serde(default)]
    pub weapon: Option<String>,
    #[serde(default)]
    pub armor: Option<String>,
    #[serde(default)]
    pub accessory: Option<String>,
}

impl Equipment {
    pub fn get(&self, slot: EquipSlot) -> Option<&str> {
        match slot {
            EquipSlot::Weapon => self.weapon.as_deref(),
            EquipSlot::Armor => self.armor.as_deref(),
            EquipSlot::Accessory => self.accessory.as_deref(),
        }
    }

    fn slot_mut(&mut self, slot: EquipSlot) -> &mut Option<String> {
        match slot {
            EquipSlot::Weapon => &mut self.weapon,
            EquipSlot::Armor => &mut self.armor,
            EquipSlot::Accessory => &mut self.accessory,
        }
    }

    pub fn equipped(&self) -> impl Iterator<Item = &str> {
        EquipSlot::ALL.into_iter().filter_map(move |slot| self.get(slot))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterState {
    pub name: String,
    pub title: String,
    pub level: u32,
    pub experience: u64,
    pub experience_to_next: u64,
    pub cultivation: String,
    pub base_max_hp: u32,
    pub base_max_mp: u32,
    pub base_attack: i32,
    pub base_defense: i32,
    pub base_agility: i32,
    pub hp: u32,
    pub mp: u32,
    pub gold: i64,
    pub fortune: i32,
    pub intelligence: i32,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
    #[serde(default)]
    pub equipment: Equipment,
    /// Cached sum of equipped item bonuses; rebuilt by `refresh_equipment`.
    #[serde(default)]
    pub equipment_bonus: StatBonus,
    #[serde(default)]
    pub skills: BTreeMap<String, SkillProgress>,
    #[serde(default)]
    pub crafting: CraftingProfile,
    #[serde(default)]
    pub faction: Option<String>,
    #[serde(default)]
    pub standing: BTreeMap<String, i64>,
    pub location: String,
    #[serde(default)]
    pub busy: Option<Activity>,
}

impl CharacterState {
    pub fn new(name: &str, location: &str) -> Self {
        Self {
            name: name.to_string(),
            title: "Newcomer".to_string(),
            level: 1,
            experience: 0,
            experience_to_next: STARTING_EXPERIENCE_TO_NEXT,
            cultivation: cultivation_label(1),
            base_max_hp: STARTING_MAX_HP,
            base_max_mp: STARTING_MAX_MP,
            base_attack: STARTING_ATTACK,
            base_defense: STARTING_DEFENSE,
            base_agility: STARTING_AGILITY,
            hp: STARTING_MAX_HP,
            mp: STARTING_MAX_MP,
            gold: STARTING_GOLD,
            fortune: STARTING_ATTRIBUTE,
            intelligence: STARTING_ATTRIBUTE,
            alignment: Alignment::Neutral,
            inventory: BTreeMap::new(),
            equipment: Equipment::default(),
            equipment_bonus: StatBonus::default(),
            skills: BTreeMap::new(),
            crafting: CraftingProfile::default(),
            faction: None,
            standing: BTreeMap::new(),
            location: location.to_string(),
            busy: None,
        }
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_item(mut self, item_id: &str, count: u32) -> Self {
        self.add_item(item_id, count);
        self
    }

    pub fn with_gold(mut self, gold: i64) -> Self {
        self.gold = gold.max(0);
        self
    }

    // ------------------------------------------------------------------
    // Effective stats
    // ------------------------------------------------------------------

    pub fn max_hp(&self) -> u32 {
        (self.base_max_hp as i64 + self.equipment_bonus.max_hp as i64).max(1) as u32
    }

    pub fn max_mp(&self) -> u32 {
        (self.base_max_mp as i64 + self.equipment_bonus.max_mp as i64).max(0) as u32
    }

    pub fn attack(&self) -> i32 {
        self.base_attack + self.equipment_bonus.attack
    }

    pub fn defense(&self) -> i32 {
        self.base_defense + self.equipment_bonus.defense
    }

    pub fn agility(&self) -> i32 {
        self.base_agility + self.equipment_bonus.agility
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Apply a signed hp delta clamped to `[0, max_hp]`. Returns the delta actually applied.
    pub fn adjust_hp(&mut self, delta: i64) -> i64 {
        let before = self.hp as i64;
        let after = (before + delta).clamp(0, self.max_hp() as i64);
        self.hp = after as u32;
        after - before
    }

    pub fn adjust_mp(&mut self, delta: i64) -> i64 {
        let before = self.mp as i64;
        let after = (before + delta).clamp(0, self.max_mp() as i64);
        self.mp = after as u32;
        after - before
    }

    pub fn adjust_gold(&mut self, delta: i64) -> i64 {
        let before = self.gold;
        self.gold = before.saturating_add(delta).max(0);
        self.gold - before
    }

    pub fn restore_full(&mut self) {
        self.hp = self.max_hp();
        self.mp = self.max_mp();
    }

    pub fn is_incapacitated(&self) -> bool {
        self.hp == 0
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    pub fn item_count(&self, item_id: &str) -> u32 {
        self.inventory.get(item_id).copied().unwrap_or(0)
    }

    pub fn add_item(&mut self, item_id: &str, count: u32) {
        if count == 0 {
            return;
        }
        let entry = self.inventory.entry(item_id.to_string()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Remove `count` of an item. Returns false and changes nothing if not enough are held.
    pub fn remove_item(&mut self, item_id: &str, count: u32) -> bool {
        let held = self.item_count(item_id);
        if held < count {
            return false;
        }
        if held == count {
            self.inventory.remove(item_id);
        } else {
            self.inventory.insert(item_id.to_string(), held - count);
        }
        true
    }

    // ------------------------------------------------------------------
    // Equipment
    // ------------------------------------------------------------------

    /// Put `item_id` into `slot`, returning whatever was there before.
    /// Call `refresh_equipment` afterwards to rebuild bonuses.
    pub fn set_equipment(&mut self, slot: EquipSlot, item_id: Option<String>) -> Option<String> {
        std::mem::replace(self.equipment.slot_mut(slot), item_id)
    }

    /// Recompute equipment bonuses from content and re-clamp hp/mp to the new maxima.
    pub fn refresh_equipment(&mut self, content: &ContentTables) {
        self.rebuild_equipment_bonus(content);
        self.hp = self.hp.min(self.max_hp());
        self.mp = self.mp.min(self.max_mp());
    }

    /// Recompute the bonus cache without touching hp or mp.
    pub fn rebuild_equipment_bonus(&mut self, content: &ContentTables) {
        let mut bonus = StatBonus::default();
        for item in self.equipment.equipped().filter_map(|id| content.item(id)) {
            bonus.attack += item.stats.attack;
            bonus.defense += item.stats.defense;
            bonus.max_hp += item.stats.max_hp;
            bonus.max_mp += item.stats.max_mp;
            bonus.agility += item.stats.agility;
            bonus.craft_success += item.stats.craft_success;
        }
        self.equipment_bonus = bonus;
    }

    // ------------------------------------------------------------------
    // Experience
    // ------------------------------------------------------------------

    /// Add experience and run level-ups while the threshold is met.
    /// Returns every level reached, in order.
    pub fn add_experience(&mut self, amount: u64) -> Vec<u32> {
        self.experience = self.experience.saturating_add(amount);
        let mut reached = Vec::new();
        while self.experience >= self.experience_to_next {
            self.experience -= self.experience_to_next;
            self.experience_to_next = next_requirement(self.experience_to_next);
            self.level += 1;
            self.base_max_hp += 10;
            self.base_max_mp += 5;
            self.base_attack += 2;
            self.base_defense += 1;
            self.cultivation = cultivation_label(self.level);
            self.restore_full();
            reached.push(self.level);
        }
        reached
    }

    /// Crafting experience uses the same threshold-subtract loop as character levels.
    pub fn add_craft_experience(&mut self, amount: u64) -> Vec<u32> {
        let profile = &mut self.crafting;
        profile.experience = profile.experience.saturating_add(amount);
        let mut reached = Vec::new();
        while profile.experience >= profile.experience_to_next {
            profile.experience -= profile.experience_to_next;
            profile.experience_to_next = next_requirement(profile.experience_to_next);
            profile.level += 1;
            reached.push(profile.level);
        }
        reached
    }

    // ------------------------------------------------------------------
    // Skills, factions, busy token
    // ------------------------------------------------------------------

    pub fn knows_skill(&self, skill_id: &str) -> bool {
        self.skills.contains_key(skill_id)
    }

    /// Returns false if the skill was already known.
    pub fn learn_skill(&mut self, skill_id: &str) -> bool {
        if self.knows_skill(skill_id) {
            return false;
        }
        self.skills.insert(skill_id.to_string(), SkillProgress::default());
        true
    }

    pub fn standing_at(&self, faction_id: &str) -> i64 {
        self.standing.get(faction_id).copied().unwrap_or(0)
    }

    pub fn is_member_of(&self, faction_id: &str) -> bool {
        self.faction.as_deref() == Some(faction_id)
    }

    /// Take the busy token. Fails with the current holder if already taken.
    pub fn claim(&mut self, activity: Activity) -> Result<(), Activity> {
        match self.busy {
            Some(current) => Err(current),
            None => {
                self.busy = Some(activity);
                Ok(())
            }
        }
    }

    /// Release the token if `activity` holds it.
    pub fn release(&mut self, activity: Activity) {
        if self.busy == Some(activity) {
            self.busy = None;
        }
    }

    /// Re-establish every invariant after an external load. Returns a description
    /// of each correction made.
    pub fn enforce_invariants(&mut self) -> Vec<String> {
        let mut corrections = Vec::new();
        if self.level == 0 {
            self.level = 1;
            corrections.push("level was 0, set to 1".to_string());
        }
        if self.experience_to_next == 0 {
            self.experience_to_next = STARTING_EXPERIENCE_TO_NEXT;
            corrections.push("experience requirement was 0, reset".to_string());
        }
        if self.hp > self.max_hp() {
            corrections.push(format!("hp {} exceeded max {}, clamped", self.hp, self.max_hp()));
            self.hp = self.max_hp();
        }
        if self.mp > self.max_mp() {
            corrections.push(format!("mp {} exceeded max {}, clamped", self.mp, self.max_mp()));
            self.mp = self.max_mp();
        }
        if self.experience >= self.experience_to_next {
            corrections.push(format!(
                "experience {} reached requirement {}, clamped",
                self.experience, self.experience_to_next
            ));
            self.experience = self.experience_to_next - 1;
        }
        if self.gold < 0 {
            corrections.push(format!("gold {} was negative, set to 0", self.gold));
            self.gold = 0;
        }
        let empty: Vec<String> = self
            .inventory
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id.clone())
            .collect();
        for id in empty {
            self.inventory.remove(&id);
            corrections.push(format!("removed empty inventory entry {}", id));
        }
        let profile = &mut self.crafting;
        if profile.experience_to_next == 0 {
            profile.experience_to_next = STARTING_EXPERIENCE_TO_NEXT;
            corrections.push("craft experience requirement was 0, reset".to_string());
        }
        if profile.experience >= profile.experience_to_next {
            corrections.push("craft experience reached requirement, clamped".to_string());
            profile.experience = profile.experience_to_next - 1;
        }
        corrections
    }
}
