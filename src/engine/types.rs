use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
pub const SAVE_RECORD_SCHEMA_VERSION: u32 = 1;

/// Weight used by every weighted table when an entry does not specify one.
pub const DEFAULT_WEIGHT: f64 = 0.1;

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Armor,
    Accessory,
    Material,
    Consumable,
    Book,
    Misc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Weapon,
    Armor,
    Accessory,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 3] = [EquipSlot::Weapon, EquipSlot::Armor, EquipSlot::Accessory];
}

/// Flat bonuses granted while an item is equipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StatBonus {
    #[serde(default)]
    pub attack: i32,
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub max_hp: i32,
    #[serde(default)]
    pub max_mp: i32,
    #[serde(default)]
    pub agility: i32,
    /// Additive crafting success-rate bonus (e.g. 0.05 for a furnace).
    #[serde(default)]
    pub craft_success: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Fortune,
    Intelligence,
}

/// What happens when an item is used from the inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEffect {
    LearnSkill { skill_id: String },
    RestoreHp { amount: u32 },
    RestoreMp { amount: u32 },
    PermanentStat { attribute: Attribute, amount: i32 },
    BreakthroughAid { target: String },
    Breakthrough { cultivation: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub stats: StatBonus,
    #[serde(default)]
    pub effect: Option<ItemEffect>,
}

impl ItemDef {
    pub fn new(id: &str, name: &str, kind: ItemKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            description: String::new(),
            rarity: Rarity::Common,
            stats: StatBonus::default(),
            effect: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn with_stats(mut self, stats: StatBonus) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_effect(mut self, effect: ItemEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn equip_slot(&self) -> Option<EquipSlot> {
        match self.kind {
            ItemKind::Weapon => Some(EquipSlot::Weapon),
            ItemKind::Armor => Some(EquipSlot::Armor),
            ItemKind::Accessory => Some(EquipSlot::Accessory),
            _ => None,
        }
    }
}

// ============================================================================
// Enemies and skills
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootDrop {
    pub item_id: String,
    pub chance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnemyTemplate {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub max_hp: i64,
    pub attack: i32,
    pub defense: i32,
    pub experience: u64,
    #[serde(default)]
    pub drops: Vec<LootDrop>,
    #[serde(default)]
    pub description: String,
}

impl EnemyTemplate {
    pub fn new(id: &str, name: &str, level: u32, max_hp: i64, attack: i32, defense: i32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            level,
            max_hp,
            attack,
            defense,
            experience: 0,
            drops: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_experience(mut self, experience: u64) -> Self {
        self.experience = experience;
        self
    }

    pub fn with_drop(mut self, item_id: &str, chance: f64) -> Self {
        self.drops.push(LootDrop {
            item_id: item_id.to_string(),
            chance,
        });
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Internal,
    External,
    Light,
    Support,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillDef {
    pub id: String,
    pub name: String,
    pub kind: SkillKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    /// Multiplier applied to the base damage; skills without one cannot be used to attack.
    #[serde(default)]
    pub damage_scale: Option<f64>,
    #[serde(default)]
    pub mp_cost: u32,
    #[serde(default)]
    pub craft_success_bonus: f64,
    /// Grants the 10% extra-quality roll when crafting.
    #[serde(default)]
    pub craft_mastery: bool,
    /// Standing required at the owning faction to learn it (faction skills only).
    #[serde(default)]
    pub required_standing: i64,
}

fn default_max_level() -> u32 {
    10
}

impl SkillDef {
    pub fn new(id: &str, name: &str, kind: SkillKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            description: String::new(),
            max_level: default_max_level(),
            damage_scale: None,
            mp_cost: 0,
            craft_success_bonus: 0.0,
            craft_mastery: false,
            required_standing: 0,
        }
    }

    pub fn with_damage(mut self, scale: f64, mp_cost: u32) -> Self {
        self.damage_scale = Some(scale);
        self.mp_cost = mp_cost;
        self
    }

    pub fn with_craft_bonus(mut self, bonus: f64, mastery: bool) -> Self {
        self.craft_success_bonus = bonus;
        self.craft_mastery = mastery;
        self
    }

    pub fn with_required_standing(mut self, standing: i64) -> Self {
        self.required_standing = standing;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

// ============================================================================
// Rewards
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemGrant {
    pub id: String,
    pub count: u32,
}

impl ItemGrant {
    pub fn new(id: &str, count: u32) -> Self {
        Self {
            id: id.to_string(),
            count,
        }
    }
}

/// Sparse reward bundle. Absent fields are no-ops when applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RewardBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub standing: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crafting_experience: Option<u64>,
}

impl RewardBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_experience(mut self, experience: u64) -> Self {
        self.experience = Some(experience);
        self
    }

    pub fn with_currency(mut self, currency: i64) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_hit_points(mut self, delta: i64) -> Self {
        self.hit_points = Some(delta);
        self
    }

    pub fn with_mana(mut self, delta: i64) -> Self {
        self.mana = Some(delta);
        self
    }

    pub fn with_item(mut self, id: &str, count: u32) -> Self {
        self.items.push(ItemGrant::new(id, count));
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_standing(mut self, faction_id: &str, amount: i64) -> Self {
        self.standing.insert(faction_id.to_string(), amount);
        self
    }

    pub fn with_crafting_experience(mut self, amount: u64) -> Self {
        self.crafting_experience = Some(amount);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &RewardBundle::default()
    }
}

// ============================================================================
// Recipes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeMaterial {
    pub item_id: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeOutput {
    pub item_id: String,
    pub count: u32,
    pub min_quality: u8,
    pub max_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecipeRequirements {
    #[serde(default)]
    pub craft_level: Option<u32>,
    #[serde(default)]
    pub cultivation: Option<String>,
    #[serde(default)]
    pub faction: Option<String>,
    #[serde(default)]
    pub standing: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub grade: u32,
    pub materials: Vec<RecipeMaterial>,
    pub base_success_rate: f64,
    pub duration_secs: u64,
    pub output: RecipeOutput,
    #[serde(default)]
    pub requirements: RecipeRequirements,
}

impl RecipeDef {
    pub fn new(id: &str, name: &str, grade: u32, base_success_rate: f64, duration_secs: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            grade,
            materials: Vec::new(),
            base_success_rate,
            duration_secs,
            output: RecipeOutput {
                item_id: id.to_string(),
                count: 1,
                min_quality: 1,
                max_quality: 1,
            },
            requirements: RecipeRequirements::default(),
        }
    }

    pub fn with_material(mut self, item_id: &str, count: u32) -> Self {
        self.materials.push(RecipeMaterial {
            item_id: item_id.to_string(),
            count,
        });
        self
    }

    pub fn with_output(mut self, item_id: &str, count: u32, min_quality: u8, max_quality: u8) -> Self {
        self.output = RecipeOutput {
            item_id: item_id.to_string(),
            count,
            min_quality,
            max_quality: max_quality.max(min_quality),
        };
        self
    }

    pub fn with_requirements(mut self, requirements: RecipeRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityTier {
    pub name: String,
    pub multiplier: f64,
}

/// Sparse step tables feeding the crafting success rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CraftingFactors {
    pub level_bonus: BTreeMap<u32, f64>,
    pub intelligence_bonus: BTreeMap<u32, f64>,
}

impl Default for CraftingFactors {
    fn default() -> Self {
        Self {
            level_bonus: BTreeMap::from([(1, 0.0), (5, 0.1), (10, 0.2), (15, 0.3), (20, 0.4)]),
            intelligence_bonus: BTreeMap::from([
                (5, 0.0),
                (6, 0.05),
                (7, 0.1),
                (8, 0.15),
                (9, 0.2),
                (10, 0.25),
            ]),
        }
    }
}

// ============================================================================
// Factions
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Good,
    #[default]
    Neutral,
    Evil,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankInfo {
    pub rank: String,
    #[serde(default)]
    pub benefits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JoinRequirements {
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub cultivation: Option<String>,
    #[serde(default)]
    pub intelligence: Option<i32>,
    #[serde(default)]
    pub alignment: Option<Alignment>,
    /// Minimum standing at each named faction (0 = "no negative standing").
    #[serde(default)]
    pub standing: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactionTask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub min_standing: i64,
    pub rewards: RewardBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactionDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub join: JoinRequirements,
    /// Ordered standing thresholds → rank.
    pub ranks: BTreeMap<i64, RankInfo>,
    #[serde(default)]
    pub exclusive_skills: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<FactionTask>,
    #[serde(default)]
    pub allies: Vec<String>,
    #[serde(default)]
    pub enemies: Vec<String>,
}

impl FactionDef {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            join: JoinRequirements::default(),
            ranks: BTreeMap::new(),
            exclusive_skills: Vec::new(),
            tasks: Vec::new(),
            allies: Vec::new(),
            enemies: Vec::new(),
        }
    }

    pub fn with_join(mut self, join: JoinRequirements) -> Self {
        self.join = join;
        self
    }

    pub fn with_rank(mut self, threshold: i64, rank: &str, benefits: &[&str]) -> Self {
        self.ranks.insert(
            threshold,
            RankInfo {
                rank: rank.to_string(),
                benefits: benefits.iter().map(|b| b.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_skill(mut self, skill_id: &str) -> Self {
        self.exclusive_skills.push(skill_id.to_string());
        self
    }

    pub fn with_task(mut self, task: FactionTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Highest threshold not exceeding `standing`, with its rank.
    pub fn rank_for(&self, standing: i64) -> Option<(i64, &RankInfo)> {
        self.ranks
            .range(..=standing)
            .next_back()
            .map(|(threshold, info)| (*threshold, info))
    }
}

// ============================================================================
// Map
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnemySpawn {
    pub enemy_id: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl EnemySpawn {
    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_WEIGHT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceNode {
    pub item_id: String,
    pub chance: f64,
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionEffect {
    Meditate { experience: u64, recover: u32 },
    Rest,
    Study { experience: u64 },
    /// One-time find guarded by a world flag.
    Search { item_id: String, flag: String },
    Scavenge { item_id: String, chance: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationAction {
    pub id: String,
    pub label: String,
    pub effect: ActionEffect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub danger_level: u32,
    #[serde(default)]
    pub description: String,
    /// Direction label → destination location id.
    #[serde(default)]
    pub exits: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<ResourceNode>,
    #[serde(default)]
    pub enemies: Vec<EnemySpawn>,
    #[serde(default)]
    pub actions: Vec<LocationAction>,
}

impl LocationDef {
    pub fn new(id: &str, name: &str, region: &str, danger_level: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            region: region.to_string(),
            danger_level,
            description: String::new(),
            exits: BTreeMap::new(),
            resources: Vec::new(),
            enemies: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_exit(mut self, direction: &str, destination: &str) -> Self {
        self.exits.insert(direction.to_string(), destination.to_string());
        self
    }

    pub fn with_resource(mut self, item_id: &str, chance: f64, cooldown_secs: u64) -> Self {
        self.resources.push(ResourceNode {
            item_id: item_id.to_string(),
            chance,
            cooldown_secs,
        });
        self
    }

    pub fn with_enemy(mut self, enemy_id: &str, weight: f64) -> Self {
        self.enemies.push(EnemySpawn {
            enemy_id: enemy_id.to_string(),
            weight: Some(weight),
        });
        self
    }

    pub fn with_action(mut self, id: &str, label: &str, effect: ActionEffect) -> Self {
        self.actions.push(LocationAction {
            id: id.to_string(),
            label: label.to_string(),
            effect,
        });
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn leads_to(&self, destination: &str) -> bool {
        self.exits.values().any(|d| d == destination)
    }
}

// ============================================================================
// Quests
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
    Main,
    Side,
    Daily,
    Achievement,
}

/// Progress signal categories. Kept open through `Custom`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    LearnSkill,
    ReachLevel,
    VisitLocations,
    JoinFaction,
    CraftItem,
    CollectItems,
    DefeatEnemies,
    WinBattles,
    Meditate,
    AchieveQuality,
    ReachCraftLevel,
    ReachStanding,
    ReachCultivation,
    Custom(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveTarget {
    Any,
    Id(String),
    Threshold(i64),
    Set(Vec<String>),
}

impl ObjectiveTarget {
    /// True for `Any`, or an `Id` equal to `value`.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ObjectiveTarget::Any => true,
            ObjectiveTarget::Id(id) => id == value,
            ObjectiveTarget::Set(ids) => ids.iter().any(|id| id == value),
            ObjectiveTarget::Threshold(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveProgress {
    Count(u32),
    Reached(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestObjective {
    pub kind: ProgressKind,
    pub target: ObjectiveTarget,
    pub progress: ObjectiveProgress,
    pub required: u32,
    #[serde(default)]
    pub description: String,
}

impl QuestObjective {
    pub fn new(kind: ProgressKind, target: ObjectiveTarget, required: u32, description: &str) -> Self {
        let progress = match kind {
            ProgressKind::VisitLocations => ObjectiveProgress::Reached(Vec::new()),
            _ => ObjectiveProgress::Count(0),
        };
        Self {
            kind,
            target,
            progress,
            required,
            description: description.to_string(),
        }
    }

    pub fn current(&self) -> u32 {
        match &self.progress {
            ObjectiveProgress::Count(n) => *n,
            ObjectiveProgress::Reached(ids) => ids.len() as u32,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current() >= self.required
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: QuestKind,
    #[serde(default)]
    pub chapter: Option<u32>,
    pub objectives: Vec<QuestObjective>,
    #[serde(default)]
    pub rewards: RewardBundle,
    #[serde(default)]
    pub next_quest: Option<String>,
    #[serde(default)]
    pub prerequisite: Option<String>,
    #[serde(default)]
    pub level_requirement: Option<u32>,
    #[serde(default)]
    pub faction: Option<String>,
    #[serde(default)]
    pub repeatable: bool,
}

impl QuestTemplate {
    pub fn new(id: &str, name: &str, kind: QuestKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            kind,
            chapter: None,
            objectives: Vec::new(),
            rewards: RewardBundle::default(),
            next_quest: None,
            prerequisite: None,
            level_requirement: None,
            faction: None,
            repeatable: false,
        }
    }

    pub fn with_objective(mut self, objective: QuestObjective) -> Self {
        self.objectives.push(objective);
        self
    }

    pub fn with_rewards(mut self, rewards: RewardBundle) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_chapter(mut self, chapter: u32) -> Self {
        self.chapter = Some(chapter);
        self
    }

    pub fn with_next(mut self, quest_id: &str) -> Self {
        self.next_quest = Some(quest_id.to_string());
        self
    }

    pub fn with_prerequisite(mut self, quest_id: &str) -> Self {
        self.prerequisite = Some(quest_id.to_string());
        self
    }

    pub fn with_level_requirement(mut self, level: u32) -> Self {
        self.level_requirement = Some(level);
        self
    }

    pub fn with_faction(mut self, faction_id: &str) -> Self {
        self.faction = Some(faction_id.to_string());
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

// ============================================================================
// Adventures
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TriggerConditions {
    #[serde(default)]
    pub min_level: Option<u32>,
    #[serde(default)]
    pub cultivation: Option<String>,
    #[serde(default)]
    pub min_fortune: Option<i32>,
    #[serde(default)]
    pub faction: Option<String>,
    #[serde(default)]
    pub standing: BTreeMap<String, i64>,
    /// Empty means the event may fire anywhere.
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChoiceRequirements {
    #[serde(default)]
    pub currency: Option<i64>,
    #[serde(default)]
    pub hp: Option<u32>,
    #[serde(default)]
    pub mp: Option<u32>,
    #[serde(default)]
    pub items: Vec<ItemGrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdventureChoice {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub requirements: ChoiceRequirements,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub rewards: RewardBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdventureDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: TriggerConditions,
    pub cooldown_secs: u64,
    pub choices: Vec<AdventureChoice>,
}

impl AdventureDef {
    pub fn new(id: &str, name: &str, cooldown_secs: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            conditions: TriggerConditions::default(),
            cooldown_secs,
            choices: Vec::new(),
        }
    }

    pub fn with_conditions(mut self, conditions: TriggerConditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_choice(
        mut self,
        id: &str,
        text: &str,
        requirements: ChoiceRequirements,
        message: &str,
        rewards: RewardBundle,
    ) -> Self {
        self.choices.push(AdventureChoice {
            id: id.to_string(),
            text: text.to_string(),
            requirements,
            message: message.to_string(),
            rewards,
        });
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_lookup_uses_highest_threshold_not_exceeding() {
        let faction = FactionDef::new("f", "F")
            .with_rank(0, "Outer", &[])
            .with_rank(1000, "Inner", &["library"])
            .with_rank(3000, "Core", &[]);
        assert_eq!(faction.rank_for(-5), None);
        assert_eq!(faction.rank_for(0).map(|(t, _)| t), Some(0));
        assert_eq!(faction.rank_for(999).map(|(_, r)| r.rank.as_str()), Some("Outer"));
        assert_eq!(faction.rank_for(1000).map(|(_, r)| r.rank.as_str()), Some("Inner"));
        assert_eq!(faction.rank_for(10_000).map(|(_, r)| r.rank.as_str()), Some("Core"));
    }

    #[test]
    fn objective_progress_shape_follows_kind() {
        let visit = QuestObjective::new(
            ProgressKind::VisitLocations,
            ObjectiveTarget::Set(vec!["a".into(), "b".into()]),
            2,
            "visit",
        );
        assert_eq!(visit.progress, ObjectiveProgress::Reached(Vec::new()));
        let win = QuestObjective::new(ProgressKind::WinBattles, ObjectiveTarget::Any, 3, "win");
        assert_eq!(win.progress, ObjectiveProgress::Count(0));
        assert!(!win.is_complete());
    }

    #[test]
    fn reward_bundle_json_is_sparse() {
        let bundle = RewardBundle::new().with_hit_points(-150);
        let json = serde_json::to_string(&bundle).unwrap();
        assert_eq!(json, r#"{"hit_points":-150}"#);
        let back: RewardBundle = serde_json::from_str("{}").unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn item_effect_is_tagged() {
        let effect: ItemEffect =
            serde_json::from_str(r#"{"type":"learn_skill","skill_id":"basic_sword"}"#).unwrap();
        assert_eq!(
            effect,
            ItemEffect::LearnSkill {
                skill_id: "basic_sword".into()
            }
        );
    }
}
