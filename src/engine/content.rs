//! Read-only content tables: items, enemies, skills, recipes, factions, map,
//! quests and adventures, all keyed by stable string ids.
//!
//! `ContentTables::builtin()` provides the starter world; `load_json` lets a
//! host replace it with its own data without recompiling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::engine::clock::MAX_SPAN_SECS;
use crate::engine::errors::EngineError;
use crate::engine::types::*;

#[derive(Debug, Clone, PartialEq)]
pub struct ContentTables {
    pub items: BTreeMap<String, ItemDef>,
    pub enemies: BTreeMap<String, EnemyTemplate>,
    pub skills: BTreeMap<String, SkillDef>,
    pub recipes: BTreeMap<String, RecipeDef>,
    pub factions: BTreeMap<String, FactionDef>,
    pub locations: BTreeMap<String, LocationDef>,
    pub quests: BTreeMap<String, QuestTemplate>,
    pub adventures: BTreeMap<String, AdventureDef>,
    pub adventure_weights: BTreeMap<String, f64>,
    pub quality_tiers: BTreeMap<u8, QualityTier>,
    pub crafting_factors: CraftingFactors,
    pub starting_location: String,
    pub starting_recipes: Vec<String>,
}

/// On-disk shape: plain lists, converted into id-keyed maps on load.
#[derive(Debug, Serialize, Deserialize)]
struct ContentFile {
    #[serde(default)]
    items: Vec<ItemDef>,
    #[serde(default)]
    enemies: Vec<EnemyTemplate>,
    #[serde(default)]
    skills: Vec<SkillDef>,
    #[serde(default)]
    recipes: Vec<RecipeDef>,
    #[serde(default)]
    factions: Vec<FactionDef>,
    #[serde(default)]
    locations: Vec<LocationDef>,
    #[serde(default)]
    quests: Vec<QuestTemplate>,
    #[serde(default)]
    adventures: Vec<AdventureDef>,
    #[serde(default)]
    adventure_weights: BTreeMap<String, f64>,
    #[serde(default)]
    quality_tiers: BTreeMap<u8, QualityTier>,
    #[serde(default)]
    crafting_factors: CraftingFactors,
    starting_location: String,
    #[serde(default)]
    starting_recipes: Vec<String>,
}

fn keyed<T, F>(entries: Vec<T>, kind: &str, id_of: F) -> Result<BTreeMap<String, T>, EngineError>
where
    F: Fn(&T) -> &str,
{
    let mut map = BTreeMap::new();
    for entry in entries {
        let id = id_of(&entry).to_string();
        if map.insert(id.clone(), entry).is_some() {
            return Err(EngineError::InvalidContent(format!("duplicate {} id '{}'", kind, id)));
        }
    }
    Ok(map)
}

pub fn default_quality_tiers() -> BTreeMap<u8, QualityTier> {
    [
        (1, "Low Grade", 1.0),
        (2, "Mid Grade", 1.2),
        (3, "High Grade", 1.5),
        (4, "Superior", 2.0),
        (5, "Perfect", 3.0),
        (6, "Legendary", 5.0),
    ]
    .into_iter()
    .map(|(q, name, multiplier)| {
        (
            q,
            QualityTier {
                name: name.to_string(),
                multiplier,
            },
        )
    })
    .collect()
}

impl ContentTables {
    /// Empty tables with a single starting location id. Mostly useful for tests.
    pub fn empty(starting_location: &str) -> Self {
        Self {
            items: BTreeMap::new(),
            enemies: BTreeMap::new(),
            skills: BTreeMap::new(),
            recipes: BTreeMap::new(),
            factions: BTreeMap::new(),
            locations: BTreeMap::new(),
            quests: BTreeMap::new(),
            adventures: BTreeMap::new(),
            adventure_weights: BTreeMap::new(),
            quality_tiers: default_quality_tiers(),
            crafting_factors: CraftingFactors::default(),
            starting_location: starting_location.to_string(),
            starting_recipes: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: ItemDef) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    pub fn with_enemy(mut self, enemy: EnemyTemplate) -> Self {
        self.enemies.insert(enemy.id.clone(), enemy);
        self
    }

    pub fn with_skill(mut self, skill: SkillDef) -> Self {
        self.skills.insert(skill.id.clone(), skill);
        self
    }

    pub fn with_recipe(mut self, recipe: RecipeDef) -> Self {
        self.recipes.insert(recipe.id.clone(), recipe);
        self
    }

    pub fn with_faction(mut self, faction: FactionDef) -> Self {
        self.factions.insert(faction.id.clone(), faction);
        self
    }

    pub fn with_location(mut self, location: LocationDef) -> Self {
        self.locations.insert(location.id.clone(), location);
        self
    }

    pub fn with_quest(mut self, quest: QuestTemplate) -> Self {
        self.quests.insert(quest.id.clone(), quest);
        self
    }

    pub fn with_adventure(mut self, adventure: AdventureDef, weight: Option<f64>) -> Self {
        if let Some(weight) = weight {
            self.adventure_weights.insert(adventure.id.clone(), weight);
        }
        self.adventures.insert(adventure.id.clone(), adventure);
        self
    }

    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    /// Display name for an item, falling back to the raw id for unknown items.
    pub fn item_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.items.get(id).map(|i| i.name.as_str()).unwrap_or(id)
    }

    pub fn enemy(&self, id: &str) -> Option<&EnemyTemplate> {
        self.enemies.get(id)
    }

    pub fn skill(&self, id: &str) -> Option<&SkillDef> {
        self.skills.get(id)
    }

    pub fn recipe(&self, id: &str) -> Option<&RecipeDef> {
        self.recipes.get(id)
    }

    pub fn faction(&self, id: &str) -> Option<&FactionDef> {
        self.factions.get(id)
    }

    pub fn faction_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.factions.get(id).map(|f| f.name.as_str()).unwrap_or(id)
    }

    pub fn location(&self, id: &str) -> Option<&LocationDef> {
        self.locations.get(id)
    }

    pub fn quest(&self, id: &str) -> Option<&QuestTemplate> {
        self.quests.get(id)
    }

    pub fn adventure(&self, id: &str) -> Option<&AdventureDef> {
        self.adventures.get(id)
    }

    pub fn adventure_weight(&self, id: &str) -> f64 {
        self.adventure_weights.get(id).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn quality_name(&self, quality: u8) -> &str {
        self.quality_tiers
            .get(&quality)
            .map(|t| t.name.as_str())
            .unwrap_or("Unknown")
    }

    /// Parse content from a JSON document and check cross references.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let file: ContentFile = serde_json::from_str(json)?;
        let quality_tiers = if file.quality_tiers.is_empty() {
            default_quality_tiers()
        } else {
            file.quality_tiers
        };
        let tables = Self {
            items: keyed(file.items, "item", |i| &i.id)?,
            enemies: keyed(file.enemies, "enemy", |e| &e.id)?,
            skills: keyed(file.skills, "skill", |s| &s.id)?,
            recipes: keyed(file.recipes, "recipe", |r| &r.id)?,
            factions: keyed(file.factions, "faction", |f| &f.id)?,
            locations: keyed(file.locations, "location", |l| &l.id)?,
            quests: keyed(file.quests, "quest", |q| &q.id)?,
            adventures: keyed(file.adventures, "adventure", |a| &a.id)?,
            adventure_weights: file.adventure_weights,
            quality_tiers,
            crafting_factors: file.crafting_factors,
            starting_location: file.starting_location,
            starting_recipes: file.starting_recipes,
        };
        tables.validate()?;
        Ok(tables)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let tables = Self::from_json_str(&contents)?;
        log::info!(
            "loaded content from {}: {} items, {} enemies, {} recipes, {} quests",
            path.as_ref().display(),
            tables.items.len(),
            tables.enemies.len(),
            tables.recipes.len(),
            tables.quests.len()
        );
        Ok(tables)
    }

    pub fn to_json_pretty(&self) -> Result<String, EngineError> {
        let file = ContentFile {
            items: self.items.values().cloned().collect(),
            enemies: self.enemies.values().cloned().collect(),
            skills: self.skills.values().cloned().collect(),
            recipes: self.recipes.values().cloned().collect(),
            factions: self.factions.values().cloned().collect(),
            locations: self.locations.values().cloned().collect(),
            quests: self.quests.values().cloned().collect(),
            adventures: self.adventures.values().cloned().collect(),
            adventure_weights: self.adventure_weights.clone(),
            quality_tiers: self.quality_tiers.clone(),
            crafting_factors: self.crafting_factors.clone(),
            starting_location: self.starting_location.clone(),
            starting_recipes: self.starting_recipes.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Check timer lengths and that every id referenced from one table exists
    /// in its target table.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.validate_spans()?;
        let mut problems = Vec::new();
        let mut need = |ok: bool, what: String| {
            if !ok {
                problems.push(what);
            }
        };

        need(
            self.locations.contains_key(&self.starting_location),
            format!("starting location '{}'", self.starting_location),
        );
        for id in &self.starting_recipes {
            need(self.recipes.contains_key(id), format!("starting recipe '{}'", id));
        }
        for enemy in self.enemies.values() {
            for drop in &enemy.drops {
                need(
                    self.items.contains_key(&drop.item_id),
                    format!("enemy {} drop '{}'", enemy.id, drop.item_id),
                );
            }
        }
        for item in self.items.values() {
            if let Some(ItemEffect::LearnSkill { skill_id }) = &item.effect {
                need(
                    self.skills.contains_key(skill_id),
                    format!("item {} skill '{}'", item.id, skill_id),
                );
            }
        }
        for recipe in self.recipes.values() {
            for material in &recipe.materials {
                need(
                    self.items.contains_key(&material.item_id),
                    format!("recipe {} material '{}'", recipe.id, material.item_id),
                );
            }
            need(
                self.items.contains_key(&recipe.output.item_id),
                format!("recipe {} output '{}'", recipe.id, recipe.output.item_id),
            );
        }
        for faction in self.factions.values() {
            for skill in &faction.exclusive_skills {
                need(
                    self.skills.contains_key(skill),
                    format!("faction {} skill '{}'", faction.id, skill),
                );
            }
        }
        for location in self.locations.values() {
            for destination in location.exits.values() {
                need(
                    self.locations.contains_key(destination),
                    format!("location {} exit '{}'", location.id, destination),
                );
            }
            for spawn in &location.enemies {
                need(
                    self.enemies.contains_key(&spawn.enemy_id),
                    format!("location {} enemy '{}'", location.id, spawn.enemy_id),
                );
            }
            for node in &location.resources {
                need(
                    self.items.contains_key(&node.item_id),
                    format!("location {} resource '{}'", location.id, node.item_id),
                );
            }
        }
        for quest in self.quests.values() {
            if let Some(next) = &quest.next_quest {
                need(
                    self.quests.contains_key(next),
                    format!("quest {} next '{}'", quest.id, next),
                );
            }
            if let Some(prereq) = &quest.prerequisite {
                need(
                    self.quests.contains_key(prereq),
                    format!("quest {} prerequisite '{}'", quest.id, prereq),
                );
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvalidContent(format!(
                "unknown references: {}",
                problems.join(", ")
            )))
        }
    }

    fn validate_spans(&self) -> Result<(), EngineError> {
        let mut spans: Vec<(String, u64)> = Vec::new();
        for recipe in self.recipes.values() {
            spans.push((format!("recipe {} duration", recipe.id), recipe.duration_secs));
        }
        for adventure in self.adventures.values() {
            spans.push((format!("adventure {} cooldown", adventure.id), adventure.cooldown_secs));
        }
        for location in self.locations.values() {
            for node in &location.resources {
                spans.push((
                    format!("location {} resource {} cooldown", location.id, node.item_id),
                    node.cooldown_secs,
                ));
            }
        }
        let too_long: Vec<String> = spans
            .into_iter()
            .filter(|(_, secs)| *secs > MAX_SPAN_SECS)
            .map(|(what, secs)| format!("{} {}s", what, secs))
            .collect();
        if too_long.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvalidContent(format!(
                "timers longer than {}s: {}",
                MAX_SPAN_SECS,
                too_long.join(", ")
            )))
        }
    }

    /// The starter world shipped with the engine.
    pub fn builtin() -> Self {
        let mut tables = Self::empty("qingshi_village");
        for item in builtin_items() {
            tables = tables.with_item(item);
        }
        for enemy in builtin_enemies() {
            tables = tables.with_enemy(enemy);
        }
        for skill in builtin_skills() {
            tables = tables.with_skill(skill);
        }
        for recipe in builtin_recipes() {
            tables = tables.with_recipe(recipe);
        }
        for faction in builtin_factions() {
            tables = tables.with_faction(faction);
        }
        for location in builtin_locations() {
            tables = tables.with_location(location);
        }
        for quest in builtin_quests() {
            tables = tables.with_quest(quest);
        }
        for (adventure, weight) in builtin_adventures() {
            tables = tables.with_adventure(adventure, weight);
        }
        tables.starting_recipes = vec!["qi_gathering_pill".into(), "healing_pill".into()];
        tables
    }
}

fn builtin_items() -> Vec<ItemDef> {
    vec![
        ItemDef::new("spirit_herb", "Spirit Herb", ItemKind::Material)
            .with_description("A common herb steeped in faint spiritual energy."),
        ItemDef::new("qi_grass", "Qi Grass", ItemKind::Material),
        ItemDef::new("wolf_pelt", "Wolf Pelt", ItemKind::Material),
        ItemDef::new("beast_core", "Beast Core", ItemKind::Material).with_rarity(Rarity::Rare),
        ItemDef::new("fire_crystal", "Fire Crystal", ItemKind::Material)
            .with_rarity(Rarity::Rare),
        ItemDef::new("qi_gathering_pill", "Qi Gathering Pill", ItemKind::Consumable)
            .with_effect(ItemEffect::RestoreMp { amount: 30 }),
        ItemDef::new("healing_pill", "Healing Pill", ItemKind::Consumable)
            .with_effect(ItemEffect::RestoreHp { amount: 50 }),
        ItemDef::new("foundation_pill", "Foundation Pill", ItemKind::Consumable)
            .with_rarity(Rarity::Rare)
            .with_effect(ItemEffect::BreakthroughAid {
                target: "Foundation".into(),
            }),
        ItemDef::new("clarity_elixir", "Clarity Elixir", ItemKind::Consumable)
            .with_rarity(Rarity::Epic)
            .with_effect(ItemEffect::PermanentStat {
                attribute: Attribute::Intelligence,
                amount: 1,
            }),
        ItemDef::new("lucky_talisman", "Lucky Talisman", ItemKind::Consumable)
            .with_rarity(Rarity::Uncommon)
            .with_effect(ItemEffect::PermanentStat {
                attribute: Attribute::Fortune,
                amount: 1,
            }),
        ItemDef::new("heaven_bolt_token", "Heaven Bolt Token", ItemKind::Consumable)
            .with_rarity(Rarity::Legendary)
            .with_effect(ItemEffect::Breakthrough {
                cultivation: "Foundation Establishment 1".into(),
            }),
        ItemDef::new("iron_sword", "Iron Sword", ItemKind::Weapon).with_stats(StatBonus {
            attack: 5,
            ..StatBonus::default()
        }),
        ItemDef::new("spirit_sword", "Spirit Sword", ItemKind::Weapon)
            .with_rarity(Rarity::Rare)
            .with_stats(StatBonus {
                attack: 15,
                agility: 2,
                ..StatBonus::default()
            }),
        ItemDef::new("cloth_robe", "Cloth Robe", ItemKind::Armor).with_stats(StatBonus {
            defense: 3,
            max_hp: 20,
            ..StatBonus::default()
        }),
        ItemDef::new("jade_pendant", "Jade Pendant", ItemKind::Accessory)
            .with_rarity(Rarity::Uncommon)
            .with_stats(StatBonus {
                max_mp: 20,
                agility: 2,
                ..StatBonus::default()
            }),
        ItemDef::new("bronze_furnace", "Bronze Furnace", ItemKind::Accessory).with_stats(
            StatBonus {
                craft_success: 0.05,
                ..StatBonus::default()
            },
        ),
        ItemDef::new("basic_sword_manual", "Basic Sword Manual", ItemKind::Book).with_effect(
            ItemEffect::LearnSkill {
                skill_id: "basic_sword".into(),
            },
        ),
        ItemDef::new("breathing_manual", "Breathing Manual", ItemKind::Book).with_effect(
            ItemEffect::LearnSkill {
                skill_id: "breathing_technique".into(),
            },
        ),
        ItemDef::new("ancient_scroll", "Ancient Scroll", ItemKind::Book)
            .with_rarity(Rarity::Rare)
            .with_effect(ItemEffect::LearnSkill {
                skill_id: "flowing_cloud_steps".into(),
            }),
    ]
}

fn builtin_enemies() -> Vec<EnemyTemplate> {
    vec![
        EnemyTemplate::new("wild_wolf", "Wild Wolf", 1, 50, 8, 2)
            .with_experience(20)
            .with_drop("wolf_pelt", 0.5),
        EnemyTemplate::new("bandit", "Mountain Bandit", 3, 80, 12, 4)
            .with_experience(35)
            .with_drop("healing_pill", 0.3)
            .with_drop("iron_sword", 0.1),
        EnemyTemplate::new("spirit_beast", "Spirit Beast", 6, 150, 20, 8)
            .with_experience(80)
            .with_drop("beast_core", 0.4)
            .with_drop("spirit_herb", 0.6),
        EnemyTemplate::new("rogue_disciple", "Rogue Disciple", 10, 220, 28, 12)
            .with_experience(150)
            .with_drop("qi_gathering_pill", 0.4)
            .with_drop("breathing_manual", 0.15),
    ]
}

fn builtin_skills() -> Vec<SkillDef> {
    vec![
        SkillDef::new("basic_sword", "Basic Sword Art", SkillKind::External).with_damage(1.5, 10),
        SkillDef::new("breathing_technique", "Breathing Technique", SkillKind::Internal)
            .with_description("Steadies the breath; no use in a fight."),
        SkillDef::new("flowing_cloud_steps", "Flowing Cloud Steps", SkillKind::Light)
            .with_damage(1.3, 8),
        SkillDef::new("azure_sword_art", "Azure Sword Art", SkillKind::External)
            .with_damage(2.0, 20)
            .with_required_standing(1000),
        SkillDef::new("alchemy_mastery", "Alchemy Mastery", SkillKind::Support)
            .with_craft_bonus(0.2, true)
            .with_required_standing(500),
        SkillDef::new("blood_palm", "Blood Palm", SkillKind::External)
            .with_damage(2.2, 25)
            .with_required_standing(500),
    ]
}

fn builtin_recipes() -> Vec<RecipeDef> {
    vec![
        RecipeDef::new("qi_gathering_pill", "Qi Gathering Pill", 1, 0.7, 60)
            .with_material("spirit_herb", 2)
            .with_material("qi_grass", 1)
            .with_output("qi_gathering_pill", 1, 1, 3),
        RecipeDef::new("healing_pill", "Healing Pill", 1, 0.75, 45)
            .with_material("spirit_herb", 1)
            .with_material("qi_grass", 2)
            .with_output("healing_pill", 2, 1, 3),
        RecipeDef::new("foundation_pill", "Foundation Pill", 3, 0.4, 300)
            .with_material("spirit_herb", 5)
            .with_material("beast_core", 1)
            .with_material("fire_crystal", 1)
            .with_output("foundation_pill", 1, 2, 4)
            .with_requirements(RecipeRequirements {
                craft_level: Some(3),
                ..RecipeRequirements::default()
            }),
        RecipeDef::new("clarity_elixir", "Clarity Elixir", 2, 0.55, 120)
            .with_material("beast_core", 1)
            .with_material("spirit_herb", 3)
            .with_output("clarity_elixir", 1, 1, 4)
            .with_requirements(RecipeRequirements {
                faction: Some("hundred_herb_valley".into()),
                standing: BTreeMap::from([("hundred_herb_valley".to_string(), 200)]),
                ..RecipeRequirements::default()
            }),
    ]
}

fn builtin_factions() -> Vec<FactionDef> {
    let mut azure = FactionDef::new("azure_cloud_sect", "Azure Cloud Sect")
        .with_description("A righteous sword sect on the misty peaks.")
        .with_join(JoinRequirements {
            level: Some(5),
            alignment: Some(Alignment::Good),
            standing: BTreeMap::from([("blood_moon_cult".to_string(), 0)]),
            ..JoinRequirements::default()
        })
        .with_rank(0, "Outer Disciple", &["basic sect techniques"])
        .with_rank(1000, "Inner Disciple", &["sect library", "Azure Sword Art"])
        .with_rank(3000, "Core Disciple", &["sect treasury"])
        .with_rank(6000, "Elder", &["command outer disciples"])
        .with_skill("azure_sword_art")
        .with_task(FactionTask {
            id: "patrol_mountain".into(),
            name: "Patrol the Mountain Path".into(),
            description: String::new(),
            min_standing: 0,
            rewards: RewardBundle::new()
                .with_standing("azure_cloud_sect", 50)
                .with_experience(30)
                .with_currency(20),
        })
        .with_task(FactionTask {
            id: "escort_merchants".into(),
            name: "Escort the Merchants".into(),
            description: String::new(),
            min_standing: 1000,
            rewards: RewardBundle::new()
                .with_standing("azure_cloud_sect", 120)
                .with_currency(80),
        });
    azure.allies.push("hundred_herb_valley".into());
    azure.enemies.push("blood_moon_cult".into());

    let mut valley = FactionDef::new("hundred_herb_valley", "Hundred Herb Valley")
        .with_description("Reclusive alchemists who tend the valley gardens.")
        .with_join(JoinRequirements {
            level: Some(3),
            intelligence: Some(6),
            ..JoinRequirements::default()
        })
        .with_rank(0, "Apprentice", &["herb garden access"])
        .with_rank(500, "Herbalist", &["Alchemy Mastery"])
        .with_rank(2000, "Master Alchemist", &["rare recipes"])
        .with_skill("alchemy_mastery")
        .with_task(FactionTask {
            id: "tend_garden".into(),
            name: "Tend the Herb Garden".into(),
            description: String::new(),
            min_standing: 0,
            rewards: RewardBundle::new()
                .with_standing("hundred_herb_valley", 40)
                .with_item("spirit_herb", 2),
        });
    valley.allies.push("azure_cloud_sect".into());

    let mut cult = FactionDef::new("blood_moon_cult", "Blood Moon Cult")
        .with_description("A demonic cult that trades honour for power.")
        .with_join(JoinRequirements {
            level: Some(10),
            cultivation: Some("Foundation".into()),
            alignment: Some(Alignment::Evil),
            ..JoinRequirements::default()
        })
        .with_rank(0, "Acolyte", &[])
        .with_rank(800, "Blood Servant", &["Blood Palm"])
        .with_rank(2500, "Blood Lord", &["cult armoury"])
        .with_skill("blood_palm")
        .with_task(FactionTask {
            id: "raid_caravan".into(),
            name: "Raid a Caravan".into(),
            description: String::new(),
            min_standing: 0,
            rewards: RewardBundle::new()
                .with_standing("blood_moon_cult", 60)
                .with_currency(100)
                .with_hit_points(-20),
        });
    cult.enemies.push("azure_cloud_sect".into());

    vec![azure, valley, cult]
}

fn builtin_locations() -> Vec<LocationDef> {
    vec![
        LocationDef::new("qingshi_village", "Qingshi Village", "Qingshi", 0)
            .with_description("A quiet village at the edge of the bamboo forest.")
            .with_exit("north", "bamboo_forest")
            .with_exit("east", "market_town")
            .with_resource("qi_grass", 0.6, 300)
            .with_action("rest", "Rest at the inn", ActionEffect::Rest),
        LocationDef::new("market_town", "Market Town", "Qingshi", 0)
            .with_exit("west", "qingshi_village")
            .with_exit("east", "herb_valley")
            .with_action("rest", "Rest at the teahouse", ActionEffect::Rest),
        LocationDef::new("herb_valley", "Hundred Herb Valley", "Qingshi", 0)
            .with_exit("west", "market_town")
            .with_resource("spirit_herb", 0.8, 300)
            .with_resource("qi_grass", 0.8, 300),
        LocationDef::new("bamboo_forest", "Bamboo Forest", "Wilds", 1)
            .with_exit("south", "qingshi_village")
            .with_exit("north", "misty_mountain")
            .with_exit("east", "ancient_ruins")
            .with_resource("spirit_herb", 0.5, 300)
            .with_resource("qi_grass", 0.7, 180)
            .with_enemy("wild_wolf", 0.7)
            .with_enemy("bandit", 0.3)
            .with_action(
                "meditate",
                "Meditate beneath the bamboo",
                ActionEffect::Meditate {
                    experience: 15,
                    recover: 10,
                },
            ),
        LocationDef::new("misty_mountain", "Misty Mountain", "Wilds", 3)
            .with_exit("south", "bamboo_forest")
            .with_exit("up", "azure_cloud_gate")
            .with_exit("west", "hidden_cave")
            .with_resource("spirit_herb", 0.6, 300)
            .with_resource("fire_crystal", 0.15, 900)
            .with_enemy("spirit_beast", 0.6)
            .with_enemy("wild_wolf", 0.4)
            .with_action(
                "read_inscription",
                "Study the cliff inscription",
                ActionEffect::Study { experience: 20 },
            ),
        LocationDef::new("hidden_cave", "Hidden Cave", "Wilds", 4)
            .with_exit("east", "misty_mountain")
            .with_resource("beast_core", 0.1, 1800)
            .with_enemy("spirit_beast", 1.0)
            .with_action(
                "search_cave",
                "Search the back of the cave",
                ActionEffect::Search {
                    item_id: "ancient_scroll".into(),
                    flag: "hidden_cave_scroll".into(),
                },
            ),
        LocationDef::new("ancient_ruins", "Ancient Ruins", "Wilds", 5)
            .with_exit("west", "bamboo_forest")
            .with_enemy("rogue_disciple", 0.5)
            .with_enemy("bandit", 0.5)
            .with_action(
                "search_ruins",
                "Sift through the rubble",
                ActionEffect::Scavenge {
                    item_id: "jade_pendant".into(),
                    chance: 0.3,
                },
            ),
        LocationDef::new("azure_cloud_gate", "Azure Cloud Gate", "Azure Peaks", 0)
            .with_exit("down", "misty_mountain")
            .with_action(
                "meditate",
                "Meditate in the sect courtyard",
                ActionEffect::Meditate {
                    experience: 25,
                    recover: 20,
                },
            ),
    ]
}

fn builtin_quests() -> Vec<QuestTemplate> {
    vec![
        QuestTemplate::new("main_awakening", "A Path Begins", QuestKind::Main)
            .with_chapter(1)
            .with_description("Leave the village and prove you can survive the wilds.")
            .with_objective(QuestObjective::new(
                ProgressKind::VisitLocations,
                ObjectiveTarget::Set(vec!["bamboo_forest".into()]),
                1,
                "Enter the Bamboo Forest",
            ))
            .with_objective(QuestObjective::new(
                ProgressKind::WinBattles,
                ObjectiveTarget::Any,
                1,
                "Win a battle",
            ))
            .with_rewards(
                RewardBundle::new()
                    .with_experience(50)
                    .with_currency(50)
                    .with_item("healing_pill", 2),
            )
            .with_next("main_tempering"),
        QuestTemplate::new("main_tempering", "Tempering the Body", QuestKind::Main)
            .with_chapter(1)
            .with_prerequisite("main_awakening")
            .with_objective(QuestObjective::new(
                ProgressKind::ReachLevel,
                ObjectiveTarget::Any,
                5,
                "Reach level 5",
            ))
            .with_objective(QuestObjective::new(
                ProgressKind::CraftItem,
                ObjectiveTarget::Any,
                1,
                "Refine any pill",
            ))
            .with_rewards(
                RewardBundle::new()
                    .with_experience(100)
                    .with_title("Aspiring Cultivator"),
            )
            .with_next("main_choose_path"),
        QuestTemplate::new("main_choose_path", "Choosing a Path", QuestKind::Main)
            .with_chapter(2)
            .with_prerequisite("main_tempering")
            .with_objective(QuestObjective::new(
                ProgressKind::JoinFaction,
                ObjectiveTarget::Any,
                1,
                "Join a faction",
            ))
            .with_rewards(RewardBundle::new().with_experience(200).with_currency(100)),
        QuestTemplate::new("side_wolf_trouble", "Wolf Trouble", QuestKind::Side)
            .with_objective(QuestObjective::new(
                ProgressKind::DefeatEnemies,
                ObjectiveTarget::Id("wild_wolf".into()),
                3,
                "Defeat 3 wild wolves",
            ))
            .with_objective(QuestObjective::new(
                ProgressKind::CollectItems,
                ObjectiveTarget::Id("wolf_pelt".into()),
                2,
                "Collect 2 wolf pelts",
            ))
            .with_rewards(RewardBundle::new().with_currency(60).with_experience(40)),
        QuestTemplate::new("side_herbs_for_healer", "Herbs for the Healer", QuestKind::Side)
            .repeatable()
            .with_objective(QuestObjective::new(
                ProgressKind::CollectItems,
                ObjectiveTarget::Id("spirit_herb".into()),
                5,
                "Collect 5 spirit herbs",
            ))
            .with_rewards(
                RewardBundle::new()
                    .with_experience(30)
                    .with_item("healing_pill", 3),
            ),
        QuestTemplate::new("side_seeker_of_fortune", "Seeker of Fortune", QuestKind::Side)
            .with_level_requirement(3)
            .with_objective(QuestObjective::new(
                ProgressKind::Custom("complete_adventure".into()),
                ObjectiveTarget::Any,
                3,
                "Resolve 3 chance encounters",
            ))
            .with_rewards(RewardBundle::new().with_experience(80).with_item("lucky_talisman", 1)),
        QuestTemplate::new("daily_meditation", "Daily Meditation", QuestKind::Daily)
            .with_objective(QuestObjective::new(
                ProgressKind::Meditate,
                ObjectiveTarget::Any,
                1,
                "Meditate once",
            ))
            .with_rewards(RewardBundle::new().with_experience(20).with_mana(20)),
        QuestTemplate::new("daily_training", "Daily Training", QuestKind::Daily)
            .with_objective(QuestObjective::new(
                ProgressKind::WinBattles,
                ObjectiveTarget::Any,
                3,
                "Win 3 battles",
            ))
            .with_rewards(RewardBundle::new().with_experience(50).with_currency(30)),
        QuestTemplate::new("azure_trial", "Trial of the Azure Sword", QuestKind::Side)
            .with_faction("azure_cloud_sect")
            .with_objective(QuestObjective::new(
                ProgressKind::ReachStanding,
                ObjectiveTarget::Id("azure_cloud_sect".into()),
                1000,
                "Become an inner disciple",
            ))
            .with_rewards(RewardBundle::new().with_item("spirit_sword", 1)),
        QuestTemplate::new("achv_budding_alchemist", "Budding Alchemist", QuestKind::Achievement)
            .with_objective(QuestObjective::new(
                ProgressKind::ReachCraftLevel,
                ObjectiveTarget::Any,
                3,
                "Reach refining level 3",
            ))
            .with_rewards(RewardBundle::new().with_title("Alchemist")),
        QuestTemplate::new("achv_pill_sage", "Pill Sage", QuestKind::Achievement)
            .with_objective(QuestObjective::new(
                ProgressKind::AchieveQuality,
                ObjectiveTarget::Threshold(5),
                1,
                "Refine a pill of Perfect quality",
            ))
            .with_rewards(RewardBundle::new().with_title("Pill Sage").with_experience(100)),
        QuestTemplate::new("achv_explorer", "Wanderer of the Land", QuestKind::Achievement)
            .with_objective(QuestObjective::new(
                ProgressKind::VisitLocations,
                ObjectiveTarget::Set(vec![
                    "bamboo_forest".into(),
                    "misty_mountain".into(),
                    "hidden_cave".into(),
                    "ancient_ruins".into(),
                ]),
                4,
                "Explore the wilds",
            ))
            .with_rewards(RewardBundle::new().with_title("Explorer").with_experience(100)),
        QuestTemplate::new("achv_foundation", "Foundation Established", QuestKind::Achievement)
            .with_objective(QuestObjective::new(
                ProgressKind::ReachCultivation,
                ObjectiveTarget::Id("Foundation".into()),
                1,
                "Reach Foundation Establishment",
            ))
            .with_rewards(RewardBundle::new().with_experience(300)),
    ]
}

fn builtin_adventures() -> Vec<(AdventureDef, Option<f64>)> {
    vec![
        (
            AdventureDef::new("mysterious_merchant", "Mysterious Merchant", 1800)
                .with_description("A hooded merchant beckons from the roadside.")
                .with_choice(
                    "buy_pills",
                    "Buy healing pills (50 gold)",
                    ChoiceRequirements {
                        currency: Some(50),
                        ..ChoiceRequirements::default()
                    },
                    "The merchant hands over two warm pills.",
                    RewardBundle::new()
                        .with_currency(-50)
                        .with_item("healing_pill", 2),
                )
                .with_choice(
                    "buy_manual",
                    "Buy the battered manual (200 gold)",
                    ChoiceRequirements {
                        currency: Some(200),
                        ..ChoiceRequirements::default()
                    },
                    "The manual smells of old incense.",
                    RewardBundle::new()
                        .with_currency(-200)
                        .with_item("breathing_manual", 1),
                )
                .with_choice(
                    "leave",
                    "Walk on",
                    ChoiceRequirements::default(),
                    "You leave the merchant behind.",
                    RewardBundle::new(),
                ),
            Some(0.15),
        ),
        (
            AdventureDef::new("ancient_cave", "Ancient Cave", 3600)
                .with_description("Warm air drifts from a crack in the rock.")
                .with_conditions(TriggerConditions {
                    min_level: Some(3),
                    locations: vec![
                        "bamboo_forest".into(),
                        "misty_mountain".into(),
                        "hidden_cave".into(),
                    ],
                    ..TriggerConditions::default()
                })
                .with_choice(
                    "explore",
                    "Squeeze through",
                    ChoiceRequirements {
                        hp: Some(50),
                        ..ChoiceRequirements::default()
                    },
                    "Scraped and scorched, you pry a crystal from the wall.",
                    RewardBundle::new()
                        .with_hit_points(-30)
                        .with_experience(80)
                        .with_item("fire_crystal", 1),
                )
                .with_choice(
                    "leave",
                    "Leave it be",
                    ChoiceRequirements::default(),
                    "Some secrets are best left alone.",
                    RewardBundle::new(),
                ),
            Some(0.08),
        ),
        (
            AdventureDef::new("wandering_master", "Wandering Master", 7200)
                .with_description("An old man sits cross-legged on a floating leaf.")
                .with_conditions(TriggerConditions {
                    min_level: Some(5),
                    min_fortune: Some(6),
                    ..TriggerConditions::default()
                })
                .with_choice(
                    "ask_guidance",
                    "Ask for guidance",
                    ChoiceRequirements::default(),
                    "A few words, and your meridians hum.",
                    RewardBundle::new().with_experience(150).with_mana(50),
                )
                .with_choice(
                    "offer_gold",
                    "Offer 100 gold",
                    ChoiceRequirements {
                        currency: Some(100),
                        ..ChoiceRequirements::default()
                    },
                    "He pockets the gold and tosses you a vial.",
                    RewardBundle::new()
                        .with_currency(-100)
                        .with_item("clarity_elixir", 1),
                ),
            Some(0.05),
        ),
        (
            AdventureDef::new("lost_herbalist", "Lost Herbalist", 1200)
                .with_conditions(TriggerConditions {
                    locations: vec!["bamboo_forest".into(), "herb_valley".into()],
                    ..TriggerConditions::default()
                })
                .with_choice(
                    "share_herbs",
                    "Show her your spirit herbs",
                    ChoiceRequirements {
                        items: vec![ItemGrant::new("spirit_herb", 3)],
                        ..ChoiceRequirements::default()
                    },
                    "She praises your eye and promises to speak well of you.",
                    RewardBundle::new()
                        .with_standing("hundred_herb_valley", 100)
                        .with_experience(40),
                )
                .with_choice(
                    "point_the_way",
                    "Point her toward the valley",
                    ChoiceRequirements::default(),
                    "She thanks you and hurries off.",
                    RewardBundle::new().with_experience(10),
                ),
            None,
        ),
        (
            AdventureDef::new("azure_elder_visit", "Visiting Elder", 3600)
                .with_conditions(TriggerConditions {
                    faction: Some("azure_cloud_sect".into()),
                    standing: BTreeMap::from([("azure_cloud_sect".to_string(), 500)]),
                    ..TriggerConditions::default()
                })
                .with_choice(
                    "spar",
                    "Request a sparring match",
                    ChoiceRequirements {
                        hp: Some(80),
                        ..ChoiceRequirements::default()
                    },
                    "The elder's blade stops a hair from your throat. A lesson learned.",
                    RewardBundle::new()
                        .with_hit_points(-40)
                        .with_experience(120)
                        .with_standing("azure_cloud_sect", 50),
                ),
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_content_is_consistent() {
        let tables = ContentTables::builtin();
        tables.validate().unwrap();
        assert!(tables.location(&tables.starting_location).is_some());
        assert_eq!(tables.adventure_weight("mysterious_merchant"), 0.15);
        assert_eq!(tables.adventure_weight("lost_herbalist"), DEFAULT_WEIGHT);
        assert_eq!(tables.quality_name(5), "Perfect");
    }

    #[test]
    fn json_round_trip_preserves_tables() {
        let tables = ContentTables::builtin();
        let json = tables.to_json_pretty().unwrap();
        let loaded = ContentTables::from_json_str(&json).unwrap();
        assert_eq!(loaded, tables);
    }

    #[test]
    fn dangling_references_are_reported() {
        let tables = ContentTables::empty("nowhere").with_recipe(
            RecipeDef::new("pill", "Pill", 1, 0.5, 10).with_material("ghost_herb", 1),
        );
        let err = tables.validate().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("starting location 'nowhere'"), "{}", text);
        assert!(text.contains("ghost_herb"), "{}", text);
    }

    #[test]
    fn oversized_timers_are_rejected() {
        let mut tables = ContentTables::builtin();
        let json = tables.to_json_pretty().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for recipe in value["recipes"].as_array_mut().unwrap() {
            if recipe["id"] == "healing_pill" {
                recipe["duration_secs"] = serde_json::Value::from(u64::MAX);
            }
        }
        let err = ContentTables::from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidContent(_)));
        assert!(err.to_string().contains("recipe healing_pill duration"), "{}", err);

        tables.adventures.values_mut().for_each(|a| a.cooldown_secs = MAX_SPAN_SECS + 1);
        assert!(tables.validate().is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"{
            "starting_location": "a",
            "locations": [
                {"id": "a", "name": "A"},
                {"id": "a", "name": "A again"}
            ]
        }"#;
        let err = ContentTables::from_json_str(json).unwrap_err();
        assert!(matches!(err, EngineError::InvalidContent(_)));
    }
}
