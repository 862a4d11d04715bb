use crate::types::Type;

/// Item behaviour that fires during the end-of-turn phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResidualItem {
    Leftovers,
    BlackSludge,
    SitrusBerry,
    LumBerry,
    FlameOrb,
    ToxicOrb,
}

#[derive(Clone, Copy, Debug)]
pub struct ItemEffect {
    pub name: &'static str,
    pub speed_mult: Option<f64>,
    pub atk_mult: Option<f64>,
    pub spa_mult: Option<f64>,
    pub def_mult: Option<f64>,
    pub spd_mult: Option<f64>,
    pub life_orb: bool,
    pub expert_belt: bool,
    pub type_boost: Option<Type>,
    pub choice: bool,
    pub sash_like: bool,
    pub ignores_hazards: bool,
    pub residual: Option<ResidualItem>,
}

const BASE: ItemEffect = ItemEffect {
    name: "",
    speed_mult: None,
    atk_mult: None,
    spa_mult: None,
    def_mult: None,
    spd_mult: None,
    life_orb: false,
    expert_belt: false,
    type_boost: None,
    choice: false,
    sash_like: false,
    ignores_hazards: false,
    residual: None,
};

impl Default for ItemEffect {
    fn default() -> Self {
        BASE
    }
}

const fn type_item(name: &'static str, boosted: Type) -> ItemEffect {
    ItemEffect {
        name,
        type_boost: Some(boosted),
        ..BASE
    }
}

pub static ITEM_TABLE: phf::Map<&'static str, ItemEffect> = phf::phf_map! {
    "choiceband" => ItemEffect { name: "Choice Band", atk_mult: Some(1.5), choice: true, ..BASE },
    "choicespecs" => ItemEffect { name: "Choice Specs", spa_mult: Some(1.5), choice: true, ..BASE },
    "choicescarf" => ItemEffect { name: "Choice Scarf", speed_mult: Some(1.5), choice: true, ..BASE },
    "ironball" => ItemEffect { name: "Iron Ball", speed_mult: Some(0.5), ..BASE },
    "eviolite" => ItemEffect { name: "Eviolite", def_mult: Some(1.5), spd_mult: Some(1.5), ..BASE },
    "assaultvest" => ItemEffect { name: "Assault Vest", spd_mult: Some(1.5), ..BASE },
    "lifeorb" => ItemEffect { name: "Life Orb", life_orb: true, ..BASE },
    "expertbelt" => ItemEffect { name: "Expert Belt", expert_belt: true, ..BASE },
    "focussash" => ItemEffect { name: "Focus Sash", sash_like: true, ..BASE },
    "heavydutyboots" => ItemEffect { name: "Heavy-Duty Boots", ignores_hazards: true, ..BASE },
    "leftovers" => ItemEffect { name: "Leftovers", residual: Some(ResidualItem::Leftovers), ..BASE },
    "blacksludge" => ItemEffect { name: "Black Sludge", residual: Some(ResidualItem::BlackSludge), ..BASE },
    "sitrusberry" => ItemEffect { name: "Sitrus Berry", residual: Some(ResidualItem::SitrusBerry), ..BASE },
    "lumberry" => ItemEffect { name: "Lum Berry", residual: Some(ResidualItem::LumBerry), ..BASE },
    "flameorb" => ItemEffect { name: "Flame Orb", residual: Some(ResidualItem::FlameOrb), ..BASE },
    "toxicorb" => ItemEffect { name: "Toxic Orb", residual: Some(ResidualItem::ToxicOrb), ..BASE },
    "charcoal" => type_item("Charcoal", Type::Fire),
    "mysticwater" => type_item("Mystic Water", Type::Water),
    "miracleseed" => type_item("Miracle Seed", Type::Grass),
    "magnet" => type_item("Magnet", Type::Electric),
    "nevermeltice" => type_item("Never-Melt Ice", Type::Ice),
    "blackbelt" => type_item("Black Belt", Type::Fighting),
    "poisonbarb" => type_item("Poison Barb", Type::Poison),
    "softsand" => type_item("Soft Sand", Type::Ground),
    "sharpbeak" => type_item("Sharp Beak", Type::Flying),
    "twistedspoon" => type_item("Twisted Spoon", Type::Psychic),
    "silverpowder" => type_item("Silver Powder", Type::Bug),
    "hardstone" => type_item("Hard Stone", Type::Rock),
    "spelltag" => type_item("Spell Tag", Type::Ghost),
    "dragonfang" => type_item("Dragon Fang", Type::Dragon),
    "blackglasses" => type_item("Black Glasses", Type::Dark),
    "metalcoat" => type_item("Metal Coat", Type::Steel),
    "silkscarf" => type_item("Silk Scarf", Type::Normal),
    "fairyfeather" => type_item("Fairy Feather", Type::Fairy),
};

pub const TYPE_BOOST_ITEM_MULT: f64 = 1.2;
pub const EXPERT_BELT_MULT: f64 = 1.2;
pub const LIFE_ORB_MULT: f64 = 1.3;

/// Lowercase alphanumeric form used as the table key ("Focus Sash" -> "focussash").
pub fn normalize_id(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

pub fn item_effect(name: &str) -> Option<&'static ItemEffect> {
    let effect = ITEM_TABLE.get(normalize_id(name).as_str());
    if effect.is_none() {
        log::debug!("item '{name}' has no modelled effect");
    }
    effect
}
