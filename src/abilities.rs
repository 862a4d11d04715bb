use crate::items::normalize_id;
use crate::model::{Terrain, Weather};
use crate::types::Type;

/// Abilities with modelled battle effects. Anything else resolves to `Other`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Ability {
    Blaze,
    Torrent,
    Overgrow,
    Swarm,
    Defeatist,
    Multiscale,
    ShadowShield,
    ThickFat,
    Heatproof,
    Filter,
    SolidRock,
    PrismArmor,
    DrySkin,
    HugePower,
    PurePower,
    Guts,
    Adaptability,
    Technician,
    Levitate,
    FlashFire,
    WaterAbsorb,
    StormDrain,
    VoltAbsorb,
    LightningRod,
    MotorDrive,
    SapSipper,
    Sturdy,
    Intimidate,
    Drought,
    Drizzle,
    SandStream,
    SnowWarning,
    DesolateLand,
    PrimordialSea,
    ElectricSurge,
    GrassySurge,
    PsychicSurge,
    MistySurge,
    SwiftSwim,
    Chlorophyll,
    SandRush,
    SlushRush,
    SurgeSurfer,
    QuickFeet,
    MagicGuard,
    Moxie,
    BeastBoost,
    Other,
}

static ABILITY_TABLE: phf::Map<&'static str, Ability> = phf::phf_map! {
    "blaze" => Ability::Blaze,
    "torrent" => Ability::Torrent,
    "overgrow" => Ability::Overgrow,
    "swarm" => Ability::Swarm,
    "defeatist" => Ability::Defeatist,
    "multiscale" => Ability::Multiscale,
    "shadowshield" => Ability::ShadowShield,
    "thickfat" => Ability::ThickFat,
    "heatproof" => Ability::Heatproof,
    "filter" => Ability::Filter,
    "solidrock" => Ability::SolidRock,
    "prismarmor" => Ability::PrismArmor,
    "dryskin" => Ability::DrySkin,
    "hugepower" => Ability::HugePower,
    "purepower" => Ability::PurePower,
    "guts" => Ability::Guts,
    "adaptability" => Ability::Adaptability,
    "technician" => Ability::Technician,
    "levitate" => Ability::Levitate,
    "flashfire" => Ability::FlashFire,
    "waterabsorb" => Ability::WaterAbsorb,
    "stormdrain" => Ability::StormDrain,
    "voltabsorb" => Ability::VoltAbsorb,
    "lightningrod" => Ability::LightningRod,
    "motordrive" => Ability::MotorDrive,
    "sapsipper" => Ability::SapSipper,
    "sturdy" => Ability::Sturdy,
    "intimidate" => Ability::Intimidate,
    "drought" => Ability::Drought,
    "drizzle" => Ability::Drizzle,
    "sandstream" => Ability::SandStream,
    "snowwarning" => Ability::SnowWarning,
    "desolateland" => Ability::DesolateLand,
    "primordialsea" => Ability::PrimordialSea,
    "electricsurge" => Ability::ElectricSurge,
    "grassysurge" => Ability::GrassySurge,
    "psychicsurge" => Ability::PsychicSurge,
    "mistysurge" => Ability::MistySurge,
    "swiftswim" => Ability::SwiftSwim,
    "chlorophyll" => Ability::Chlorophyll,
    "sandrush" => Ability::SandRush,
    "slushrush" => Ability::SlushRush,
    "surgesurfer" => Ability::SurgeSurfer,
    "quickfeet" => Ability::QuickFeet,
    "magicguard" => Ability::MagicGuard,
    "moxie" => Ability::Moxie,
    "beastboost" => Ability::BeastBoost,
};

impl Ability {
    pub fn from_name(name: &str) -> Ability {
        ABILITY_TABLE
            .get(normalize_id(name).as_str())
            .copied()
            .unwrap_or(Ability::Other)
    }

    /// Type this ability makes its holder immune to, on top of the type chart.
    pub fn immune_type(self) -> Option<Type> {
        match self {
            Ability::Levitate => Some(Type::Ground),
            Ability::FlashFire => Some(Type::Fire),
            Ability::WaterAbsorb | Ability::StormDrain | Ability::DrySkin => Some(Type::Water),
            Ability::VoltAbsorb | Ability::LightningRod | Ability::MotorDrive => {
                Some(Type::Electric)
            }
            Ability::SapSipper => Some(Type::Grass),
            _ => None,
        }
    }

    /// Type boosted by 1.5x while the holder is at or below a third of its HP.
    pub fn pinch_type(self) -> Option<Type> {
        match self {
            Ability::Blaze => Some(Type::Fire),
            Ability::Torrent => Some(Type::Water),
            Ability::Overgrow => Some(Type::Grass),
            Ability::Swarm => Some(Type::Bug),
            _ => None,
        }
    }

    pub fn entry_weather(self) -> Option<Weather> {
        match self {
            Ability::Drought => Some(Weather::Sun),
            Ability::Drizzle => Some(Weather::Rain),
            Ability::SandStream => Some(Weather::Sand),
            Ability::SnowWarning => Some(Weather::Hail),
            Ability::DesolateLand => Some(Weather::HarshSun),
            Ability::PrimordialSea => Some(Weather::HeavyRain),
            _ => None,
        }
    }

    pub fn entry_terrain(self) -> Option<Terrain> {
        match self {
            Ability::ElectricSurge => Some(Terrain::Electric),
            Ability::GrassySurge => Some(Terrain::Grassy),
            Ability::PsychicSurge => Some(Terrain::Psychic),
            Ability::MistySurge => Some(Terrain::Misty),
            _ => None,
        }
    }

    /// Abilities the opposing AI rewards with an extra kill bonus.
    pub fn boosts_on_kill(self) -> bool {
        matches!(self, Ability::Moxie | Ability::BeastBoost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_regardless_of_formatting() {
        assert_eq!(Ability::from_name("Huge Power"), Ability::HugePower);
        assert_eq!(Ability::from_name("primordial-sea"), Ability::PrimordialSea);
        assert_eq!(Ability::from_name("Pickup"), Ability::Other);
    }

    #[test]
    fn immunities_and_pinch_types() {
        assert_eq!(Ability::Levitate.immune_type(), Some(Type::Ground));
        assert_eq!(Ability::Blaze.pinch_type(), Some(Type::Fire));
        assert_eq!(Ability::Guts.immune_type(), None);
    }
}
