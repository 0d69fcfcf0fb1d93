//! Name generation utilities

use crate::components::Name;
use rand::Rng;

/// Generate a random settler name
pub fn generate_name(rng: &mut impl Rng) -> Name {
    let given = GIVEN_NAMES[rng.gen_range(0..GIVEN_NAMES.len())];
    let family = FAMILY_NAMES[rng.gen_range(0..FAMILY_NAMES.len())];

    Name::new(given, family)
}

/// Name for the `index`th settlement; repeats with a numeral once the list
/// runs out
pub fn settlement_name(index: usize) -> String {
    let base = SETTLEMENT_NAMES[index % SETTLEMENT_NAMES.len()];
    match index / SETTLEMENT_NAMES.len() {
        0 => base.to_string(),
        n => format!("{} {}", base, n + 1),
    }
}

/// Name for a rover
pub fn rover_name(index: usize) -> String {
    let base = ROVER_NAMES[index % ROVER_NAMES.len()];
    match index / ROVER_NAMES.len() {
        0 => base.to_string(),
        n => format!("{} {}", base, n + 1),
    }
}

static GIVEN_NAMES: &[&str] = &[
    "Ada", "Bram", "Celia", "Dario", "Esme", "Farid", "Greta", "Hugo", "Ines", "Jonas", "Kaveh",
    "Lucia", "Mateo", "Noor", "Oskar", "Paloma", "Quinn", "Rhea", "Soren", "Tove", "Ugo",
    "Vesna", "Wen", "Ximena", "Yusuf", "Zofia", "Anouk", "Bodhi", "Chioma", "Emil",
];

static FAMILY_NAMES: &[&str] = &[
    "Abara", "Bergstrom", "Castellano", "Dube", "Eriksen", "Fontaine", "Gupta", "Halvorsen",
    "Ibarra", "Jurado", "Kaminski", "Lindqvist", "Moreau", "Nwosu", "Oyelaran", "Pereira",
    "Quist", "Rahimi", "Sokolova", "Takeda", "Urquhart", "Varga", "Whitlock", "Xu", "Yilmaz",
    "Zelenko",
];

static SETTLEMENT_NAMES: &[&str] = &[
    "Schiaparelli Base",
    "Gale Outpost",
    "Jezero Station",
    "Elysium Camp",
    "Tharsis Hold",
    "Utopia Landing",
    "Arcadia Post",
    "Hellas Depot",
];

static ROVER_NAMES: &[&str] = &[
    "Pathfinder",
    "Sojourner",
    "Wanderer",
    "Drifter",
    "Nomad",
    "Rambler",
    "Trailblazer",
    "Voyager",
];
