use phf::{Map, Set, phf_map, phf_set};
use std::collections::HashMap;

/// Symbol used for inert placeholder atoms.
pub const DUMMY_ELEMENT: &str = "Du";

/// Symbol of the atom used to cap unused ring-closing attractors.
pub const CAPPING_ELEMENT: &str = "H";

static DUMMY_ELEMENTS: Set<&'static str> = phf_set! {
    "Du", "DU", "X", "*", "R",
};

/// Default Tinker atom-type numbers keyed by element symbol.
///
/// The numbering follows the force-field parameter file shipped with the ring-closing
/// conformational search; pseudo-atoms get reserved high numbers.
static TINKER_ATOM_TYPES: Map<&'static str, u32> = phf_map! {
    "H" => 5, "C" => 1, "N" => 7, "O" => 6, "F" => 11, "P" => 25, "S" => 15,
    "Cl" => 12, "Br" => 13, "I" => 14, "B" => 26, "Si" => 19, "Se" => 34,
    "Du" => 900, "ATP" => 901, "ATM" => 902, "ATN" => 903,
};

static COVALENT_RADII: Map<&'static str, f64> = phf_map! {
    "H" => 0.31, "C" => 0.76, "N" => 0.71, "O" => 0.66, "F" => 0.57, "P" => 1.07,
    "S" => 1.05, "Cl" => 1.02, "Br" => 1.20, "I" => 1.39, "B" => 0.84, "Si" => 1.11,
    "Se" => 1.20,
};

pub fn is_dummy_element(symbol: &str) -> bool {
    DUMMY_ELEMENTS.contains(symbol.trim())
}

pub fn default_tinker_type(symbol: &str) -> Option<u32> {
    TINKER_ATOM_TYPES.get(symbol.trim()).copied()
}

/// The full default symbol → Tinker atom-type table as an owned map.
pub fn default_tinker_types() -> HashMap<String, u32> {
    TINKER_ATOM_TYPES
        .entries()
        .map(|(symbol, atom_type)| (symbol.to_string(), *atom_type))
        .collect()
}

pub fn covalent_radius(symbol: &str) -> Option<f64> {
    COVALENT_RADII.get(symbol.trim()).copied()
}
