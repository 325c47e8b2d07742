use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bond type carried by bonds, graph edges and ring records.
///
/// `None` marks adjacency without a chemical bond (e.g. edges to placeholder
/// vertices); `Undefined` is an order that has not been perceived yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BondType {
    None,
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
    Undefined,
}

impl BondType {
    /// Whether this type materialises as a bond between atoms.
    pub fn has_chemical_analogue(self) -> bool {
        !matches!(self, Self::None)
    }

    /// MDL CTfile bond-type code.
    pub fn ctfile_code(self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Aromatic => 4,
            Self::None | Self::Undefined => 8,
        }
    }

    pub fn from_ctfile_code(code: u8) -> Self {
        match code {
            1 => Self::Single,
            2 => Self::Double,
            3 => Self::Triple,
            4 => Self::Aromatic,
            _ => Self::Undefined,
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid bond type string")]
pub struct ParseBondTypeError;

impl FromStr for BondType {
    type Err = ParseBondTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "n" | "none" => Ok(Self::None),
            "1" | "s" | "single" => Ok(Self::Single),
            "2" | "d" | "double" => Ok(Self::Double),
            "3" | "t" | "triple" => Ok(Self::Triple),
            "ar" | "aromatic" => Ok(Self::Aromatic),
            "u" | "undefined" => Ok(Self::Undefined),
            _ => Err(ParseBondTypeError),
        }
    }
}

impl fmt::Display for BondType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::None => "None",
                Self::Single => "Single",
                Self::Double => "Double",
                Self::Triple => "Triple",
                Self::Aromatic => "Aromatic",
                Self::Undefined => "Undefined",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1: usize,     // index of the first atom
    pub atom2: usize,     // index of the second atom
    pub order: BondType,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, order: BondType) -> Self {
        Self {
            atom1,
            atom2,
            order,
        }
    }

    pub fn connects(&self, a: usize, b: usize) -> bool {
        (self.atom1 == a && self.atom2 == b) || (self.atom1 == b && self.atom2 == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bond_type_from_str_parses_valid_strings() {
        assert_eq!("1".parse::<BondType>().unwrap(), BondType::Single);
        assert_eq!("single".parse::<BondType>().unwrap(), BondType::Single);
        assert_eq!("S".parse::<BondType>().unwrap(), BondType::Single);
        assert_eq!("2".parse::<BondType>().unwrap(), BondType::Double);
        assert_eq!("D".parse::<BondType>().unwrap(), BondType::Double);
        assert_eq!("triple".parse::<BondType>().unwrap(), BondType::Triple);
        assert_eq!("ar".parse::<BondType>().unwrap(), BondType::Aromatic);
        assert_eq!("none".parse::<BondType>().unwrap(), BondType::None);
        assert_eq!("0".parse::<BondType>().unwrap(), BondType::None);
        assert_eq!("undefined".parse::<BondType>().unwrap(), BondType::Undefined);
    }

    #[test]
    fn bond_type_from_str_rejects_invalid_strings() {
        assert!("".parse::<BondType>().is_err());
        assert!("quadruple".parse::<BondType>().is_err());
        assert!("5".parse::<BondType>().is_err());
    }

    #[test]
    fn only_none_lacks_a_chemical_analogue() {
        assert!(!BondType::None.has_chemical_analogue());
        assert!(BondType::Single.has_chemical_analogue());
        assert!(BondType::Undefined.has_chemical_analogue());
    }

    #[test]
    fn ctfile_codes_map_back_and_forth() {
        for ty in [
            BondType::Single,
            BondType::Double,
            BondType::Triple,
            BondType::Aromatic,
        ] {
            assert_eq!(BondType::from_ctfile_code(ty.ctfile_code()), ty);
        }
        assert_eq!(BondType::from_ctfile_code(8), BondType::Undefined);
    }

    #[test]
    fn bond_type_serializes_lowercase() {
        let json = serde_json::to_string(&BondType::Double).unwrap();
        assert_eq!(json, "\"double\"");
    }

    #[test]
    fn bond_connects_either_orientation() {
        let bond = Bond::new(3, 7, BondType::Single);
        assert!(bond.connects(3, 7));
        assert!(bond.connects(7, 3));
        assert!(!bond.connects(3, 4));
    }
}
