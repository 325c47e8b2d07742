use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::ids::VertexId;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondType;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Unique structure identifier (the graph id).
pub const PROP_UID: &str = "UID";
/// Compact graph string.
pub const PROP_GRAPH_ENC: &str = "GraphENC";
/// JSON graph encoding.
pub const PROP_GRAPH_JSON: &str = "GraphJson";
/// Free-text annotation, typically an error or quality note.
pub const PROP_MOL_ERROR: &str = "MolErr";
/// Space-separated `atom#class:x,y,z` entries with 1-based atom indices.
pub const PROP_FREE_AP: &str = "FREE_AP";
/// Whitespace-separated origin vertex per atom, `-1` for untagged atoms.
pub const PROP_VERTEX_IDS: &str = "VERTEX_IDS";
/// `closed/requested` ring counts.
pub const PROP_RING_CLOSURES: &str = "RING_CLOSURES";

const MAX_V2000_ENTRIES: usize = 999;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdfMetadata {
    pub title: String,
    /// Data items in file order.
    pub properties: Vec<(String, String)>,
}

impl SdfMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            properties: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets a property, replacing an existing value in place.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((key.to_string(), value)),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Structure too large for V2000 format: {atoms} atoms, {bonds} bonds")]
    TooLarge { atoms: usize, bonds: usize },
    #[error("No structure record found")]
    Empty,
}

fn parse_error(line: usize, message: impl Into<String>) -> SdfError {
    SdfError::Parse {
        line,
        message: message.into(),
    }
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

struct LineSource<'a, R: BufRead> {
    reader: &'a mut R,
    line_number: usize,
}

impl<R: BufRead> LineSource<'_, R> {
    fn next(&mut self) -> Result<Option<String>, SdfError> {
        let mut buf = String::new();
        if self.reader.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn expect(&mut self, what: &str) -> Result<String, SdfError> {
        self.next()?
            .ok_or_else(|| parse_error(self.line_number, format!("expected {what}, got end of file")))
    }
}

/// MDL SD file (V2000) with side-channel data items.
pub struct SdfFile;

impl SdfFile {
    /// Reads every record until end of input.
    pub fn read_all(reader: &mut impl BufRead) -> Result<Vec<(Structure, SdfMetadata)>, SdfError> {
        let mut records = Vec::new();
        let mut source = LineSource {
            reader,
            line_number: 0,
        };
        while let Some(record) = read_record(&mut source)? {
            records.push(record);
        }
        Ok(records)
    }

    /// The per-atom vertex tags in `VERTEX_IDS` form.
    pub fn vertex_ids_string(structure: &Structure) -> String {
        structure
            .atoms()
            .iter()
            .map(|a| a.vertex_id.map_or("-1".to_string(), |v| v.to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl MolecularFile for SdfFile {
    type Metadata = SdfMetadata;
    type Error = SdfError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let mut source = LineSource {
            reader,
            line_number: 0,
        };
        read_record(&mut source)?.ok_or(SdfError::Empty)
    }

    fn write_to(
        structure: &Structure,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        write_ctab(structure, &metadata.title, writer)?;

        for (key, value) in &metadata.properties {
            if key == PROP_VERTEX_IDS {
                continue;
            }
            write_property(writer, key, value)?;
        }
        if structure.atoms().iter().any(|a| a.vertex_id.is_some()) {
            write_property(writer, PROP_VERTEX_IDS, &SdfFile::vertex_ids_string(structure))?;
        }
        writeln!(writer, "$$$$")?;
        Ok(())
    }

    fn write_structure_to(
        structure: &Structure,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        write_ctab(structure, "", writer)?;
        writeln!(writer, "$$$$")?;
        Ok(())
    }
}

fn write_property(writer: &mut impl Write, key: &str, value: &str) -> io::Result<()> {
    writeln!(writer, "> <{}>", key)?;
    writeln!(writer, "{}", value)?;
    writeln!(writer)
}

fn write_ctab(structure: &Structure, title: &str, writer: &mut impl Write) -> Result<(), SdfError> {
    let (n_atoms, n_bonds) = (structure.atom_count(), structure.bond_count());
    if n_atoms > MAX_V2000_ENTRIES || n_bonds > MAX_V2000_ENTRIES {
        return Err(SdfError::TooLarge {
            atoms: n_atoms,
            bonds: n_bonds,
        });
    }

    writeln!(writer, "{}", title.lines().next().unwrap_or(""))?;
    writeln!(writer, "  frag3d            3D")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "{:3}{:3}  0  0  0  0  0  0  0  0999 V2000",
        n_atoms, n_bonds
    )?;

    for atom in structure.atoms() {
        writeln!(
            writer,
            "{:10.4}{:10.4}{:10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0",
            atom.position.x, atom.position.y, atom.position.z, atom.element
        )?;
    }
    for bond in structure.bonds() {
        writeln!(
            writer,
            "{:3}{:3}{:3}  0  0  0  0",
            bond.atom1 + 1,
            bond.atom2 + 1,
            bond.order.ctfile_code()
        )?;
    }

    let charged: Vec<(usize, i8)> = structure
        .atoms()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.formal_charge != 0)
        .map(|(i, a)| (i, a.formal_charge))
        .collect();
    for chunk in charged.chunks(8) {
        write!(writer, "M  CHG{:3}", chunk.len())?;
        for (idx, charge) in chunk {
            write!(writer, " {:3} {:3}", idx + 1, charge)?;
        }
        writeln!(writer)?;
    }
    writeln!(writer, "M  END")?;
    Ok(())
}

fn read_record<R: BufRead>(
    source: &mut LineSource<'_, R>,
) -> Result<Option<(Structure, SdfMetadata)>, SdfError> {
    let title = loop {
        match source.next()? {
            None => return Ok(None),
            Some(line) if line.starts_with("$$$$") => continue,
            Some(line) => break line.trim().to_string(),
        }
    };
    source.expect("program line")?;
    source.expect("comment line")?;

    let counts = source.expect("counts line")?;
    let line = source.line_number;
    let n_atoms: usize = slice_and_trim(&counts, 0, 3)
        .parse()
        .map_err(|_| parse_error(line, "invalid atom count"))?;
    let n_bonds: usize = slice_and_trim(&counts, 3, 6)
        .parse()
        .map_err(|_| parse_error(line, "invalid bond count"))?;
    if slice_and_trim(&counts, 33, 39) == "V3000" {
        return Err(parse_error(line, "V3000 records are not supported"));
    }

    let mut structure = Structure::new();
    for i in 0..n_atoms {
        let text = source.expect(&format!("atom {}", i + 1))?;
        let line = source.line_number;
        let coord = |start: usize, end: usize, axis: &str| -> Result<f64, SdfError> {
            slice_and_trim(&text, start, end)
                .parse()
                .map_err(|_| parse_error(line, format!("invalid {axis} coordinate")))
        };
        let position = Point3::new(coord(0, 10, "x")?, coord(10, 20, "y")?, coord(20, 30, "z")?);
        let symbol = slice_and_trim(&text, 31, 34);
        if symbol.is_empty() {
            return Err(parse_error(line, "missing atom symbol"));
        }
        structure.add_atom(Atom::new(symbol, position));
    }

    for i in 0..n_bonds {
        let text = source.expect(&format!("bond {}", i + 1))?;
        let line = source.line_number;
        let index = |start: usize, end: usize| -> Result<usize, SdfError> {
            slice_and_trim(&text, start, end)
                .parse::<usize>()
                .ok()
                .filter(|&n| n >= 1 && n <= n_atoms)
                .map(|n| n - 1)
                .ok_or_else(|| parse_error(line, "invalid atom number in bond"))
        };
        let (a1, a2) = (index(0, 3)?, index(3, 6)?);
        let order = slice_and_trim(&text, 6, 9)
            .parse()
            .map(BondType::from_ctfile_code)
            .unwrap_or(BondType::Single);
        structure
            .add_bond(a1, a2, order)
            .ok_or_else(|| parse_error(line, "self-bond"))?;
    }

    loop {
        let text = source.expect("M  END")?;
        if text.starts_with("M  END") {
            break;
        }
        if text.starts_with("M  CHG") {
            for (atom, charge) in parse_charge_line(&text) {
                if let Some(a) = structure.atom_mut(atom) {
                    a.formal_charge = charge;
                }
            }
        }
    }

    let mut metadata = SdfMetadata::new(title);
    let mut current: Option<(String, Vec<String>)> = None;
    while let Some(text) = source.next()? {
        let blank = text.trim().is_empty();
        match current.take() {
            Some((key, values)) if blank => metadata.properties.push((key, values.join("\n"))),
            Some((key, mut values)) => {
                values.push(text);
                current = Some((key, values));
            }
            None if text.starts_with("$$$$") => break,
            None if text.starts_with('>') => {
                let key = text
                    .split_once('<')
                    .and_then(|(_, rest)| rest.split_once('>'))
                    .map(|(key, _)| key.to_string())
                    .unwrap_or_default();
                current = Some((key, Vec::new()));
            }
            None => {}
        }
    }
    if let Some((key, values)) = current.take() {
        metadata.properties.push((key, values.join("\n")));
    }

    if let Some(ids) = metadata.get(PROP_VERTEX_IDS) {
        apply_vertex_ids(&mut structure, ids);
    }
    Ok(Some((structure, metadata)))
}

fn parse_charge_line(line: &str) -> Vec<(usize, i8)> {
    let parts: Vec<&str> = line.split_whitespace().skip(3).collect();
    parts
        .chunks(2)
        .filter_map(|pair| match pair {
            [atom, charge] => {
                let atom: usize = atom.parse().ok()?;
                Some((atom.checked_sub(1)?, charge.parse().ok()?))
            }
            _ => None,
        })
        .collect()
}

fn apply_vertex_ids(structure: &mut Structure, ids: &str) {
    for (atom, token) in structure.atoms_mut().iter_mut().zip(ids.split_whitespace()) {
        atom.vertex_id = token.parse::<u32>().ok().map(VertexId);
    }
}
