//! Files exchanged with the Tinker ring-closing conformational search.
//!
//! - `.int` internal-coordinate files (read and write)
//! - `.key` keyword files carrying the ring-closing potential setup
//! - submit files answering the search program's prompts

use crate::core::zmatrix::{ZAtom, ZMatrix};
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TinkerFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Tinker file parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Declared {declared} atoms but found {found}")]
    AtomCountMismatch { declared: usize, found: usize },
}

fn parse_error(line: usize, message: impl Into<String>) -> TinkerFileError {
    TinkerFileError::Parse {
        line,
        message: message.into(),
    }
}

/// Minimum number of whitespace-separated fields on the `.int` line of atom `i`.
fn expected_fields(i: usize) -> usize {
    match i {
        0 => 3,
        1 => 5,
        2 => 7,
        _ => 10,
    }
}

pub fn write_int(zmatrix: &ZMatrix, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "{:6}  {}", zmatrix.len(), zmatrix.title)?;
    for (i, atom) in zmatrix.atoms.iter().enumerate() {
        let mut line = format!("{:6}  {:<3}{:6}", i + 1, atom.symbol, atom.atom_type);
        if let Some(r) = atom.bond_ref {
            let _ = write!(line, "{:6}{:10.5}", r + 1, atom.bond_length);
        }
        if let Some(r) = atom.angle_ref {
            let _ = write!(line, "{:6}{:10.4}", r + 1, atom.angle);
        }
        if let Some(r) = atom.torsion_ref {
            let _ = write!(line, "{:6}{:10.4}{:6}", r + 1, atom.torsion, atom.chirality);
        }
        writeln!(writer, "{}", line)?;
    }

    if !zmatrix.extra_bonds.is_empty() || !zmatrix.broken_bonds.is_empty() {
        writeln!(writer)?;
        for (a, b) in &zmatrix.extra_bonds {
            writeln!(writer, "{:6}{:6}", a + 1, b + 1)?;
        }
    }
    if !zmatrix.broken_bonds.is_empty() {
        writeln!(writer)?;
        for (a, b) in &zmatrix.broken_bonds {
            writeln!(writer, "{:6}{:6}", a + 1, b + 1)?;
        }
    }
    Ok(())
}

/// Merges atom lines that the search program wrapped onto two physical lines.
///
/// Only applied when there are more atom lines than declared atoms.
pub fn rejoin_split_lines(lines: &[String], declared: usize) -> Vec<String> {
    if lines.len() <= declared {
        return lines.to_vec();
    }
    let mut joined = Vec::with_capacity(declared);
    let mut pending = String::new();
    for line in lines {
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(line.trim());
        if pending.split_whitespace().count() >= expected_fields(joined.len()) {
            joined.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        joined.push(pending);
    }
    joined
}

pub fn read_int(reader: &mut impl BufRead) -> Result<ZMatrix, TinkerFileError> {
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    let header = lines
        .first()
        .ok_or_else(|| parse_error(1, "missing header line"))?;
    let (count, title) = match header.trim().split_once(char::is_whitespace) {
        Some((count, title)) => (count, title.trim()),
        None => (header.trim(), ""),
    };
    let declared: usize = count
        .parse()
        .map_err(|_| parse_error(1, format!("invalid atom count '{count}'")))?;

    let mut sections: Vec<Vec<String>> = vec![Vec::new()];
    for line in &lines[1..] {
        if line.trim().is_empty() {
            sections.push(Vec::new());
        } else if let Some(section) = sections.last_mut() {
            section.push(line.clone());
        }
    }
    let atom_lines = rejoin_split_lines(&sections[0], declared);
    if atom_lines.len() != declared {
        return Err(TinkerFileError::AtomCountMismatch {
            declared,
            found: atom_lines.len(),
        });
    }

    let atoms = atom_lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_atom_line(i, line))
        .collect::<Result<Vec<_>, _>>()?;
    let pairs = |section: Option<&Vec<String>>| -> Result<Vec<(usize, usize)>, TinkerFileError> {
        section
            .map(|lines| lines.iter().map(|l| parse_pair(l)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    };

    Ok(ZMatrix {
        title: title.to_string(),
        atoms,
        extra_bonds: pairs(sections.get(1))?,
        broken_bonds: pairs(sections.get(2))?,
    })
}

fn parse_atom_line(i: usize, line: &str) -> Result<ZAtom, TinkerFileError> {
    let row = i + 2;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < expected_fields(i) {
        return Err(parse_error(
            row,
            format!("atom {} has {} fields, expected {}", i + 1, fields.len(), expected_fields(i)),
        ));
    }
    let index = |k: usize| -> Result<usize, TinkerFileError> {
        fields[k]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| parse_error(row, format!("invalid atom reference '{}'", fields[k])))
    };
    let value = |k: usize| -> Result<f64, TinkerFileError> {
        fields[k]
            .parse::<f64>()
            .map_err(|_| parse_error(row, format!("invalid number '{}'", fields[k])))
    };

    let mut atom = ZAtom {
        symbol: fields[1].to_string(),
        atom_type: fields[2]
            .parse()
            .map_err(|_| parse_error(row, format!("invalid atom type '{}'", fields[2])))?,
        bond_ref: None,
        angle_ref: None,
        torsion_ref: None,
        bond_length: 0.0,
        angle: 0.0,
        torsion: 0.0,
        chirality: 0,
    };
    if fields.len() >= 5 {
        atom.bond_ref = Some(index(3)?);
        atom.bond_length = value(4)?;
    }
    if fields.len() >= 7 {
        atom.angle_ref = Some(index(5)?);
        atom.angle = value(6)?;
    }
    if fields.len() >= 10 {
        atom.torsion_ref = Some(index(7)?);
        atom.torsion = value(8)?;
        atom.chirality = fields[9]
            .parse()
            .map_err(|_| parse_error(row, format!("invalid chirality '{}'", fields[9])))?;
    }
    Ok(atom)
}

fn parse_pair(line: &str) -> Result<(usize, usize), TinkerFileError> {
    let nums: Vec<usize> = line
        .split_whitespace()
        .map(|t| t.parse::<usize>().ok().and_then(|n| n.checked_sub(1)))
        .collect::<Option<_>>()
        .ok_or_else(|| parse_error(0, format!("invalid bond line '{}'", line.trim())))?;
    match nums.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(parse_error(0, format!("invalid bond line '{}'", line.trim()))),
    }
}

/// Path of the `.int` file written after optimisation cycle `cycle`: `basename.NNN`.
pub fn cycle_output_path(basename: &Path, cycle: usize) -> PathBuf {
    let mut name = basename.as_os_str().to_os_string();
    name.push(format!(".{:03}", cycle));
    PathBuf::from(name)
}

/// Number of completed optimisation cycles recorded in a search log.
pub fn count_cycles(log: &str, marker: &str) -> usize {
    if marker.is_empty() {
        return 0;
    }
    log.matches(marker).count()
}

/// Keyword file for one ring-closing search.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFile {
    pub parameters: PathBuf,
    pub keywords: Vec<String>,
    /// Attractor pairs (0-based atom indices) biased towards each other.
    pub attractor_pairs: Vec<(usize, usize)>,
    pub attraction_strength: f64,
    pub overlap_distance: f64,
}

impl KeyFile {
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "PARAMETERS        {}", self.parameters.display())?;
        for keyword in &self.keywords {
            writeln!(writer, "{}", keyword)?;
        }
        if !self.attractor_pairs.is_empty() {
            writeln!(writer, "RC-ATTRACTION     {:.4}", self.attraction_strength)?;
            writeln!(writer, "RC-OVERLAP        {:.4}", self.overlap_distance)?;
            for (a, b) in &self.attractor_pairs {
                writeln!(writer, "RC-PAIR           {:6}{:6}", a + 1, b + 1)?;
            }
        }
        Ok(())
    }
}

/// Answers to the conformational search prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitFile {
    pub int_file: PathBuf,
    /// Bonds (0-based atom indices) to rotate about.
    pub rotatable_bonds: Vec<(usize, usize)>,
    pub search_directions: u32,
    pub rms_gradient: f64,
}

impl SubmitFile {
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "{}", self.int_file.display())?;
        writeln!(writer, "N")?;
        for (a, b) in &self.rotatable_bonds {
            writeln!(writer, "{:6}{:6}", a + 1, b + 1)?;
        }
        writeln!(writer)?;
        writeln!(writer, "{}", self.search_directions)?;
        writeln!(writer, "{}", self.rms_gradient)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn zatom(symbol: &str, refs: [Option<usize>; 3], values: [f64; 3], chirality: i8) -> ZAtom {
        ZAtom {
            symbol: symbol.into(),
            atom_type: 1,
            bond_ref: refs[0],
            angle_ref: refs[1],
            torsion_ref: refs[2],
            bond_length: values[0],
            angle: values[1],
            torsion: values[2],
            chirality,
        }
    }

    fn sample() -> ZMatrix {
        ZMatrix {
            title: "sample molecule".into(),
            atoms: vec![
                zatom("C", [None, None, None], [0.0; 3], 0),
                zatom("C", [Some(0), None, None], [1.54, 0.0, 0.0], 0),
                zatom("O", [Some(1), Some(0), None], [1.43, 109.5, 0.0], 0),
                zatom("ATP", [Some(2), Some(1), Some(0)], [1.1, 110.0, -60.0], 0),
                zatom("H", [Some(1), Some(0), Some(2)], [1.09, 109.5, 109.5], -1),
            ],
            extra_bonds: vec![(0, 3)],
            broken_bonds: vec![(2, 3)],
        }
    }

    fn write_to_string(z: &ZMatrix) -> String {
        let mut out = Vec::new();
        write_int(z, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn int_file_round_trips_through_text() {
        let z = sample();
        let text = write_to_string(&z);
        let back = read_int(&mut Cursor::new(text)).unwrap();

        assert_eq!(back.title, "sample molecule");
        assert_eq!(back.len(), 5);
        assert_eq!(back.atoms[3].symbol, "ATP");
        assert_eq!(back.atoms[4].chirality, -1);
        assert_eq!(back.atoms[4].torsion_ref, Some(2));
        assert!((back.atoms[3].torsion + 60.0).abs() < 1e-4);
        assert_eq!(back.extra_bonds, vec![(0, 3)]);
        assert_eq!(back.broken_bonds, vec![(2, 3)]);
    }

    #[test]
    fn header_and_first_lines_use_one_based_indices() {
        let text = write_to_string(&sample());
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "     5  sample molecule");
        assert_eq!(lines.next().unwrap().split_whitespace().collect::<Vec<_>>(), ["1", "C", "1"]);
        assert_eq!(
            lines.next().unwrap().split_whitespace().collect::<Vec<_>>(),
            ["2", "C", "1", "1", "1.54000"]
        );
    }

    #[test]
    fn split_atom_lines_are_rejoined() {
        let text = "     4  split\n     1  C      1\n     2  C      1     1   1.54000\n     3  C      1     2   1.54000     1  109.5000\n     4  C      1     3   1.54000\n     2  109.5000     1   60.0000     0\n";
        let z = read_int(&mut Cursor::new(text)).unwrap();
        assert_eq!(z.len(), 4);
        assert_eq!(z.atoms[3].angle_ref, Some(1));
        assert!((z.atoms[3].torsion - 60.0).abs() < 1e-9);
    }

    #[test]
    fn rejoin_is_a_no_op_when_counts_match() {
        let lines = vec!["1 C 1".to_string(), "2 C 1 1 1.5".to_string()];
        assert_eq!(rejoin_split_lines(&lines, 2), lines);
    }

    #[test]
    fn wrong_atom_count_is_rejected() {
        let text = "     3  short\n     1  C      1\n     2  C      1     1   1.54000\n";
        assert!(matches!(
            read_int(&mut Cursor::new(text)),
            Err(TinkerFileError::AtomCountMismatch {
                declared: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn malformed_numbers_are_parse_errors() {
        let text = "     2  bad\n     1  C      1\n     2  C      1     1   abc\n";
        assert!(matches!(
            read_int(&mut Cursor::new(text)),
            Err(TinkerFileError::Parse { .. })
        ));
    }

    #[test]
    fn cycle_outputs_are_numbered_with_three_digits() {
        assert_eq!(
            cycle_output_path(Path::new("/tmp/mol_3"), 7),
            PathBuf::from("/tmp/mol_3.007")
        );
        let log = "Final Function Value and Deformation\n...\nFinal Function Value and Deformation\n";
        assert_eq!(count_cycles(log, "Final Function Value and Deformation"), 2);
        assert_eq!(count_cycles(log, ""), 0);
    }

    #[test]
    fn key_file_lists_attractor_pairs() {
        let key = KeyFile {
            parameters: PathBuf::from("/ff/uff_rc.prm"),
            keywords: vec!["MAXITER 100".into()],
            attractor_pairs: vec![(3, 8)],
            attraction_strength: 5.0,
            overlap_distance: 0.0,
        };
        let mut out = Vec::new();
        key.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("PARAMETERS        /ff/uff_rc.prm\nMAXITER 100\n"));
        assert!(text.contains("RC-PAIR                4     9"));
        assert!(text.contains("RC-ATTRACTION     5.0000"));
    }

    #[test]
    fn submit_file_lists_rotatable_bonds() {
        let submit = SubmitFile {
            int_file: PathBuf::from("mol_0.int"),
            rotatable_bonds: vec![(0, 1), (4, 5)],
            search_directions: 25,
            rms_gradient: 0.01,
        };
        let mut out = Vec::new();
        submit.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "mol_0.int\nN\n     1     2\n     5     6\n\n25\n0.01\n"
        );
    }
}
