//! Minimal PDB coordinate reader
//!
//! Only `ATOM`/`HETATM` records of the first model are read. Columns follow the
//! fixed-width PDB layout.

use crate::error::{ViewerError, ViewerResult};
use crate::types::AtomRecord;

const WATER_NAMES: [&str; 3] = ["HOH", "WAT", "DOD"];

/// Which default component an atom belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomGroup {
    Polymer,
    Ligand,
    Water,
}

impl AtomGroup {
    pub fn key(self) -> &'static str {
        match self {
            AtomGroup::Polymer => "polymer",
            AtomGroup::Ligand => "ligand",
            AtomGroup::Water => "water",
        }
    }

    /// Style of the representation the default preset gives this group
    pub fn default_style(self) -> &'static str {
        match self {
            AtomGroup::Polymer => "cartoon",
            AtomGroup::Ligand | AtomGroup::Water => "ball-and-stick",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub hetero: bool,
    pub serial: i64,
    pub name: String,
    pub alt_loc: String,
    pub res_name: String,
    pub chain_id: String,
    pub res_seq: i32,
    pub position: [f32; 3],
}

impl Atom {
    pub fn group(&self) -> AtomGroup {
        if !self.hetero {
            AtomGroup::Polymer
        } else if WATER_NAMES.contains(&self.res_name.as_str()) {
            AtomGroup::Water
        } else {
            AtomGroup::Ligand
        }
    }

    pub fn record(&self) -> AtomRecord {
        AtomRecord {
            auth_asym_id: self.chain_id.clone(),
            label_asym_id: self.chain_id.clone(),
            auth_comp_id: self.res_name.clone(),
            label_comp_id: self.res_name.clone(),
            auth_seq_id: self.res_seq,
            label_seq_id: self.res_seq,
            auth_atom_id: self.name.clone(),
            label_atom_id: self.name.clone(),
            label_alt_id: self.alt_loc.clone(),
            id: self.serial,
        }
    }
}

/// Columns `start..=end`, 1-based, trimmed. Short lines yield an empty field.
fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start - 1..end).map_or("", str::trim)
}

fn number<T: std::str::FromStr>(line: &str, row: usize, what: &str, start: usize, end: usize) -> ViewerResult<T> {
    let text = column(line, start, end);
    text.parse()
        .map_err(|_| ViewerError::Load(format!("line {row}: invalid {what} {text:?}")))
}

pub fn parse(text: &str) -> ViewerResult<Vec<Atom>> {
    let mut atoms = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let row = index + 1;
        if line.starts_with("ENDMDL") {
            break;
        }
        let hetero = line.starts_with("HETATM");
        if !hetero && !line.starts_with("ATOM") {
            continue;
        }

        atoms.push(Atom {
            hetero,
            serial: number(line, row, "serial", 7, 11)?,
            name: column(line, 13, 16).to_string(),
            alt_loc: column(line, 17, 17).to_string(),
            res_name: column(line, 18, 20).to_string(),
            chain_id: column(line, 22, 22).to_string(),
            res_seq: number(line, row, "residue number", 23, 26)?,
            position: [
                number(line, row, "x coordinate", 31, 38)?,
                number(line, row, "y coordinate", 39, 46)?,
                number(line, row, "z coordinate", 47, 54)?,
            ],
        });
    }

    if atoms.is_empty() {
        return Err(ViewerError::Load("no ATOM or HETATM records".to_string()));
    }
    Ok(atoms)
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = "\
HEADER    PLANT PROTEIN                           30-APR-81   1CRN
ATOM      1  N   THR A   1      17.047  14.099   3.625  1.00 13.79           N
ATOM      2  CA  THR A   1      16.967  12.784   4.338  1.00 10.80           C
ATOM      3  C   THR A   2      15.685  12.755   5.133  1.00  9.19           C
ATOM      4  N   ALA B   1      10.000  10.000  10.000  1.00  9.19           N
HETATM    5  C1  LIG B 101      11.000  11.000  11.000  1.00 20.00           C
HETATM    6  O   HOH B 201      12.000  12.000  12.000  1.00 30.00           O
END
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_atoms_and_groups() {
        let atoms = parse(SAMPLE).unwrap();
        assert_eq!(atoms.len(), 6);

        let first = &atoms[0];
        assert_eq!(first.serial, 1);
        assert_eq!(first.name, "N");
        assert_eq!(first.res_name, "THR");
        assert_eq!(first.chain_id, "A");
        assert_eq!(first.res_seq, 1);
        assert_eq!(first.position, [17.047, 14.099, 3.625]);

        let groups: Vec<_> = atoms.iter().map(Atom::group).collect();
        assert_eq!(
            groups,
            [
                AtomGroup::Polymer,
                AtomGroup::Polymer,
                AtomGroup::Polymer,
                AtomGroup::Polymer,
                AtomGroup::Ligand,
                AtomGroup::Water,
            ]
        );
    }

    #[test]
    fn record_mirrors_auth_and_label_fields() {
        let atoms = parse(SAMPLE).unwrap();
        let record = atoms[4].record();
        assert_eq!(record.auth_comp_id, "LIG");
        assert_eq!(record.label_comp_id, "LIG");
        assert_eq!(record.auth_seq_id, 101);
        assert_eq!(record.label_alt_id, "");
        assert_eq!(record.id, 5);
    }

    #[test]
    fn stops_after_first_model() {
        let text = format!("{}ENDMDL\n{}", &SAMPLE[..SAMPLE.find("ATOM      4").unwrap()], SAMPLE);
        assert_eq!(parse(&text).unwrap().len(), 3);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse("HEADER only\n"), Err(ViewerError::Load(_))));
        let bad = "ATOM      x  N   THR A   1      17.047  14.099   3.625";
        let err = parse(bad).unwrap_err();
        assert_eq!(err, ViewerError::Load("line 1: invalid serial \"x\"".to_string()));
    }
}
