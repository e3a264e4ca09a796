//! A small selection language for the in-memory viewer
//!
//! Terms are joined with `and`: `all`, `none`, `chain A`, `resn HOH`,
//! `resi 10`, `resi 10-20`, `name CA`.

use super::pdb::Atom;
use crate::error::{ViewerError, ViewerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    All,
    None,
    Chain(String),
    ResidueName(String),
    ResidueRange(i32, i32),
    AtomName(String),
}

impl Term {
    fn matches(&self, atom: &Atom) -> bool {
        match self {
            Term::All => true,
            Term::None => false,
            Term::Chain(chain) => atom.chain_id.eq_ignore_ascii_case(chain),
            Term::ResidueName(name) => atom.res_name.eq_ignore_ascii_case(name),
            Term::ResidueRange(first, last) => (*first..=*last).contains(&atom.res_seq),
            Term::AtomName(name) => atom.name.eq_ignore_ascii_case(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression(Vec<Term>);

fn unsupported(expression: &str) -> ViewerError {
    ViewerError::Unsupported(format!("selection expression {expression:?}"))
}

fn parse_residue(text: &str, expression: &str) -> ViewerResult<i32> {
    text.parse().map_err(|_| unsupported(expression))
}

impl Expression {
    pub fn parse(expression: &str) -> ViewerResult<Self> {
        let mut terms = Vec::new();
        let mut words = expression.split_whitespace().peekable();

        while let Some(word) = words.next() {
            let term = match word.to_ascii_lowercase().as_str() {
                "all" | "*" => Term::All,
                "none" => Term::None,
                keyword @ ("chain" | "resn" | "resi" | "name") => {
                    let value = words.next().ok_or_else(|| unsupported(expression))?;
                    match keyword {
                        "chain" => Term::Chain(value.to_string()),
                        "resn" => Term::ResidueName(value.to_string()),
                        "name" => Term::AtomName(value.to_string()),
                        _ => match value.split_once('-') {
                            Some((first, last)) => Term::ResidueRange(
                                parse_residue(first, expression)?,
                                parse_residue(last, expression)?,
                            ),
                            None => {
                                let residue = parse_residue(value, expression)?;
                                Term::ResidueRange(residue, residue)
                            }
                        },
                    }
                }
                _ => return Err(unsupported(expression)),
            };
            terms.push(term);

            match words.next() {
                None => break,
                Some(joiner) if joiner.eq_ignore_ascii_case("and") && words.peek().is_some() => {}
                Some(_) => return Err(unsupported(expression)),
            }
        }

        if terms.is_empty() {
            return Err(unsupported(expression));
        }
        Ok(Self(terms))
    }

    pub fn matches(&self, atom: &Atom) -> bool {
        self.0.iter().all(|term| term.matches(atom))
    }
}
