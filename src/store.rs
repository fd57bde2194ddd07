//! Persisted strategy tables.
//!
//! The binary form is primary: a length-prefixed key followed by
//! `(action tag, f64 probability)` pairs per record. The text form is the
//! legacy trainer's line format, kept for backward compatibility:
//!
//! ```text
//! SAHA|H2C2D2|cc/r50c//, defaultdict(<class 'int'>, {'c': 0.25, 0.5: 0.75})
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use regex::Regex;

use crate::abstraction::{AbstractAction, POT_FRACTIONS};
use crate::error::{Error, Result};
use crate::infoset::InfoSetKey;

const PROB_TOLERANCE: f64 = 1e-6;

type Record = Vec<(AbstractAction, f64)>;

/// Averaged policies keyed by info-set key. Load order never matters:
/// records live in a sorted map and keys are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyStore {
    records: BTreeMap<InfoSetKey, Record>,
}

fn bad_data(message: String) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, message))
}

fn validate(key: &InfoSetKey, record: &Record) -> Result<()> {
    let mut total = 0.0;
    for &(_, prob) in record {
        if !(0.0..=1.0 + PROB_TOLERANCE).contains(&prob) {
            return Err(bad_data(format!("probability {} out of range at {}", prob, key)));
        }
        total += prob;
    }
    if (total - 1.0).abs() > PROB_TOLERANCE {
        return Err(bad_data(format!("probabilities sum to {} at {}", total, key)));
    }
    Ok(())
}

impl StrategyStore {
    pub fn new() -> StrategyStore {
        StrategyStore::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &InfoSetKey) -> Option<&[(AbstractAction, f64)]> {
        self.records.get(key).map(|r| r.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InfoSetKey, &[(AbstractAction, f64)])> + '_ {
        self.records.iter().map(|(k, r)| (k, r.as_slice()))
    }

    pub fn insert(&mut self, key: InfoSetKey, record: Record) -> Result<()> {
        validate(&key, &record)?;
        if self.records.insert(key.clone(), record).is_some() {
            return Err(bad_data(format!("duplicate info-set key {}", key)));
        }
        Ok(())
    }

    /// Binary schema: every record is the key's bytes (length-prefixed)
    /// and the `(tag, probability)` pairs in action order.
    pub fn save_binary(&self, path: &Path) -> Result<()> {
        let rows: Vec<(&[u8], Vec<(u8, f64)>)> = self
            .records
            .iter()
            .map(|(key, record)| {
                let pairs = record.iter().map(|&(a, p)| (a.tag(), p)).collect();
                (key.as_bytes(), pairs)
            })
            .collect();
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), &rows)?;
        Ok(())
    }

    pub fn load_binary(path: &Path) -> Result<StrategyStore> {
        let file = File::open(path)?;
        let rows: Vec<(Vec<u8>, Vec<(u8, f64)>)> =
            bincode::deserialize_from(BufReader::new(file))?;
        let mut store = StrategyStore::new();
        for (bytes, pairs) in rows {
            let raw = String::from_utf8(bytes)
                .map_err(|e| bad_data(format!("bad key bytes: {}", e)))?;
            let mut record = Record::with_capacity(pairs.len());
            for (tag, prob) in pairs {
                record.push((AbstractAction::from_tag(tag)?, prob));
            }
            store.insert(InfoSetKey::from(raw), record)?;
        }
        Ok(store)
    }

    /// Legacy text schema, one record per line, sorted by key.
    pub fn save_text(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        for (key, record) in &self.records {
            let entries: Vec<String> = record
                .iter()
                .map(|(action, prob)| match action.fraction() {
                    Some(fraction) => format!("{:?}: {:?}", fraction, prob),
                    None => format!("'{}': {:?}", action, prob),
                })
                .collect();
            writeln!(
                out,
                "{}, defaultdict(<class 'int'>, {{{}}})",
                key,
                entries.join(", ")
            )?;
        }
        Ok(())
    }

    pub fn load_text(path: &Path) -> Result<StrategyStore> {
        let line_re =
            Regex::new(r"^(?P<key>[^,]+), defaultdict\(<class 'int'>, \{(?P<map>.*)\}\)$").unwrap();
        let entry_re = Regex::new(
            r"(?:'(?P<sym>[fca])'|(?P<frac>[0-9]+(?:\.[0-9]+)?)): (?P<prob>[0-9.eE+-]+)",
        )
        .unwrap();

        let file = File::open(path)?;
        let mut store = StrategyStore::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let captures = line_re
                .captures(&line)
                .ok_or_else(|| bad_data(format!("malformed record on line {}", number + 1)))?;
            let key = InfoSetKey::from(captures["key"].to_string());
            let mut record = Record::new();
            for entry in entry_re.captures_iter(&captures["map"]) {
                let action = match (entry.name("sym"), entry.name("frac")) {
                    (Some(sym), _) => match sym.as_str() {
                        "f" => AbstractAction::Fold,
                        "c" => AbstractAction::Call,
                        _ => AbstractAction::AllIn,
                    },
                    (None, Some(frac)) => {
                        let value: f64 = frac
                            .as_str()
                            .parse()
                            .map_err(|e| bad_data(format!("bad fraction: {}", e)))?;
                        let index = POT_FRACTIONS
                            .iter()
                            .position(|&f| f == value)
                            .ok_or_else(|| bad_data(format!("unknown pot fraction {}", value)))?;
                        AbstractAction::PotFraction(index as u8)
                    }
                    _ => return Err(bad_data(format!("bad entry on line {}", number + 1))),
                };
                let prob: f64 = entry["prob"]
                    .parse()
                    .map_err(|e| bad_data(format!("bad probability: {}", e)))?;
                record.push((action, prob));
            }
            if record.is_empty() {
                return Err(bad_data(format!("empty record on line {}", number + 1)));
            }
            store.insert(key, record)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> InfoSetKey {
        InfoSetKey::from(raw.to_string())
    }

    fn sample() -> StrategyStore {
        let mut store = StrategyStore::new();
        store
            .insert(
                key("SAHA|H2C2D2|cc/r50c//"),
                vec![
                    (AbstractAction::Fold, 0.125),
                    (AbstractAction::Call, 0.5),
                    (AbstractAction::PotFraction(1), 0.25),
                    (AbstractAction::AllIn, 0.125),
                ],
            )
            .unwrap();
        store
            .insert(
                key("H8H9||c//"),
                vec![
                    (AbstractAction::Call, 1.0 / 3.0),
                    (AbstractAction::PotFraction(6), 2.0 / 3.0),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn insert_validates_the_distribution() {
        let mut store = StrategyStore::new();
        assert!(store
            .insert(key("x"), vec![(AbstractAction::Call, 0.5)])
            .is_err());
        assert!(store
            .insert(key("x"), vec![(AbstractAction::Call, 1.0)])
            .is_ok());
        // Keys stay unique.
        assert!(store
            .insert(key("x"), vec![(AbstractAction::Call, 1.0)])
            .is_err());
    }

    #[test]
    fn binary_round_trips() {
        let dir = std::env::temp_dir();
        let path = dir.join("cfrbot_test_store.bin");
        let store = sample();
        store.save_binary(&path).unwrap();
        let loaded = StrategyStore::load_binary(&path).unwrap();
        assert_eq!(store, loaded);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn text_round_trips_byte_for_byte() {
        let dir = std::env::temp_dir();
        let a = dir.join("cfrbot_test_store_a.txt");
        let b = dir.join("cfrbot_test_store_b.txt");
        let store = sample();
        store.save_text(&a).unwrap();
        let loaded = StrategyStore::load_text(&a).unwrap();
        assert_eq!(store, loaded);
        loaded.save_text(&b).unwrap();
        assert_eq!(
            std::fs::read(&a).unwrap(),
            std::fs::read(&b).unwrap()
        );
        std::fs::remove_file(&a).ok();
        std::fs::remove_file(&b).ok();
    }

    #[test]
    fn text_form_matches_the_legacy_grammar() {
        let dir = std::env::temp_dir();
        let path = dir.join("cfrbot_test_store_grammar.txt");
        let store = sample();
        store.save_text(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            "H8H9||c//, defaultdict(<class 'int'>, {'c': 0.3333333333333333, 3.0: 0.6666666666666666})"
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_text_is_rejected() {
        let dir = std::env::temp_dir();
        let path = dir.join("cfrbot_test_store_bad.txt");
        std::fs::write(&path, "not a record\n").unwrap();
        assert!(StrategyStore::load_text(&path).is_err());
        std::fs::write(&path, "k, defaultdict(<class 'int'>, {'c': 0.4})\n").unwrap();
        assert!(StrategyStore::load_text(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}
