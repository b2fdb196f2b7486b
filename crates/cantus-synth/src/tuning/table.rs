//! Registry of tunings keyed by (bank, program).

use std::sync::Arc;

use dashmap::DashMap;

use super::Tuning;
use crate::{Error, Result};

/// Tuning identifier: (bank, program), each 0-127.
pub type TuningId = (u8, u8);

pub(crate) fn check_id(bank: u8, program: u8) -> Result<()> {
    if bank > 127 || program > 127 {
        return Err(Error::invalid(format!(
            "tuning bank {bank} / program {program} (expected 0-127)"
        )));
    }
    Ok(())
}

/// Shared tuning table.
///
/// Entries are immutable once inserted. Changing a tuning inserts a new
/// `Arc`; channels holding the old one keep it until rebound.
#[derive(Debug, Default)]
pub struct TuningTable {
    tunings: DashMap<TuningId, Arc<Tuning>>,
}

impl TuningTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the new entry and the replaced one.
    pub fn insert(
        &self,
        bank: u8,
        program: u8,
        tuning: Tuning,
    ) -> Result<(Arc<Tuning>, Option<Arc<Tuning>>)> {
        check_id(bank, program)?;
        let tuning = Arc::new(tuning);
        let old = self.tunings.insert((bank, program), Arc::clone(&tuning));
        Ok((tuning, old))
    }

    /// Copy-on-write update of an existing entry.
    pub fn update(
        &self,
        bank: u8,
        program: u8,
        f: impl FnOnce(&mut Tuning),
    ) -> Result<(Arc<Tuning>, Arc<Tuning>)> {
        check_id(bank, program)?;
        let mut entry = self
            .tunings
            .get_mut(&(bank, program))
            .ok_or_else(|| Error::not_found(format!("tuning {bank}/{program}")))?;
        let old = Arc::clone(entry.value());
        let mut tuning = (*old).clone();
        f(&mut tuning);
        let tuning = Arc::new(tuning);
        *entry.value_mut() = Arc::clone(&tuning);
        Ok((tuning, old))
    }

    pub fn get(&self, bank: u8, program: u8) -> Option<Arc<Tuning>> {
        self.tunings
            .get(&(bank, program))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn lookup(&self, bank: u8, program: u8) -> Result<Arc<Tuning>> {
        check_id(bank, program)?;
        self.get(bank, program)
            .ok_or_else(|| Error::not_found(format!("tuning {bank}/{program}")))
    }

    pub fn remove(&self, bank: u8, program: u8) -> Option<Arc<Tuning>> {
        self.tunings.remove(&(bank, program)).map(|(_, t)| t)
    }

    /// Snapshot of registered ids in (bank, program) order.
    ///
    /// Later insertions or removals do not affect a returned iterator.
    pub fn ids(&self) -> std::vec::IntoIter<TuningId> {
        let mut ids: Vec<TuningId> = self.tunings.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids.into_iter()
    }

    pub fn len(&self) -> usize {
        self.tunings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_insert_and_lookup() {
        let table = TuningTable::new();
        let (_, old) = table.insert(0, 1, Tuning::pythagorean()).unwrap();
        assert!(old.is_none());
        let (_, old) = table.insert(0, 1, Tuning::meantone()).unwrap();
        assert_eq!(old.map(|t| t.name().to_string()), Some("Pythagorean".into()));
        assert_eq!(table.lookup(0, 1).unwrap().name(), "Meantone");
        assert!(matches!(table.lookup(0, 2), Err(Error::NotFound(_))));
        assert!(matches!(
            table.insert(128, 0, Tuning::default()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_update_is_copy_on_write() {
        let table = TuningTable::new();
        let (first, _) = table.insert(1, 1, Tuning::equal_temperament()).unwrap();
        let (new, old) = table.update(1, 1, |t| t.set_pitch(60, 6050.0)).unwrap();
        assert!(Arc::ptr_eq(&first, &old));
        assert_relative_eq!(first.pitch(60), 6000.0);
        assert_relative_eq!(new.pitch(60), 6050.0);
        assert!(table.update(1, 2, |_| {}).is_err());
    }

    #[test]
    fn test_ids_snapshot() {
        let table = TuningTable::new();
        table.insert(2, 0, Tuning::default()).unwrap();
        table.insert(0, 5, Tuning::default()).unwrap();
        table.insert(0, 1, Tuning::default()).unwrap();

        let mut ids = table.ids();
        assert_eq!(ids.next(), Some((0, 1)));
        table.insert(0, 0, Tuning::default()).unwrap();
        table.remove(2, 0);
        assert_eq!(ids.collect::<Vec<_>>(), vec![(0, 5), (2, 0)]);
        assert_eq!(table.ids().count(), 3);
    }
}
