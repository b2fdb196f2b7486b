//! SoundFont registry and the preset interface used by the dispatch core.
//!
//! File parsing lives elsewhere; loaders hand in anything implementing
//! [`SoundFont`]. The registry keeps the fonts, a newest-first search order
//! and a per-font bank offset.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use smallvec::SmallVec;

use crate::{Error, Result};

/// Opaque instrument zone identifier handed to the voice pool.
pub type ZoneId = u32;

/// Zones returned for one key/velocity; most presets layer a few at most.
pub type ZoneList = SmallVec<[ZoneId; 4]>;

/// A playable preset.
pub trait Preset: Send + Sync {
    fn name(&self) -> &str;
    fn bank(&self) -> u32;
    fn program(&self) -> u8;
    /// Instrument zones sounding for `key` at `velocity`.
    fn zones(&self, key: u8, velocity: u8) -> ZoneList;
}

/// A loaded SoundFont.
///
/// Presets returned by [`SoundFont::preset`] should be owned by the font:
/// channels keep only weak references, so a preset whose font is removed
/// stops sounding.
pub trait SoundFont: Send + Sync {
    fn name(&self) -> &str;
    fn preset(&self, bank: u32, program: u8) -> Option<Arc<dyn Preset>>;
}

/// Handle to a registered SoundFont.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundFontId(usize);

impl SoundFontId {
    pub fn id(&self) -> usize {
        self.0
    }
}

struct Loaded {
    font: Arc<dyn SoundFont>,
    bank_offset: i32,
}

/// SoundFont registry with lock-free search order.
pub struct SoundFontRegistry {
    fonts: DashMap<SoundFontId, Loaded>,
    /// Newest first.
    order: ArcSwap<Vec<SoundFontId>>,
    next_id: AtomicUsize,
}

impl Default for SoundFontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundFontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: DashMap::new(),
            order: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Register a font at the front of the search order.
    pub fn add(&self, font: Arc<dyn SoundFont>) -> SoundFontId {
        let id = SoundFontId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.fonts.insert(
            id,
            Loaded {
                font,
                bank_offset: 0,
            },
        );
        self.order.rcu(|order| {
            let mut next = Vec::with_capacity(order.len() + 1);
            next.push(id);
            next.extend(order.iter().copied());
            next
        });
        id
    }

    pub fn remove(&self, id: SoundFontId) -> Result<Arc<dyn SoundFont>> {
        let (_, loaded) = self
            .fonts
            .remove(&id)
            .ok_or_else(|| Error::not_found(format!("soundfont {}", id.0)))?;
        self.order.rcu(|order| {
            order
                .iter()
                .copied()
                .filter(|&other| other != id)
                .collect::<Vec<_>>()
        });
        Ok(loaded.font)
    }

    pub fn get(&self, id: SoundFontId) -> Option<Arc<dyn SoundFont>> {
        self.fonts.get(&id).map(|entry| Arc::clone(&entry.font))
    }

    pub fn count(&self) -> usize {
        self.fonts.len()
    }

    /// Search order, newest first.
    pub fn order(&self) -> Vec<SoundFontId> {
        self.order.load().as_ref().clone()
    }

    pub fn set_bank_offset(&self, id: SoundFontId, offset: i32) -> Result<()> {
        let mut entry = self
            .fonts
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("soundfont {}", id.0)))?;
        entry.bank_offset = offset;
        Ok(())
    }

    pub fn bank_offset(&self, id: SoundFontId) -> Option<i32> {
        self.fonts.get(&id).map(|entry| entry.bank_offset)
    }

    /// Find a preset in `id`, or in every font in search order when `None`.
    ///
    /// The font's bank offset is subtracted from `bank` before asking it.
    pub fn resolve(
        &self,
        id: Option<SoundFontId>,
        bank: u32,
        program: u8,
    ) -> Option<(SoundFontId, Arc<dyn Preset>)> {
        let lookup = |id: SoundFontId| {
            let entry = self.fonts.get(&id)?;
            let local = i64::from(bank) - i64::from(entry.bank_offset);
            let local = u32::try_from(local).ok()?;
            entry.font.preset(local, program).map(|p| (id, p))
        };
        match id {
            Some(id) => lookup(id),
            None => self.order.load().iter().find_map(|&id| lookup(id)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct TestPreset {
        pub name: String,
        pub bank: u32,
        pub program: u8,
    }

    impl Preset for TestPreset {
        fn name(&self) -> &str {
            &self.name
        }
        fn bank(&self) -> u32 {
            self.bank
        }
        fn program(&self) -> u8 {
            self.program
        }
        fn zones(&self, _key: u8, _velocity: u8) -> ZoneList {
            SmallVec::from_slice(&[self.program as ZoneId])
        }
    }

    /// Font holding the given (bank, program) presets.
    pub(crate) struct TestFont {
        pub name: String,
        pub presets: Vec<Arc<dyn Preset>>,
    }

    impl TestFont {
        pub(crate) fn new(name: &str, presets: &[(u32, u8)]) -> Self {
            Self {
                name: name.to_string(),
                presets: presets
                    .iter()
                    .map(|&(bank, program)| {
                        Arc::new(TestPreset {
                            name: format!("{name} {bank}:{program}"),
                            bank,
                            program,
                        }) as Arc<dyn Preset>
                    })
                    .collect(),
            }
        }
    }

    impl SoundFont for TestFont {
        fn name(&self) -> &str {
            &self.name
        }
        fn preset(&self, bank: u32, program: u8) -> Option<Arc<dyn Preset>> {
            self.presets
                .iter()
                .find(|p| p.bank() == bank && p.program() == program)
                .cloned()
        }
    }

    #[test]
    fn test_newest_font_wins() {
        let registry = SoundFontRegistry::new();
        let a = registry.add(Arc::new(TestFont::new("a", &[(0, 0), (0, 1)])));
        let b = registry.add(Arc::new(TestFont::new("b", &[(0, 0)])));
        assert_eq!(registry.order(), vec![b, a]);

        let (id, preset) = registry.resolve(None, 0, 0).unwrap();
        assert_eq!(id, b);
        assert_eq!(preset.name(), "b 0:0");

        let (id, _) = registry.resolve(None, 0, 1).unwrap();
        assert_eq!(id, a);
        assert!(registry.resolve(Some(b), 0, 1).is_none());
    }

    #[test]
    fn test_bank_offset() {
        let registry = SoundFontRegistry::new();
        let id = registry.add(Arc::new(TestFont::new("a", &[(0, 3)])));
        registry.set_bank_offset(id, 2).unwrap();
        assert!(registry.resolve(None, 0, 3).is_none());
        assert!(registry.resolve(None, 2, 3).is_some());
        assert_eq!(registry.bank_offset(id), Some(2));
    }

    #[test]
    fn test_remove() {
        let registry = SoundFontRegistry::new();
        let id = registry.add(Arc::new(TestFont::new("a", &[(0, 0)])));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.remove(id).unwrap().name(), "a");
        assert!(registry.order().is_empty());
        assert!(matches!(registry.remove(id), Err(Error::NotFound(_))));
    }
}
