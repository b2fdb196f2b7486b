//! Monophonic note-priority list.
//!
//! A fixed-capacity doubly linked list embedded in an array, one per channel.
//! Holds the keys currently pressed while a channel plays mono or legato,
//! oldest at `first`, most recent at `last`. When full, inserting evicts the
//! oldest entry.
//!
//! All methods are RT-safe (no allocations).

/// Number of notes a list can hold.
pub const MONO_LIST_CAPACITY: usize = 10;

/// Sentinel for "no note" and for empty links.
pub const INVALID_NOTE: u8 = 255;

const NIL: u8 = INVALID_NOTE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    note: u8,
    velocity: u8,
    prev: u8,
    next: u8,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            note: INVALID_NOTE,
            velocity: 0,
            prev: NIL,
            next: NIL,
        }
    }
}

/// A note held in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldNote {
    pub note: u8,
    pub velocity: u8,
}

/// What [`MonoList::push`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pushed {
    /// Note that was last before the insertion, if the list was non-empty.
    pub previous: Option<u8>,
    /// Oldest note dropped to make room.
    pub evicted: Option<u8>,
}

/// What [`MonoList::remove`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removed {
    /// The removed note was the most recent one (the sounding note).
    pub was_last: bool,
    /// Most recent note still held after the removal.
    pub new_last: Option<HeldNote>,
}

/// Fixed-capacity note history for monophonic play.
#[derive(Debug, Clone)]
pub struct MonoList {
    entries: [Entry; MONO_LIST_CAPACITY],
    first: u8,
    last: u8,
    /// Head of the chain of unused entries, linked through `next`.
    free: u8,
    count: u8,
    previous_note: u8,
}

impl Default for MonoList {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoList {
    pub fn new() -> Self {
        let mut list = Self {
            entries: [Entry::default(); MONO_LIST_CAPACITY],
            first: NIL,
            last: NIL,
            free: 0,
            count: 0,
            previous_note: INVALID_NOTE,
        };
        list.reset();
        list
    }

    /// Empty the list and clear `previous_note`.
    pub fn reset(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            *entry = Entry {
                next: if i + 1 < MONO_LIST_CAPACITY {
                    (i + 1) as u8
                } else {
                    NIL
                },
                ..Entry::default()
            };
        }
        self.first = NIL;
        self.last = NIL;
        self.free = 0;
        self.count = 0;
        self.previous_note = INVALID_NOTE;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count as usize == MONO_LIST_CAPACITY
    }

    /// Most recently added note (the one that should be sounding).
    pub fn last(&self) -> Option<HeldNote> {
        self.held(self.last)
    }

    /// Oldest note in the list.
    pub fn first(&self) -> Option<HeldNote> {
        self.held(self.first)
    }

    /// Note that was last before the most recent insertion.
    #[inline]
    pub fn previous_note(&self) -> Option<u8> {
        valid(self.previous_note)
    }

    pub fn set_previous_note(&mut self, note: Option<u8>) {
        self.previous_note = note.unwrap_or(INVALID_NOTE);
    }

    pub fn contains(&self, note: u8) -> bool {
        self.find(note).is_some()
    }

    /// Iterate from oldest to most recent.
    pub fn iter(&self) -> impl Iterator<Item = HeldNote> + '_ {
        let mut cursor = self.first;
        std::iter::from_fn(move || {
            let held = self.held(cursor)?;
            cursor = self.entries[cursor as usize].next;
            Some(held)
        })
    }

    /// Append a note at `last`.
    ///
    /// A note already in the list is moved rather than duplicated. When the
    /// list is full the oldest entry is evicted first.
    pub fn push(&mut self, note: u8, velocity: u8) -> Pushed {
        if let Some(index) = self.find(note) {
            self.unlink(index);
        }

        let evicted = if self.is_full() {
            let oldest = self.first;
            let note = self.entries[oldest as usize].note;
            self.unlink(oldest);
            Some(note)
        } else {
            None
        };

        let previous = self.last().map(|held| held.note);
        self.previous_note = previous.unwrap_or(INVALID_NOTE);

        let index = self.free;
        self.free = self.entries[index as usize].next;
        self.entries[index as usize] = Entry {
            note,
            velocity,
            prev: self.last,
            next: NIL,
        };
        if self.last == NIL {
            self.first = index;
        } else {
            self.entries[self.last as usize].next = index;
        }
        self.last = index;
        self.count += 1;

        Pushed { previous, evicted }
    }

    /// Remove `note` if present.
    ///
    /// Removing the final entry clears `previous_note`.
    pub fn remove(&mut self, note: u8) -> Option<Removed> {
        let index = self.find(note)?;
        let was_last = index == self.last;
        self.unlink(index);
        if self.is_empty() {
            self.previous_note = INVALID_NOTE;
        }
        Some(Removed {
            was_last,
            new_last: self.last(),
        })
    }

    /// Drop everything except the most recent note.
    pub fn keep_last_only(&mut self) {
        while self.count > 1 {
            self.unlink(self.first);
        }
    }

    fn held(&self, index: u8) -> Option<HeldNote> {
        if index == NIL {
            return None;
        }
        let entry = &self.entries[index as usize];
        Some(HeldNote {
            note: entry.note,
            velocity: entry.velocity,
        })
    }

    fn find(&self, note: u8) -> Option<u8> {
        let mut cursor = self.first;
        while cursor != NIL {
            let entry = &self.entries[cursor as usize];
            if entry.note == note {
                return Some(cursor);
            }
            cursor = entry.next;
        }
        None
    }

    fn unlink(&mut self, index: u8) {
        let Entry { prev, next, .. } = self.entries[index as usize];
        if prev == NIL {
            self.first = next;
        } else {
            self.entries[prev as usize].next = next;
        }
        if next == NIL {
            self.last = prev;
        } else {
            self.entries[next as usize].prev = prev;
        }
        self.entries[index as usize] = Entry {
            next: self.free,
            ..Entry::default()
        };
        self.free = index;
        self.count -= 1;
    }
}

#[inline]
fn valid(note: u8) -> Option<u8> {
    (note != INVALID_NOTE).then_some(note)
}
