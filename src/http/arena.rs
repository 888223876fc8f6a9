//! Fixed-capacity storage for request header strings.
//!
//! Header names and values are written into one preallocated region instead
//! of one allocation per string. Each string is followed by one separator
//! byte, and the total retained header text never exceeds the arena
//! capacity. Once the region is full, further bytes are discarded and the
//! arena reports itself exhausted; it never grows.

/// Location of one string inside a [`HeaderArena`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStr {
    start: usize,
    len: usize,
}

impl ArenaStr {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug)]
pub struct HeaderArena {
    bytes: Box<[u8]>,
    offset: usize,
    exhausted: bool,
}

impl HeaderArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
            exhausted: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes consumed so far, separators included.
    pub fn used(&self) -> usize {
        self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Begins a new string at the current write position.
    ///
    /// Returns `None` (and marks the arena exhausted) when not even an empty
    /// terminated string fits any more.
    pub fn start(&mut self) -> Option<ArenaStr> {
        if self.offset == 0 {
            return Some(ArenaStr { start: 0, len: 0 });
        }
        if self.offset + 1 >= self.capacity() {
            self.exhausted = true;
            return None;
        }
        // skip the terminator of the previous string
        self.offset += 1;
        Some(ArenaStr {
            start: self.offset,
            len: 0,
        })
    }

    /// Appends one byte to `s`, which must be the most recently started string.
    ///
    /// Returns `false` when the byte was dropped because the arena is full.
    pub fn push(&mut self, s: &mut ArenaStr, byte: u8) -> bool {
        // the last byte of the region is reserved for the final terminator
        if self.offset + 1 >= self.capacity() {
            self.exhausted = true;
            return false;
        }
        debug_assert_eq!(s.start + s.len, self.offset);
        self.bytes[self.offset] = byte;
        self.offset += 1;
        s.len += 1;
        true
    }

    pub fn get(&self, s: ArenaStr) -> &[u8] {
        &self.bytes[s.start..s.start + s.len]
    }
}
