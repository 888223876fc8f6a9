//! Growable byte buffer used for request bodies and dynamically built responses.
//!
//! The buffer grows in powers of two starting at 256 bytes, so building a body
//! one character at a time only reallocates a logarithmic number of times.
//! Capacity is either zero (nothing allocated) or strictly greater than the
//! length: one byte is always kept free for a terminating sentinel, which lets
//! the contents be handed out as a bounded string as well as a byte range.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Smallest allocation the buffer will ever make.
pub const MIN_ALLOCATION: usize = 256;

/// Observes allocation activity of [`GrowableBuffer`]s.
///
/// Purely advisory; implementations must not influence buffer behaviour.
pub trait BufferObserver: Send + Sync {
    /// A buffer allocated backing storage for the first time.
    fn on_allocation(&self, _capacity: usize) {}
    /// A buffer grew existing storage to `capacity` bytes.
    fn on_reallocation(&self, _capacity: usize) {}
    /// A buffer released its storage.
    fn on_free(&self) {}
}

/// Dynamically resized byte container with amortized-doubling growth.
#[derive(Default)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    capacity: usize,
    observer: Option<Arc<dyn BufferObserver>>,
}

/// Returns the capacity the buffer grows to when it must hold `required` bytes.
pub fn next_allocation_size(required: usize) -> usize {
    let mut size = MIN_ALLOCATION;
    while size < required {
        size *= 2;
    }
    size
}

impl GrowableBuffer {
    /// Creates an empty buffer. Nothing is allocated until the first append.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer reporting its allocations to `observer`.
    pub fn with_observer(observer: Arc<dyn BufferObserver>) -> Self {
        Self {
            data: Vec::new(),
            capacity: 0,
            observer: Some(observer),
        }
    }

    /// Creates a buffer holding a copy of `content`.
    pub fn from_bytes(content: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.set(content);
        buffer
    }

    pub fn set_observer(&mut self, observer: Arc<dyn BufferObserver>) {
        self.observer = Some(observer);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Logical capacity, including the byte reserved for the sentinel.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Contents as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Replaces the contents with a copy of `content`.
    pub fn set(&mut self, content: &[u8]) {
        self.data.clear();
        self.grow_to(content.len() + 1);
        self.data.extend_from_slice(content);
    }

    pub fn set_str(&mut self, content: &str) {
        self.set(content.as_bytes());
    }

    pub fn append_byte(&mut self, byte: u8) {
        self.grow_to(self.data.len() + 2);
        self.data.push(byte);
    }

    pub fn append_char(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.append(c.encode_utf8(&mut utf8).as_bytes());
    }

    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.grow_to(self.data.len() + bytes.len() + 1);
        self.data.extend_from_slice(bytes);
    }

    pub fn append_str(&mut self, s: &str) {
        self.append(s.as_bytes());
    }

    /// Appends formatted text, e.g. `buf.append_fmt(format_args!("{n} items"))`.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) {
        match args.as_str() {
            Some(s) => self.append_str(s),
            None => {
                // Writing into the buffer itself cannot fail.
                let _ = fmt::Write::write_fmt(self, args);
            }
        }
    }

    pub fn append_buffer(&mut self, other: &GrowableBuffer) {
        self.append(other.as_bytes());
    }

    /// Reserves room for exactly `len` bytes of content plus the sentinel.
    ///
    /// Used when the final size is known up front, such as a request body
    /// announced by `Content-Length`. Does not round to a power of two.
    pub fn reserve_exact(&mut self, len: usize) {
        let required = self.data.len() + len + 1;
        if required <= self.capacity {
            return;
        }
        self.allocate(required);
    }

    /// Releases the backing storage and resets the buffer to empty.
    pub fn free(&mut self) {
        if self.capacity == 0 {
            return;
        }
        self.data = Vec::new();
        self.capacity = 0;
        if let Some(observer) = &self.observer {
            observer.on_free();
        }
    }

    fn grow_to(&mut self, required: usize) {
        if required <= self.capacity {
            return;
        }
        self.allocate(next_allocation_size(required));
    }

    fn allocate(&mut self, capacity: usize) {
        let previously_allocated = self.capacity > 0;
        self.data.reserve_exact(capacity - self.data.len());
        self.capacity = capacity;

        if let Some(observer) = &self.observer {
            if previously_allocated {
                observer.on_reallocation(capacity);
            } else {
                observer.on_allocation(capacity);
            }
        }
    }
}

impl Drop for GrowableBuffer {
    fn drop(&mut self) {
        self.free();
    }
}

impl Clone for GrowableBuffer {
    fn clone(&self) -> Self {
        let mut copy = Self {
            data: Vec::new(),
            capacity: 0,
            observer: self.observer.clone(),
        };
        copy.append(self.as_bytes());
        copy
    }
}

impl fmt::Write for GrowableBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append_str(s);
        Ok(())
    }
}

impl fmt::Debug for GrowableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowableBuffer")
            .field("len", &self.data.len())
            .field("capacity", &self.capacity)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl PartialEq<[u8]> for GrowableBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&str> for GrowableBuffer {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl From<&str> for GrowableBuffer {
    fn from(value: &str) -> Self {
        Self::from_bytes(value.as_bytes())
    }
}

impl From<&[u8]> for GrowableBuffer {
    fn from(value: &[u8]) -> Self {
        Self::from_bytes(value)
    }
}

impl From<String> for GrowableBuffer {
    fn from(value: String) -> Self {
        Self::from_bytes(value.as_bytes())
    }
}

impl From<Vec<u8>> for GrowableBuffer {
    fn from(value: Vec<u8>) -> Self {
        Self::from_bytes(&value)
    }
}
