use std::collections::TryReserveError;

/// Capacity a fresh buffer starts with.
pub const INITIAL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Output buffer capacity overflow")]
    Overflow,
    #[error("Output buffer allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}

/// Append-only output accumulator for HTML rendering.
///
/// Capacity doubles whenever an append does not fit, so appends are
/// amortized O(1). Growth goes through `try_reserve`, so running out of
/// memory is reported as [`ResourceError`] instead of aborting, and
/// nothing is ever truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicBuffer {
    data: String,
}

impl DynamicBuffer {
    pub fn new() -> Result<Self, ResourceError> {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, ResourceError> {
        let mut data = String::new();
        data.try_reserve_exact(capacity)?;
        Ok(Self { data })
    }

    pub fn append(&mut self, text: &str) -> Result<(), ResourceError> {
        let needed = self
            .data
            .len()
            .checked_add(text.len())
            .ok_or(ResourceError::Overflow)?;

        if needed > self.data.capacity() {
            let mut capacity = self.data.capacity().max(INITIAL_CAPACITY);
            while capacity < needed {
                capacity = capacity.checked_mul(2).ok_or(ResourceError::Overflow)?;
            }
            self.data.try_reserve_exact(capacity - self.data.len())?;
        }

        self.data.push_str(text);
        Ok(())
    }

    pub fn push(&mut self, c: char) -> Result<(), ResourceError> {
        self.append(c.encode_utf8(&mut [0; 4]))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_bytes()
    }
}

impl AsRef<str> for DynamicBuffer {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<DynamicBuffer> for String {
    fn from(buffer: DynamicBuffer) -> Self {
        buffer.into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn starts_empty_with_initial_capacity() {
        let buffer = DynamicBuffer::new().unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= INITIAL_CAPACITY);
    }

    #[test]
    fn growth_doubles_capacity() {
        let mut buffer = DynamicBuffer::with_capacity(4).unwrap();
        buffer.append("abcd").unwrap();
        let before = buffer.capacity();

        buffer.append("e").unwrap();

        assert!(buffer.capacity() >= (before.max(INITIAL_CAPACITY)));
        assert_eq!(buffer.as_str(), "abcde");
    }

    #[test]
    fn one_large_append_grows_repeatedly() {
        let mut buffer = DynamicBuffer::new().unwrap();
        let big = "x".repeat(INITIAL_CAPACITY * 10 + 3);

        buffer.append(&big).unwrap();

        assert_eq!(buffer.len(), big.len());
        assert!(buffer.capacity() >= buffer.len());
    }

    #[rstest]
    #[case(&[])]
    #[case(&[1])]
    #[case(&[255, 1, 1])]
    #[case(&[256, 256, 1000, 0, 7])]
    #[case(&[3; 500])]
    fn length_is_sum_of_appends(#[case] sizes: &[usize]) {
        let mut buffer = DynamicBuffer::new().unwrap();
        let mut total = 0;
        for &size in sizes {
            buffer.append(&"a".repeat(size)).unwrap();
            total += size;
            assert!(buffer.capacity() >= buffer.len());
        }
        assert_eq!(buffer.len(), total);
    }

    #[test]
    fn capacity_never_shrinks() {
        let mut buffer = DynamicBuffer::new().unwrap();
        let mut last = buffer.capacity();
        for _ in 0..200 {
            buffer.append("0123456789").unwrap();
            assert!(buffer.capacity() >= last);
            last = buffer.capacity();
        }
    }

    #[test]
    fn push_appends_multibyte_chars() {
        let mut buffer = DynamicBuffer::new().unwrap();
        buffer.push('\u{FFFD}').unwrap();
        buffer.push('a').unwrap();
        assert_eq!(buffer.as_bytes(), "\u{FFFD}a".as_bytes());
        assert_eq!(String::from(buffer), "\u{FFFD}a");
    }
}
