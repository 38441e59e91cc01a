//! Fixed-point to floating-point lookup.

/// Lookup table mapping every raw byte to a normalized amplitude.
///
/// Each byte is read as a signed 8-bit sample `b` in `[-128, 127]` and maps
/// to `b / 128.0`, so the output lies in `[-1.0, 1.0)`. The table is built
/// once and shared read-only between calls.
///
/// # Example
///
/// ```
/// use iq_stream::format::ConversionTable;
///
/// let table = ConversionTable::new();
/// assert_eq!(table.lookup(0x80), -1.0);
/// assert_eq!(table.lookup(0x40), 0.5);
/// ```
#[derive(Clone)]
pub struct ConversionTable {
    table: [f64; 256],
}

impl ConversionTable {
    /// Builds the table.
    #[must_use]
    pub fn new() -> Self {
        let mut table = [0.0; 256];
        for (raw, value) in table.iter_mut().enumerate() {
            *value = f64::from(raw as u8 as i8) / 128.0;
        }
        Self { table }
    }

    /// Returns the normalized amplitude for one raw byte.
    #[inline]
    #[must_use]
    pub fn lookup(&self, raw: u8) -> f64 {
        self.table[usize::from(raw)]
    }

    /// Converts `raw` into `out` element by element.
    ///
    /// Converts `min(raw.len(), out.len())` values.
    #[inline]
    pub fn convert_into(&self, raw: &[u8], out: &mut [f64]) {
        for (dst, &src) in out.iter_mut().zip(raw) {
            *dst = self.table[usize::from(src)];
        }
    }
}

impl Default for ConversionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionTable")
            .field("entries", &self.table.len())
            .finish()
    }
}
