//! Dataset fill values.

/// The fill value of a dataset.
///
/// Provides the value of elements inside the shape of a dataset which have never been written, such as those created when a write grows the dataset.
///
/// A fill value is either the size of a single element, or the size of a whole item (`elements_per_item` elements).
/// An empty fill value is equivalent to all zero bytes.
#[derive(Clone, Eq, PartialEq, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FillValue(Vec<u8>);

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<Vec<u8>> for FillValue {
    fn from(value: Vec<u8>) -> Self {
        FillValue(value)
    }
}

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        FillValue(vec![u8::from(value)])
    }
}

macro_rules! impl_fill_value_from_ne_bytes {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FillValue {
                fn from(value: $t) -> Self {
                    FillValue(value.to_ne_bytes().to_vec())
                }
            }
        )*
    };
}

impl_fill_value_from_ne_bytes!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl FillValue {
    /// Create a new fill value composed of `bytes`.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> FillValue {
        FillValue(bytes)
    }

    /// Returns the size in bytes of the fill value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the byte representation of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true if the fill value can fill items of `item_size` bytes.
    #[must_use]
    pub fn is_compatible(&self, item_size: usize) -> bool {
        self.0.is_empty() || (item_size > 0 && item_size % self.0.len() == 0)
    }

    /// Return the bytes of a single item of `item_size` bytes filled with the fill value.
    ///
    /// Returns [`None`] if the fill value is not [compatible](FillValue::is_compatible) with `item_size`.
    #[must_use]
    pub fn item_bytes(&self, item_size: usize) -> Option<Vec<u8>> {
        if self.0.is_empty() {
            Some(vec![0; item_size])
        } else if self.is_compatible(item_size) {
            Some(self.0.repeat(item_size / self.0.len()))
        } else {
            None
        }
    }

    /// Return the bytes of `num_items` items of `item_size` bytes filled with the fill value.
    ///
    /// Returns [`None`] if the fill value is not [compatible](FillValue::is_compatible) with `item_size`.
    #[must_use]
    pub fn repeat(&self, item_size: usize, num_items: usize) -> Option<Vec<u8>> {
        self.item_bytes(item_size).map(|item| item.repeat(num_items))
    }

    /// Check if the bytes are equal to a sequence of the fill value.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        if self.0.is_empty() {
            bytes.iter().all(|byte| *byte == 0)
        } else {
            bytes.len() % self.0.len() == 0
                && bytes
                    .chunks_exact(self.0.len())
                    .all(|element| element == self.0.as_slice())
        }
    }
}
