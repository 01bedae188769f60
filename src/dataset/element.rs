use super::DataType;

/// A native element type of a dataset.
///
/// Elements are converted to and from bytes in native endianness.
pub trait Element: bytemuck::Pod + Send + Sync {
    /// The data type of the element.
    fn data_type() -> DataType;
}

macro_rules! impl_element {
    ($t:ty, $data_type:expr) => {
        impl Element for $t {
            fn data_type() -> DataType {
                $data_type
            }
        }
    };
}

impl_element!(i8, DataType::Int8);
impl_element!(i16, DataType::Int16);
impl_element!(i32, DataType::Int32);
impl_element!(i64, DataType::Int64);
impl_element!(u8, DataType::UInt8);
impl_element!(u16, DataType::UInt16);
impl_element!(u32, DataType::UInt32);
impl_element!(u64, DataType::UInt64);
impl_element!(f32, DataType::Float32);
impl_element!(f64, DataType::Float64);
