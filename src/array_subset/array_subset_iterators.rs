mod contiguous_linearised_indices_iterator;
mod indices_iterator;

pub use contiguous_linearised_indices_iterator::ContiguousLinearisedIndicesIterator;
pub use indices_iterator::IndicesIterator;
