//! Record → GPU buffer packing.
//!
//! A [`FieldLayout`] declares typed fields; a [`Mapping`] says how to pull
//! each field out of a caller record. [`pack`] interleaves the results into a
//! [`PackedBuffer`], expanding records whose flattened fields yield sequences.

mod field;
mod pack;

pub use field::{FieldType, FieldValue, ScalarKind};
pub use pack::{
    pack,
    stride,
    Extractor,
    FieldLayout,
    FieldMapping,
    FlattenExtractor,
    Mapping,
    PackObserver,
    PackOptions,
    PackedBuffer,
    PackedField,
};
