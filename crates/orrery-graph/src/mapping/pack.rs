use std::collections::HashMap;

use crate::error::{GraphError, Result};

use super::field::{FieldType, FieldValue};

/// `extract(record, record_index)`.
pub type Extractor<'a, R> = Box<dyn Fn(&R, usize) -> FieldValue + 'a>;

/// `flatten(record, i, k)`: value of expanded entry `i` out of `k`.
pub type FlattenExtractor<'a, R> = Box<dyn Fn(&R, usize, usize) -> FieldValue + 'a>;

/// How one declared field gets its value.
pub enum FieldMapping<'a, R> {
    /// Field is removed from the packed layout.
    Dropped,
    /// One value per record; constant across a flattened record's entries.
    Value(Extractor<'a, R>),
    /// Extractor returns a [`FieldValue::Sequence`] whose length `k` expands
    /// the record into `k` entries. Entry `i` takes `flatten(record, i, k)`
    /// when given, else element `i` of the sequence.
    Flattened {
        extract: Extractor<'a, R>,
        flatten: Option<FlattenExtractor<'a, R>>,
    },
}

impl<'a, R> FieldMapping<'a, R> {
    pub fn value(f: impl Fn(&R, usize) -> FieldValue + 'a) -> Self {
        FieldMapping::Value(Box::new(f))
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, FieldMapping::Dropped)
    }
}

/// Ordered field declarations: name → type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldLayout {
    fields: Vec<(String, FieldType)>,
}

impl FieldLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.push((name.to_string(), ty));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }
}

/// Field name → [`FieldMapping`]. Later `set` calls override earlier ones,
/// which is how callers replace individual default extractors.
pub struct Mapping<'a, R> {
    fields: HashMap<String, FieldMapping<'a, R>>,
}

impl<R> Default for Mapping<'_, R> {
    fn default() -> Self {
        Self { fields: HashMap::new() }
    }
}

impl<'a, R> Mapping<'a, R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, mapping: FieldMapping<'a, R>) -> &mut Self {
        self.fields.insert(name.to_string(), mapping);
        self
    }

    pub fn field(mut self, name: &str, f: impl Fn(&R, usize) -> FieldValue + 'a) -> Self {
        self.set(name, FieldMapping::value(f));
        self
    }

    pub fn flatten(
        mut self,
        name: &str,
        extract: impl Fn(&R, usize) -> FieldValue + 'a,
        flatten: Option<FlattenExtractor<'a, R>>,
    ) -> Self {
        self.set(name, FieldMapping::Flattened { extract: Box::new(extract), flatten });
        self
    }

    pub fn drop_field(mut self, name: &str) -> Self {
        self.set(name, FieldMapping::Dropped);
        self
    }

    /// Applies every entry of `overrides` on top of `self`.
    pub fn merge(mut self, overrides: Mapping<'a, R>) -> Self {
        self.fields.extend(overrides.fields);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldMapping<'a, R>> {
        self.fields.get(name)
    }
}

/// Options for [`pack`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PackOptions {
    /// Round the entry count up to a power of two, zero-filling the tail.
    pub pad_to_power_of_two: bool,
}

/// Callbacks invoked while packing.
pub trait PackObserver<R> {
    /// Pass 1, once per source record: its expanded entries are
    /// `first_entry..first_entry + entries`.
    fn on_record(&mut self, record: &R, index: usize, first_entry: usize, entries: usize) {
        let _ = (record, index, first_entry, entries);
    }

    /// Pass 2, once per written entry.
    fn on_entry(&mut self, record: &R, index: usize, entry: usize) {
        let _ = (record, index, entry);
    }
}

impl<R> PackObserver<R> for () {}

/// A field that survived into the packed layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedField {
    pub name: String,
    pub ty: FieldType,
    pub offset: usize,
}

/// Interleaved entries; `data.len() == stride * entries` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedBuffer {
    pub data: Vec<u8>,
    pub stride: usize,
    pub fields: Vec<PackedField>,
    /// Entry count including power-of-two padding.
    pub entries: usize,
    /// Entries produced by records, before padding.
    pub logical_entries: usize,
}

impl PackedBuffer {
    pub fn field(&self, name: &str) -> Option<&PackedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Decodes one field of one entry.
    pub fn read(&self, entry: usize, name: &str) -> Option<FieldValue> {
        let field = self.field(name)?;
        if entry >= self.entries {
            return None;
        }
        let base = entry * self.stride + field.offset;
        let size = field.ty.kind.size();
        let comps: Vec<f64> = (0..field.ty.components as usize)
            .map(|c| field.ty.kind.read(&self.data[base + c * size..]))
            .collect();
        Some(if comps.len() == 1 { FieldValue::Scalar(comps[0]) } else { FieldValue::vector(&comps) })
    }
}

/// Byte stride of the layout after dropped fields are removed.
pub fn stride<R>(layout: &FieldLayout, mapping: &Mapping<'_, R>) -> usize {
    layout
        .iter()
        .filter(|(name, _)| !mapping.get(name).is_some_and(FieldMapping::is_dropped))
        .map(|(_, ty)| ty.byte_size())
        .sum()
}

struct Resolved<'m, 'a, R> {
    name: &'m str,
    ty: FieldType,
    offset: usize,
    mapping: &'m FieldMapping<'a, R>,
}

fn resolve<'m, 'a, R>(layout: &'m FieldLayout, mapping: &'m Mapping<'a, R>) -> Result<Vec<Resolved<'m, 'a, R>>> {
    if let Some(name) = mapping.fields.keys().find(|n| !layout.contains(n.as_str())) {
        return Err(GraphError::config(format!("mapping references undeclared field `{name}`")));
    }
    let mut offset = 0;
    let mut out = Vec::new();
    for (name, ty) in layout.iter() {
        let m = mapping
            .get(name)
            .ok_or_else(|| GraphError::config(format!("no extractor for field `{name}`")))?;
        if m.is_dropped() {
            continue;
        }
        out.push(Resolved { name, ty, offset, mapping: m });
        offset += ty.byte_size();
    }
    Ok(out)
}

fn check_components(name: &str, ty: FieldType, value: &FieldValue) -> Result<()> {
    match value.components() {
        Some(c) if c == ty.components => Ok(()),
        Some(c) => Err(GraphError::config(format!(
            "field `{name}` is {ty} but the extractor produced {c} components"
        ))),
        None => Err(GraphError::config(format!("field `{name}` produced a nested sequence"))),
    }
}

/// Expanded entry count of one record, validating sequence usage.
fn record_len<R>(fields: &[Resolved<'_, '_, R>], record: &R, index: usize) -> Result<usize> {
    let mut len: Option<(usize, &str)> = None;
    for f in fields {
        match (f.mapping, f.mapping_value(record, index)) {
            (FieldMapping::Flattened { .. }, Some(FieldValue::Sequence(items))) => match len {
                Some((k, other)) if k != items.len() => {
                    return Err(GraphError::config(format!(
                        "record {index}: `{other}` expands to {k} entries but `{}` to {}",
                        f.name,
                        items.len()
                    )));
                }
                _ => len = Some((items.len(), f.name)),
            },
            (FieldMapping::Flattened { .. }, Some(_)) => {
                return Err(GraphError::config(format!(
                    "record {index}: flattened field `{}` did not produce a sequence",
                    f.name
                )));
            }
            (_, Some(FieldValue::Sequence(_))) => {
                return Err(GraphError::config(format!(
                    "record {index}: field `{}` produced a sequence but is not flattened",
                    f.name
                )));
            }
            (_, Some(v)) => check_components(f.name, f.ty, &v)?,
            (_, None) => {}
        }
    }
    Ok(len.map_or(1, |(k, _)| k))
}

impl<R> Resolved<'_, '_, R> {
    fn mapping_value(&self, record: &R, index: usize) -> Option<FieldValue> {
        match self.mapping {
            FieldMapping::Dropped => None,
            FieldMapping::Value(f) => Some(f(record, index)),
            FieldMapping::Flattened { extract, .. } => Some(extract(record, index)),
        }
    }

    fn write(&self, out: &mut [u8], value: &FieldValue) {
        let size = self.ty.kind.size();
        for c in 0..self.ty.components as usize {
            let at = self.offset + c * size;
            self.ty.kind.write(&mut out[at..at + size], value.component(c));
        }
    }
}

/// Packs `records` into interleaved entries laid out by `layout`.
///
/// Pass 1 sizes every record (flattened fields expand it) and reports it to
/// `observer.on_record`; pass 2 serializes each entry and reports it to
/// `observer.on_entry`.
pub fn pack<R>(
    records: &[R],
    layout: &FieldLayout,
    mapping: &Mapping<'_, R>,
    options: PackOptions,
    observer: &mut dyn PackObserver<R>,
) -> Result<PackedBuffer> {
    let fields = resolve(layout, mapping)?;
    let stride: usize = fields.iter().map(|f| f.ty.byte_size()).sum();

    // ── pass 1: expanded lengths ───────────────────────────────────────────
    let mut lens = Vec::with_capacity(records.len());
    let mut logical = 0usize;
    for (i, record) in records.iter().enumerate() {
        let k = record_len(&fields, record, i)?;
        observer.on_record(record, i, logical, k);
        lens.push(k);
        logical += k;
    }

    let entries = if options.pad_to_power_of_two && logical > 0 {
        logical.next_power_of_two()
    } else {
        logical
    };

    // ── pass 2: serialize ──────────────────────────────────────────────────
    let mut data = vec![0u8; stride * entries];
    let mut entry = 0usize;
    for (i, record) in records.iter().enumerate() {
        let k = lens[i];
        let values: Vec<Option<FieldValue>> = fields.iter().map(|f| f.mapping_value(record, i)).collect();

        for j in 0..k {
            let out = &mut data[entry * stride..(entry + 1) * stride];
            for (f, value) in fields.iter().zip(&values) {
                let Some(value) = value else { continue };
                match (f.mapping, value) {
                    (FieldMapping::Flattened { flatten: Some(flat), .. }, _) => {
                        let v = flat(record, j, k);
                        check_components(f.name, f.ty, &v)?;
                        f.write(out, &v);
                    }
                    (FieldMapping::Flattened { flatten: None, .. }, FieldValue::Sequence(items)) => {
                        check_components(f.name, f.ty, &items[j])?;
                        f.write(out, &items[j]);
                    }
                    (_, v) => f.write(out, v),
                }
            }
            observer.on_entry(record, i, entry);
            entry += 1;
        }
    }

    log::debug!(
        "packed {} records into {logical} entries ({entries} with padding), stride {stride}",
        records.len()
    );

    Ok(PackedBuffer {
        data,
        stride,
        fields: fields
            .iter()
            .map(|f| PackedField { name: f.name.to_string(), ty: f.ty, offset: f.offset })
            .collect(),
        entries,
        logical_entries: logical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Edge {
        id: u32,
        weight: f32,
        path: Vec<u32>,
    }

    fn layout() -> FieldLayout {
        FieldLayout::new()
            .with("id", FieldType::U32)
            .with("weight", FieldType::F32)
            .with("color", "u8x4".parse().unwrap())
    }

    fn mapping<'a>() -> Mapping<'a, Edge> {
        Mapping::new()
            .field("id", |e: &Edge, _| e.id.into())
            .field("weight", |e: &Edge, _| e.weight.into())
            .field("color", |_, i| [i as u8, 0, 0, 255].into())
    }

    fn edges() -> Vec<Edge> {
        vec![
            Edge { id: 10, weight: 0.5, path: vec![1, 2, 3] },
            Edge { id: 11, weight: 1.5, path: vec![4, 5] },
        ]
    }

    #[test]
    fn byte_length_is_stride_times_entries() {
        let buf = pack(&edges(), &layout(), &mapping(), PackOptions::default(), &mut ()).unwrap();
        assert_eq!(buf.stride, 12);
        assert_eq!(buf.entries, 2);
        assert_eq!(buf.data.len(), buf.stride * buf.entries);
        assert_eq!(buf.read(1, "id"), Some(FieldValue::Scalar(11.0)));
        assert_eq!(buf.read(1, "weight"), Some(FieldValue::Scalar(1.5)));
        assert_eq!(buf.read(1, "color"), Some(FieldValue::vector(&[1.0, 0.0, 0.0, 255.0])));
    }

    #[test]
    fn merged_extractor_overrides_base() {
        let merged = mapping().merge(Mapping::new().field("weight", |e: &Edge, _| (e.weight * 2.0).into()));
        let buf = pack(&edges(), &layout(), &merged, PackOptions::default(), &mut ()).unwrap();
        assert_eq!(buf.read(0, "weight"), Some(FieldValue::Scalar(1.0)));
        assert_eq!(buf.read(0, "id"), Some(FieldValue::Scalar(10.0)));
    }

    #[test]
    fn dropped_field_shrinks_stride() {
        let m = mapping().drop_field("weight");
        assert_eq!(stride(&layout(), &m), 8);
        let buf = pack(&edges(), &layout(), &m, PackOptions::default(), &mut ()).unwrap();
        assert!(buf.field("weight").is_none());
        assert_eq!(buf.field("color").map(|f| f.offset), Some(4));
    }

    #[test]
    fn flattening_expands_records() {
        let layout = layout().with("point", FieldType::U32);
        let m = mapping().flatten("point", |e: &Edge, _| e.path.clone().into(), None);
        let buf = pack(&edges(), &layout, &m, PackOptions::default(), &mut ()).unwrap();
        assert_eq!(buf.entries, 5);
        let points: Vec<_> = (0..5).map(|i| buf.read(i, "point").unwrap().component(0)).collect();
        assert_eq!(points, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        // Non-flattened fields repeat per expanded entry.
        assert_eq!(buf.read(2, "id"), Some(FieldValue::Scalar(10.0)));
        assert_eq!(buf.read(3, "id"), Some(FieldValue::Scalar(11.0)));
    }

    #[test]
    fn flatten_extractor_receives_position() {
        let layout = layout().with("segment", FieldType::VEC2);
        let m = mapping().flatten(
            "segment",
            |e: &Edge, _| e.path.clone().into(),
            Some(Box::new(|_: &Edge, i: usize, k: usize| -> FieldValue { [i as f32, k as f32].into() })),
        );
        let buf = pack(&edges(), &layout, &m, PackOptions::default(), &mut ()).unwrap();
        assert_eq!(buf.read(4, "segment"), Some(FieldValue::vector(&[1.0, 2.0])));
    }

    #[test]
    fn oversized_vectors_are_rejected() {
        let m = mapping().field("color", |_: &Edge, _| [1u8, 2, 3, 4, 5].into());
        let err = pack(&edges(), &layout(), &m, PackOptions::default(), &mut ()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(err.to_string().contains("5 components"));
    }

    #[test]
    fn mismatched_sequence_lengths_are_rejected() {
        let layout = layout().with("a", FieldType::U32).with("b", FieldType::U32);
        let m = mapping()
            .flatten("a", |e: &Edge, _| e.path.clone().into(), None)
            .flatten("b", |_: &Edge, _| vec![1u32].into(), None);
        let err = pack(&edges(), &layout, &m, PackOptions::default(), &mut ()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn undeclared_and_missing_fields_are_configuration_errors() {
        let m = mapping().field("bogus", |_, _| 0u32.into());
        assert!(pack(&edges(), &layout(), &m, PackOptions::default(), &mut ()).is_err());

        let partial = Mapping::new().field("id", |e: &Edge, _| e.id.into());
        assert!(pack(&edges(), &layout(), &partial, PackOptions::default(), &mut ()).is_err());
    }

    #[test]
    fn padding_rounds_to_power_of_two() {
        let mut records = edges();
        records.push(Edge { id: 12, weight: 0.0, path: vec![] });
        let opts = PackOptions { pad_to_power_of_two: true };
        let buf = pack(&records, &layout(), &mapping(), opts, &mut ()).unwrap();
        assert_eq!(buf.logical_entries, 3);
        assert_eq!(buf.entries, 4);
        assert_eq!(buf.read(3, "id"), Some(FieldValue::Scalar(0.0)));
    }

    #[test]
    fn empty_input_is_valid() {
        let opts = PackOptions { pad_to_power_of_two: true };
        let buf = pack(&[], &layout(), &mapping(), opts, &mut ()).unwrap();
        assert_eq!(buf.entries, 0);
        assert!(buf.data.is_empty());
    }

    #[test]
    fn observers_see_records_then_entries() {
        #[derive(Default)]
        struct Log(Vec<String>);
        impl PackObserver<Edge> for Log {
            fn on_record(&mut self, r: &Edge, _: usize, first: usize, n: usize) {
                self.0.push(format!("r{}@{first}+{n}", r.id));
            }
            fn on_entry(&mut self, r: &Edge, _: usize, entry: usize) {
                self.0.push(format!("e{}@{entry}", r.id));
            }
        }
        let layout = layout().with("point", FieldType::U32);
        let m = mapping().flatten("point", |e: &Edge, _| e.path.clone().into(), None);
        let mut log = Log::default();
        pack(&edges(), &layout, &m, PackOptions::default(), &mut log).unwrap();
        assert_eq!(
            log.0,
            vec!["r10@0+3", "r11@3+2", "e10@0", "e10@1", "e10@2", "e11@3", "e11@4"]
        );
    }
}
