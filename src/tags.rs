//! Field annotations.
//!
//! Every River-visible field of a record carries a tag of the form
//! `"name,options"`. [`resolve`] turns the raw tags of a record type into a
//! list of [`Field`]s, once per type.
//!
//! | tag                      | meaning                                  |
//! |--------------------------|------------------------------------------|
//! | `"name,attr"`            | required attribute                       |
//! | `"name,attr,optional"`   | optional attribute                       |
//! | `"a.b,block"`            | required block, possibly multi-part name |
//! | `"a.b,block,optional"`   | optional block                           |
//! | `"name,enum"`            | enum group of alternative blocks         |
//! | `"name,enum,optional"`   | optional enum group                      |
//! | `",label"`               | the block label                          |
//! | `",squash"`              | splice the inner record's fields         |
//!
//! Malformed tags are programming errors in the host program and panic.

use std::any::{type_name, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use tracing::debug;

use crate::value::{HostKind, HostType, Record};

/// Role and modifier bits of a [`Field`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    pub const ATTR: Flags = Flags(1);
    pub const BLOCK: Flags = Flags(1 << 1);
    pub const ENUM: Flags = Flags(1 << 2);
    pub const OPTIONAL: Flags = Flags(1 << 3);
    pub const LABEL: Flags = Flags(1 << 4);
    pub const SQUASH: Flags = Flags(1 << 5);

    const NAMES: [(Flags, &'static str); 6] = [
        (Flags::ATTR, "attr"),
        (Flags::BLOCK, "block"),
        (Flags::ENUM, "enum"),
        (Flags::OPTIONAL, "optional"),
        (Flags::LABEL, "label"),
        (Flags::SQUASH, "squash"),
    ];

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parse the option list of a tag. Only the documented combinations are
    /// accepted.
    pub fn parse(options: &str) -> Option<Flags> {
        let flags = match options {
            "attr" => Flags::ATTR,
            "attr,optional" => Flags::ATTR | Flags::OPTIONAL,
            "block" => Flags::BLOCK,
            "block,optional" => Flags::BLOCK | Flags::OPTIONAL,
            "enum" => Flags::ENUM,
            "enum,optional" => Flags::ENUM | Flags::OPTIONAL,
            "label" => Flags::LABEL,
            "squash" => Flags::SQUASH,
            _ => return None,
        };
        Some(flags)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Flags::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join(","))
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({self})")
    }
}

/// Raw annotation of one struct field, as emitted by `#[derive(River)]`.
#[derive(Debug, Clone, Copy)]
pub struct RawTag {
    pub field: &'static str,
    pub tag: Option<(&'static str, fn() -> HostType)>,
}

impl RawTag {
    pub fn new(field: &'static str, tag: &'static str, ty: fn() -> HostType) -> Self {
        Self {
            field,
            tag: Some((tag, ty)),
        }
    }

    pub fn untagged(field: &'static str) -> Self {
        Self { field, tag: None }
    }
}

/// A resolved field annotation.
#[derive(Debug, Clone)]
pub struct Field {
    /// Name path; empty for label and squash fields.
    pub name: Vec<String>,
    /// Field positions leading to the value, one per squash level.
    pub index: Vec<usize>,
    pub flags: Flags,
    pub ty: fn() -> HostType,
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.index == other.index && self.flags == other.flags
    }
}

impl Field {
    pub fn full_name(&self) -> String {
        self.name.join(".")
    }

    pub fn is_attr(&self) -> bool {
        self.flags.contains(Flags::ATTR)
    }

    pub fn is_block(&self) -> bool {
        self.flags.contains(Flags::BLOCK)
    }

    pub fn is_enum(&self) -> bool {
        self.flags.contains(Flags::ENUM)
    }

    pub fn is_optional(&self) -> bool {
        self.flags.contains(Flags::OPTIONAL)
    }

    pub fn is_label(&self) -> bool {
        self.flags.contains(Flags::LABEL)
    }

    pub fn is_squash(&self) -> bool {
        self.flags.contains(Flags::SQUASH)
    }

    pub fn host_type(&self) -> HostType {
        (self.ty)()
    }
}

lazy_static! {
    static ref FIELD_CACHE: DashMap<TypeId, Arc<[Field]>> = DashMap::new();
    static ref RESOLUTIONS: DashMap<TypeId, usize> = DashMap::new();
}

/// Resolved fields of `T`, computed on first use and cached.
pub fn resolve<T: Record + 'static>() -> Arc<[Field]> {
    let id = TypeId::of::<T>();
    if let Some(fields) = FIELD_CACHE.get(&id) {
        return Arc::clone(fields.value());
    }

    // computed outside the map lock: squash resolution re-enters this cache
    let fields: Arc<[Field]> = resolve_tags(type_name::<T>(), &T::raw_tags()).into();
    *RESOLUTIONS.entry(id).or_insert(0) += 1;
    debug!(record = type_name::<T>(), fields = fields.len(), "resolved river tags");

    Arc::clone(FIELD_CACHE.entry(id).or_insert(fields).value())
}

/// How many times the fields of `T` were actually computed.
pub fn resolution_count<T: 'static>() -> usize {
    RESOLUTIONS.get(&TypeId::of::<T>()).map_or(0, |count| *count)
}

/// Fallback arm of derived field accessors.
pub fn no_such_field(record: &str, index: usize) -> ! {
    panic!("river: {record} has no field with index {index}")
}

fn is_enum_shape(ty: &HostType) -> bool {
    let elem = match ty.kind {
        HostKind::Sequence(elem) | HostKind::Array(_, elem) => elem(),
        _ => return false,
    };
    match elem.fields() {
        Some(fields) => fields
            .iter()
            .all(|f| f.is_block() && f.host_type().fields().is_some()),
        None => false,
    }
}

/// Resolve raw tags into fields. Panics on malformed tags.
pub fn resolve_tags(record: &str, raw: &[RawTag]) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut label = None;

    for (i, tag) in raw.iter().enumerate() {
        let Some((text, ty)) = tag.tag else {
            continue;
        };
        let name_of = || format!("{record}.{}", tag.field);

        let Some((name, options)) = text.split_once(',') else {
            panic!("river: field {} tag {text:?} is missing options", name_of());
        };
        let Some(flags) = Flags::parse(options) else {
            panic!("river: field {} tag has unrecognized options {options:?}", name_of());
        };

        let nameless = flags.contains(Flags::LABEL) || flags.contains(Flags::SQUASH);
        if nameless && !name.is_empty() {
            panic!("river: {flags} field {} must not have a name", name_of());
        }
        if !nameless && name.is_empty() {
            panic!("river: non-empty name required for field {}", name_of());
        }
        if flags.contains(Flags::ATTR) && name.contains('.') {
            panic!("river: attribute field {} must not have a name containing \".\"", name_of());
        }

        let host = ty();
        if flags.contains(Flags::LABEL) {
            if let Some(previous) = label.replace(tag.field) {
                panic!("river: {record} has more than one label field ({previous} and {})", tag.field);
            }
            if !matches!(host.kind, HostKind::Text) {
                panic!("river: label field {} must be a string, got {}", name_of(), host.name);
            }
        }
        if flags.contains(Flags::ENUM) && !is_enum_shape(&host) {
            panic!(
                "river: enum field {} must be a sequence of records with only block fields, got {}",
                name_of(),
                host.name
            );
        }

        if flags.contains(Flags::SQUASH) {
            let Some(inner) = host.fields() else {
                panic!("river: squash field {} must be a record, got {}", name_of(), host.name);
            };
            for field in inner.iter() {
                let mut index = vec![i];
                index.extend_from_slice(&field.index);
                fields.push(Field {
                    index,
                    ..field.clone()
                });
            }
            continue;
        }

        let name = if name.is_empty() {
            Vec::new()
        } else {
            name.split('.').map(str::to_string).collect()
        };
        fields.push(Field {
            name,
            index: vec![i],
            flags,
            ty,
        });
    }

    let mut seen = HashSet::new();
    for field in fields.iter().filter(|f| !f.is_label()) {
        if !seen.insert(field.full_name()) {
            panic!("river: field name {:?} is used more than once in {record}", field.full_name());
        }
    }
    fields
}
