//! Decoding attribute and block statements into records.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use tracing::{debug, trace};

use crate::ast::{BlockStatement, Body, Span, Statement};
use crate::tags::Field;
use crate::value::{decode, field_mut, HookError, HostKind, HostValue, Record, Value};

use super::diagnostic::Diagnostic;
use super::evaluator::Session;
use super::scope::Scope;

/// A block of an enum group and where it lands.
#[derive(Debug, Clone)]
struct EnumBlock {
    enum_field: Field,
    /// Field of the element record receiving the block.
    block_field: Field,
}

/// Lookup tables over the fields of one record type.
#[derive(Debug)]
struct TagInfo {
    fields: Arc<[Field]>,
    lookup: HashMap<String, Field>,
    // "group.member" -> 行き先
    enums: HashMap<String, EnumBlock>,
    label: Option<Field>,
}

impl TagInfo {
    fn new(fields: Arc<[Field]>) -> Self {
        let mut lookup = HashMap::new();
        let mut enums = HashMap::new();
        let mut label = None;

        for field in fields.iter() {
            if field.is_label() {
                label = Some(field.clone());
                continue;
            }
            lookup.insert(field.full_name(), field.clone());

            if !field.is_enum() {
                continue;
            }
            let elem = match field.host_type().kind {
                HostKind::Sequence(elem) | HostKind::Array(_, elem) => elem(),
                _ => continue,
            };
            for block_field in elem.fields().iter().flat_map(|fields| fields.iter()) {
                let member = format!("{}.{}", field.full_name(), block_field.full_name());
                enums.insert(
                    member,
                    EnumBlock {
                        enum_field: field.clone(),
                        block_field: block_field.clone(),
                    },
                );
            }
        }

        Self {
            fields,
            lookup,
            enums,
            label,
        }
    }
}

lazy_static! {
    static ref TAG_INFO: DashMap<TypeId, Arc<TagInfo>> = DashMap::new();
}

fn tag_info(record: &dyn Record) -> Arc<TagInfo> {
    let id = Any::type_id(record.as_host().as_any());
    if let Some(info) = TAG_INFO.get(&id) {
        return Arc::clone(info.value());
    }
    let info = Arc::new(TagInfo::new(record.fields()));
    debug!(
        record = record.as_host().type_of().name,
        enums = info.enums.len(),
        "built block lookup"
    );
    Arc::clone(TAG_INFO.entry(id).or_insert(info).value())
}

/// Occurrences of each block group within one body.
#[derive(Default)]
struct BlockCounts {
    totals: HashMap<String, usize>,
    // 文の位置 -> グループ内の番号
    positions: HashMap<usize, usize>,
}

impl BlockCounts {
    fn count(body: &Body, info: &TagInfo) -> Self {
        let mut counts = Self::default();
        for (i, stmt) in body.iter().enumerate() {
            let Statement::Block(block) = stmt else {
                continue;
            };
            let name = block.full_name();
            let group = match info.enums.get(&name) {
                Some(member) => member.enum_field.full_name(),
                None => name,
            };
            let total = counts.totals.entry(group).or_default();
            counts.positions.insert(i, *total);
            *total += 1;
        }
        counts
    }

    fn total(&self, group: &str) -> usize {
        self.totals.get(group).copied().unwrap_or_default()
    }

    fn position(&self, statement: usize) -> usize {
        self.positions.get(&statement).copied().unwrap_or_default()
    }
}

fn at(span: Option<Span>, message: String) -> Diagnostic {
    match span {
        Some(span) => Diagnostic::new(span, message),
        None => Diagnostic::message(message),
    }
}

impl<'a> Session<'a> {
    /// Populate the record behind `target` from `body`.
    ///
    /// `block` is the statement owning the body, if any; it supplies the label
    /// and the position of errors about the body as a whole. With `hooks`
    /// off, the target's own unmarshal, default and validate hooks are
    /// skipped.
    pub(crate) fn decode_block(
        &mut self,
        scope: Option<&Scope>,
        body: &'a Body,
        block: Option<&'a BlockStatement>,
        target: &mut dyn HostValue,
        hooks: bool,
    ) -> Result<(), Diagnostic> {
        if let Some(inner) = target.deref_alloc() {
            return self.decode_block(scope, body, block, inner, hooks);
        }
        let span = block.map(|b| b.span).unwrap_or_default();

        if hooks {
            if let Some(unmarshaler) = target.unmarshaler() {
                let mut inner = |into: &mut dyn HostValue| -> Result<(), HookError> {
                    self.decode_block(scope, body, block, into, false)
                        .map_err(|d| Box::new(d) as HookError)
                };
                let result = unmarshaler.unmarshal_river(&mut inner);
                return result.map_err(|e| self.hook_diagnostic(e, span));
            }
        }

        let name = target.type_of().name;
        if target.record().is_none() {
            panic!("river: can only evaluate blocks into records, got {name}");
        }
        if hooks {
            if let Some(defaulter) = target.defaulter() {
                defaulter.set_to_default();
            }
        }

        let Some(record) = target.record_mut() else {
            panic!("river: can only evaluate blocks into records, got {name}");
        };
        let info = tag_info(record);
        trace!(record = name, statements = body.len(), "decoding body");

        self.nested(span, |session| {
            if let Some(block) = block {
                decode_label(record, &info, block)?;
            }
            session.decode_statements(scope, body, block, record, &info)
        })?;

        if hooks {
            if let Some(validator) = target.validator() {
                validator
                    .validate()
                    .map_err(|e| self.hook_diagnostic(e, span))?;
            }
        }
        Ok(())
    }

    fn decode_statements(
        &mut self,
        scope: Option<&Scope>,
        body: &'a Body,
        block: Option<&'a BlockStatement>,
        record: &mut dyn Record,
        info: &TagInfo,
    ) -> Result<(), Diagnostic> {
        let counts = BlockCounts::count(body, info);
        let mut seen_attrs: HashSet<&str> = HashSet::new();
        // 値が与えられたフィールド (full name)
        let mut seen: HashSet<String> = HashSet::new();

        for (i, stmt) in body.iter().enumerate() {
            match stmt {
                Statement::Attribute(attr) => {
                    let name = attr.name.name.as_str();
                    if !seen_attrs.insert(name) {
                        return Err(Diagnostic::new(
                            stmt.span(),
                            format!("attribute {name:?} may only be provided once"),
                        ));
                    }
                    let Some(field) = info.lookup.get(name) else {
                        return Err(Diagnostic::new(
                            stmt.span(),
                            format!("unrecognized attribute name {name:?}"),
                        ));
                    };
                    if !field.is_attr() {
                        return Err(Diagnostic::new(
                            stmt.span(),
                            format!("{name:?} must be a block, but is used as an attribute"),
                        ));
                    }
                    seen.insert(field.full_name());

                    let value = self.evaluate_expr(scope, &attr.value)?;
                    decode(&value, field_mut(record, &field.index))
                        .map_err(|e| self.decorate(&e, Some(&attr.value)))?;
                }

                Statement::Block(child) => {
                    let name = child.full_name();
                    let position = counts.position(i);
                    if let Some(member) = info.enums.get(&name) {
                        let group = member.enum_field.full_name();
                        let first = seen.insert(group.clone());
                        self.decode_enum_block(scope, child, record, member, counts.total(&group), position, first)?;
                        continue;
                    }

                    let field = match info.lookup.get(&name) {
                        Some(field) if !field.is_enum() => field,
                        _ => {
                            return Err(Diagnostic::new(
                                child.name_span,
                                format!("unrecognized block name {name:?}"),
                            ))
                        }
                    };
                    if field.is_attr() {
                        return Err(Diagnostic::new(
                            child.name_span,
                            format!("{name:?} must be an attribute, but is used as a block"),
                        ));
                    }
                    let first = seen.insert(name.clone());
                    let count = counts.total(&name);

                    let slot = field_mut(record, &field.index);
                    if let Some(sequence) = slot.sequence_mut() {
                        if let Some(len) = sequence.fixed_len() {
                            if len != count {
                                return Err(Diagnostic::new(
                                    child.span,
                                    format!(
                                        "block {name:?} must be specified exactly {len} times, but was specified {count} times"
                                    ),
                                ));
                            }
                        }
                        if first {
                            sequence.reset(count);
                        }
                        let element = sequence.element_mut(position);
                        self.decode_block(scope, &child.body, Some(child), element, true)?;
                    } else {
                        if !first {
                            return Err(Diagnostic::new(
                                child.span,
                                format!("block {name:?} may only be specified once"),
                            ));
                        }
                        self.decode_block(scope, &child.body, Some(child), slot, true)?;
                    }
                }
            }
        }

        for field in info.fields.iter() {
            if field.is_label() || field.is_optional() || seen.contains(&field.full_name()) {
                continue;
            }
            let kind = if field.is_attr() { "attribute" } else { "block" };
            return Err(at(
                block.map(|b| b.span),
                format!("missing required {kind} {:?}", field.full_name()),
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_enum_block(
        &mut self,
        scope: Option<&Scope>,
        child: &'a BlockStatement,
        record: &mut dyn Record,
        member: &EnumBlock,
        count: usize,
        position: usize,
        first: bool,
    ) -> Result<(), Diagnostic> {
        let slot = field_mut(record, &member.enum_field.index);
        let name = slot.type_of().name;
        let Some(sequence) = slot.sequence_mut() else {
            panic!("river: enum field of type {name} is not a sequence");
        };
        if let Some(len) = sequence.fixed_len() {
            if len != count {
                return Err(Diagnostic::new(
                    child.span,
                    format!(
                        "block {:?} must be specified exactly {len} times, but was specified {count} times",
                        member.enum_field.full_name()
                    ),
                ));
            }
        }
        if first {
            sequence.reset(count);
        }

        let element = sequence.element_mut(position);
        let element_name = element.type_of().name;
        let Some(element) = element.record_mut() else {
            panic!("river: enum element of type {element_name} is not a record");
        };
        let target = field_mut(element, &member.block_field.index);
        self.decode_block(scope, &child.body, Some(child), target, true)
    }
}

fn decode_label(record: &mut dyn Record, info: &TagInfo, block: &BlockStatement) -> Result<(), Diagnostic> {
    let label = block.label.as_deref().unwrap_or_default();
    match &info.label {
        Some(_) if label.is_empty() => Err(Diagnostic::new(
            block.name_span,
            format!("block {:?} requires non-empty label", block.full_name()),
        )),
        Some(field) => decode(&Value::from(label), field_mut(record, &field.index))
            .map_err(|e| Diagnostic::new(block.label_span, e.to_string())),
        None if !label.is_empty() => {
            let span = if block.label_span.is_valid() {
                block.label_span
            } else {
                block.name_span
            };
            Err(Diagnostic::new(
                span,
                format!("block {:?} does not support specifying labels", block.full_name()),
            ))
        }
        None => Ok(()),
    }
}
