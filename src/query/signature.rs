//! Signature declaration and preprocessing.

use crate::entity::{Entity, EntityIndex};
use crate::types::Type;

/// Where a signature column's component comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// The matched table's own row.
    This,
    /// Like `This`, but the component must be owned (never satisfied via a prefab).
    Owned,
    /// Satisfied only through a prefab ancestor, never owned directly.
    Shared,
    /// A specific, named entity rather than the matched table.
    Entity(Entity),
    /// The matched table's `CHILDOF` parent.
    Container,
    /// Like `Container`, but walks the whole container hierarchy (depth ordering).
    Cascade,
    /// The system that owns the query.
    System,
    /// A tag reference with no data (column always reads as 0/absent).
    Empty,
}

/// How a signature column's target participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Optional,
    Not,
}

/// What a signature column is matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single required (or excluded, or optional) component.
    Component(Entity),
    /// For `Or`: any one of these satisfies the column.
    Alternatives(Type),
}

#[derive(Debug, Clone)]
pub struct SignatureColumn {
    pub source: SourceKind,
    pub operator: Operator,
    pub target: Target,
}

impl SignatureColumn {
    pub fn new(source: SourceKind, operator: Operator, target: Target) -> Self {
        Self {
            source,
            operator,
            target,
        }
    }
}

/// The compiled form of a query declaration: an ordered list of columns plus the
/// aggregates preprocessing derives from them.
#[derive(Debug, Clone)]
pub struct Signature {
    pub(crate) columns: Vec<SignatureColumn>,
    pub and_from_self: Type,
    pub and_from_owned: Type,
    pub and_from_shared: Type,
    pub and_from_system: Type,
    pub not_from_self: Type,
    pub not_from_owned: Type,
    pub not_from_shared: Type,
    pub not_from_component: Type,
    /// 1-based position of the `Cascade` column, if any.
    pub cascade_column: Option<usize>,
    /// Whether this query opts in to matching tables carrying the `Disabled` tag.
    pub include_disabled: bool,
    /// Whether this query opts in to matching tables carrying the `Prefab` tag.
    pub include_prefabs: bool,
}

impl Signature {
    /// Preprocess `columns` into a [`Signature`], registering every `Entity(e)` source in
    /// the entity index's watch set along the way.
    pub fn compile(columns: Vec<SignatureColumn>, entities: &mut dyn EntityIndex) -> Self {
        let mut and_from_self = Vec::new();
        let mut and_from_owned = Vec::new();
        let mut and_from_shared = Vec::new();
        let mut and_from_system = Vec::new();
        let mut not_from_self = Vec::new();
        let mut not_from_owned = Vec::new();
        let mut not_from_shared = Vec::new();
        let mut not_from_component = Vec::new();
        let mut cascade_column = None;

        for (idx, column) in columns.iter().enumerate() {
            if let SourceKind::Entity(e) = column.source {
                entities.watch(e);
            }
            if matches!(column.source, SourceKind::Cascade) && cascade_column.is_none() {
                cascade_column = Some(idx + 1);
            }

            let Target::Component(component) = column.target else {
                continue;
            };

            match column.operator {
                Operator::Not => match column.source {
                    SourceKind::Entity(_) => {}
                    SourceKind::This => not_from_self.push(component),
                    SourceKind::Owned => not_from_owned.push(component),
                    SourceKind::Shared => not_from_shared.push(component),
                    _ => not_from_component.push(component),
                },
                Operator::And => match column.source {
                    SourceKind::This => and_from_self.push(component),
                    SourceKind::Owned => and_from_owned.push(component),
                    SourceKind::Shared => and_from_shared.push(component),
                    SourceKind::System => and_from_system.push(component),
                    _ => {}
                },
                Operator::Or | Operator::Optional => {}
            }
        }

        Self {
            columns,
            and_from_self: Type::new(and_from_self),
            and_from_owned: Type::new(and_from_owned),
            and_from_shared: Type::new(and_from_shared),
            and_from_system: Type::new(and_from_system),
            not_from_self: Type::new(not_from_self),
            not_from_owned: Type::new(not_from_owned),
            not_from_shared: Type::new(not_from_shared),
            not_from_component: Type::new(not_from_component),
            cascade_column,
            include_disabled: false,
            include_prefabs: false,
        }
    }

    pub fn columns(&self) -> &[SignatureColumn] {
        &self.columns
    }
}
