//! # Type Arena
//!
//! Owns every [`Type`] node. All graph walks (feature propagation, recursion
//! detection, validation planning, structural equality) are arena methods
//! that carry their own walk state, so cycles through pointers terminate.

use crate::error::{AppError, AppResult};
use crate::ir::types::{Feature, Kind, NilSemantic, PrimitiveType, Type, TypeId};
use crate::naming::pascal;
use crate::spec::{SchemaArena, SchemaType};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::ops::{Index, IndexMut};

/// JSON value kind a type encodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum JsonKind {
    /// `{...}`
    Object,
    /// `[...]`
    Array,
    /// `"..."`
    String,
    /// A number token.
    Number,
    /// A number token without fraction or exponent.
    Integer,
    /// `true` / `false`
    Bool,
    /// `null`
    Null,
}

/// Arena length and feature log length at a savepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    len: usize,
    features: usize,
}

/// Storage for type nodes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TypeArena {
    types: Vec<Type>,
    /// Features added to nodes, in order, so a rollback can take them back.
    #[serde(skip)]
    feature_log: Vec<(TypeId, Feature)>,
}

impl TypeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its id.
    pub fn alloc(&mut self, t: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(t);
        id
    }

    /// Returns the node, if `id` is live.
    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.index())
    }

    /// Returns the node mutably, if `id` is live.
    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut Type> {
        self.types.get_mut(id.index())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// No nodes.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All nodes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeId(i as u32), t))
    }

    /// Records the current state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            len: self.types.len(),
            features: self.feature_log.len(),
        }
    }

    /// Drops every node allocated after `cp`, every interface link to them
    /// and every feature added since.
    pub fn rollback(&mut self, cp: Checkpoint) {
        let Checkpoint { len, features } = cp;
        let start = features.min(self.feature_log.len());
        for (id, feature) in self.feature_log.drain(start..) {
            if let Some(t) = self.types.get_mut(id.index()) {
                t.features.remove(&feature);
            }
        }
        self.types.truncate(len);
        let live = |id: &TypeId| id.index() < len;
        for t in &mut self.types {
            t.implements.retain(live);
            if let Kind::Interface {
                implementations, ..
            } = &mut t.kind
            {
                implementations.retain(live);
            }
        }
    }

    fn live(&self, id: TypeId) -> bool {
        id != TypeId::PENDING && id.index() < self.types.len()
    }

    /// Makes `t` implement `iface`, updating both sides.
    pub fn implement(&mut self, t: TypeId, iface: TypeId) -> AppResult<()> {
        self.check_implement(t, iface)?;
        self[t].implements.insert(iface);
        if let Kind::Interface {
            implementations, ..
        } = &mut self[iface].kind
        {
            implementations.insert(t);
        }
        Ok(())
    }

    /// Removes the link between `t` and `iface` on both sides.
    pub fn unimplement(&mut self, t: TypeId, iface: TypeId) -> AppResult<()> {
        self.check_implement(t, iface)?;
        self[t].implements.remove(&iface);
        if let Kind::Interface {
            implementations, ..
        } = &mut self[iface].kind
        {
            implementations.remove(&t);
        }
        Ok(())
    }

    fn check_implement(&self, t: TypeId, iface: TypeId) -> AppResult<()> {
        let (ty, it) = (&self[t], &self[iface]);
        if !ty.can_have_methods() || !it.is_interface() {
            return Err(AppError::General(format!(
                "{} {:?} cannot implement {} {:?}",
                ty.tag(),
                ty.name,
                it.tag(),
                it.name
            )));
        }
        Ok(())
    }

    /// Adds a method name to an interface.
    pub fn add_method(&mut self, iface: TypeId, name: impl Into<String>) {
        if let Kind::Interface { methods, .. } = &mut self[iface].kind {
            methods.insert(name.into());
        }
    }

    /// Methods of an interface, or the union of methods of the interfaces a
    /// type implements. Sorted.
    pub fn methods(&self, id: TypeId) -> Vec<String> {
        match &self[id].kind {
            Kind::Interface { methods, .. } => methods.iter().cloned().collect(),
            _ => {
                let mut all = BTreeSet::new();
                for iface in &self[id].implements {
                    if let Kind::Interface { methods, .. } = &self[*iface].kind {
                        all.extend(methods.iter().cloned());
                    }
                }
                all.into_iter().collect()
            }
        }
    }

    /// Implementations of an interface, sorted by name.
    pub fn implementations(&self, iface: TypeId) -> Vec<TypeId> {
        let mut result: Vec<TypeId> = match &self[iface].kind {
            Kind::Interface {
                implementations, ..
            } => implementations.iter().copied().collect(),
            _ => Vec::new(),
        };
        result.sort_by(|a, b| self[*a].name.cmp(&self[*b].name));
        result
    }

    /// Direct children reached by feature propagation.
    fn payload(&self, id: TypeId) -> Vec<TypeId> {
        match &self[id].kind {
            Kind::Alias { to } | Kind::Pointer { to, .. } => vec![*to],
            Kind::Array { item, .. } => vec![*item],
            Kind::Generic { of, .. } => vec![*of],
            Kind::Map { item, fields, .. } => std::iter::once(*item)
                .chain(fields.iter().map(|f| f.ty))
                .collect(),
            Kind::Struct { fields, .. } => fields.iter().map(|f| f.ty).collect(),
            Kind::Sum { of, .. } => of.clone(),
            _ => Vec::new(),
        }
    }

    /// Adds `feature` to `id` and everything its payload reaches.
    pub fn add_feature(&mut self, id: TypeId, feature: Feature) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if !self.live(id) {
                continue;
            }
            if !self[id].features.insert(feature) {
                continue;
            }
            self.feature_log.push((id, feature));
            stack.extend(self.payload(id));
        }
    }

    /// JSON value kind of a type; `None` for kinds without a single kind
    /// (any, sums, interfaces, streams).
    pub fn json_kind(&self, id: TypeId) -> Option<JsonKind> {
        let t = &self[id];
        if t.is_numeric() {
            return Some(JsonKind::Number);
        }
        match &t.kind {
            Kind::Array { .. } => Some(JsonKind::Array),
            Kind::Struct { .. } | Kind::Map { .. } => Some(JsonKind::Object),
            Kind::Generic { of, .. } => self.json_kind(*of),
            Kind::Alias { to } => self.json_kind(*to),
            Kind::Primitive { primitive, .. } | Kind::Enum { primitive, .. } => {
                use PrimitiveType::*;
                match primitive {
                    Bool => Some(JsonKind::Bool),
                    Null => Some(JsonKind::Null),
                    String | Time | Duration | Uuid | Ip | Url | Mac | ByteSlice => {
                        Some(JsonKind::String)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Whether `target` structurally reaches `owner` through required
    /// paths, i.e. whether storing `target` by value inside `owner` would
    /// make an infinitely sized type.
    pub fn recursive_to(&self, owner: TypeId, target: TypeId) -> bool {
        self.recursive(owner, target, &mut HashSet::new())
    }

    fn recursive(&self, owner: TypeId, target: TypeId, path: &mut HashSet<TypeId>) -> bool {
        use crate::ir::types::TypeKind::*;
        if !self.live(owner) || !self.live(target) {
            return false;
        }
        // Kinds without fields, and kinds that already break recursion.
        let walls = [Primitive, Enum, Any, Pointer, Array, Map, Stream, Interface];
        if self[owner].is(&walls) || self[target].is(&walls) {
            return false;
        }

        if owner == target || self.deep_equal(owner, target) {
            return true;
        }
        if !path.insert(target) {
            return true;
        }

        let found = match &self[target].kind {
            Kind::Alias { to } => self.recursive(owner, *to, path),
            Kind::Generic { of, .. } => self.recursive(owner, *of, path),
            Kind::Struct { fields, .. } => {
                fields.iter().any(|f| self.recursive(owner, f.ty, path))
            }
            Kind::Sum { of, .. } => of.iter().any(|arm| self.recursive(owner, *arm, path)),
            _ => false,
        };
        path.remove(&target);
        found
    }

    /// Whether values of the type must be validated after decoding.
    pub fn need_validation(&self, id: TypeId) -> bool {
        self.need_validation_in(id, &mut HashSet::new())
    }

    fn need_validation_in(&self, id: TypeId, visited: &mut HashSet<TypeId>) -> bool {
        if !self.live(id) || !visited.insert(id) {
            return false;
        }
        let t = &self[id];
        match &t.kind {
            Kind::Primitive { primitive, .. } => {
                if primitive.is_float() {
                    // NaN and Inf are rejected.
                    return true;
                }
                if primitive.is_integer() {
                    return t.validators.int.is_set();
                }
                match primitive {
                    PrimitiveType::String | PrimitiveType::ByteSlice => t.validators.string.is_set(),
                    _ => false,
                }
            }
            Kind::Enum { .. } => true,
            Kind::Alias { to } => self.need_validation_in(*to, visited),
            Kind::Generic { of, .. } => self.need_validation_in(*of, visited),
            Kind::Pointer { to, nil } => {
                *nil == NilSemantic::Invalid || self.need_validation_in(*to, visited)
            }
            Kind::Array { item, nil } => {
                *nil == NilSemantic::Invalid
                    || t.validators.array.is_set()
                    || self.need_validation_in(*item, visited)
            }
            Kind::Struct { fields, .. } => fields
                .iter()
                .any(|f| self.need_validation_in(f.ty, visited)),
            Kind::Map { item, fields, .. } => {
                t.validators.object.is_set()
                    || self.need_validation_in(*item, visited)
                    || fields.iter().any(|f| self.need_validation_in(f.ty, visited))
            }
            Kind::Sum { of, .. } => of.iter().any(|arm| self.need_validation_in(*arm, visited)),
            Kind::Stream | Kind::Interface { .. } | Kind::Any => false,
        }
    }

    /// Structural equality of two nodes, following child ids.
    ///
    /// Pairs already under comparison are assumed equal, so cyclic graphs
    /// compare in finite time.
    pub fn deep_equal(&self, a: TypeId, b: TypeId) -> bool {
        self.deep_equal_in(a, b, &mut HashSet::new())
    }

    fn deep_equal_in(&self, a: TypeId, b: TypeId, seen: &mut HashSet<(TypeId, TypeId)>) -> bool {
        if a == b {
            return true;
        }
        if !self.live(a) || !self.live(b) {
            return false;
        }
        if !seen.insert((a, b)) {
            return true;
        }
        let (ta, tb) = (&self[a], &self[b]);
        if ta.name != tb.name
            || ta.schema != tb.schema
            || ta.validators != tb.validators
            || ta.default != tb.default
        {
            return false;
        }
        let mut eq = |x: TypeId, y: TypeId| self.deep_equal_in(x, y, seen);
        match (&ta.kind, &tb.kind) {
            (Kind::Alias { to: x }, Kind::Alias { to: y }) => eq(*x, *y),
            (Kind::Pointer { to: x, nil: n1 }, Kind::Pointer { to: y, nil: n2 }) => {
                n1 == n2 && eq(*x, *y)
            }
            (Kind::Array { item: x, nil: n1 }, Kind::Array { item: y, nil: n2 }) => {
                n1 == n2 && eq(*x, *y)
            }
            (
                Kind::Generic {
                    of: x,
                    variant: v1,
                },
                Kind::Generic {
                    of: y,
                    variant: v2,
                },
            ) => v1 == v2 && eq(*x, *y),
            (
                Kind::Struct {
                    fields: f1,
                    tuple: t1,
                    deny_additional: d1,
                },
                Kind::Struct {
                    fields: f2,
                    tuple: t2,
                    deny_additional: d2,
                },
            ) => {
                t1 == t2
                    && d1 == d2
                    && f1.len() == f2.len()
                    && f1.iter().zip(f2).all(|(x, y)| {
                        x.name == y.name
                            && x.tag == y.tag
                            && x.inline == y.inline
                            && eq(x.ty, y.ty)
                    })
            }
            (
                Kind::Map {
                    item: i1,
                    pattern: p1,
                    fields: f1,
                    deny_additional: d1,
                    allowed_props: a1,
                },
                Kind::Map {
                    item: i2,
                    pattern: p2,
                    fields: f2,
                    deny_additional: d2,
                    allowed_props: a2,
                },
            ) => {
                p1 == p2
                    && d1 == d2
                    && a1 == a2
                    && f1.len() == f2.len()
                    && eq(*i1, *i2)
                    && f1
                        .iter()
                        .zip(f2)
                        .all(|(x, y)| x.name == y.name && x.tag == y.tag && eq(x.ty, y.ty))
            }
            (Kind::Sum { of: o1, spec: s1 }, Kind::Sum { of: o2, spec: s2 }) => {
                s1 == s2 && o1.len() == o2.len() && o1.iter().zip(o2).all(|(x, y)| eq(*x, *y))
            }
            (k1, k2) => k1 == k2,
        }
    }

    /// Postfix used to name wrappers of the type (`OptString`, `NilPetArray`).
    pub fn name_postfix(&self, id: TypeId, schemas: &SchemaArena) -> String {
        let t = &self[id];
        match &t.kind {
            Kind::Primitive { primitive, .. } => {
                if *primitive == PrimitiveType::Null {
                    return "Null".into();
                }
                let Some(schema) = t.schema.map(|s| schemas.get(s)) else {
                    return primitive.as_str().into();
                };
                let is_string = schema.ty == SchemaType::String;
                let typed = |f: &str| {
                    if is_string {
                        format!("String{f}")
                    } else {
                        f.to_string()
                    }
                };
                match schema.format.as_str() {
                    "uuid" => "UUID".into(),
                    "date" => "Date".into(),
                    "time" => "Time".into(),
                    "date-time" => "DateTime".into(),
                    "duration" => "Duration".into(),
                    "ip" => "IP".into(),
                    "ipv4" => "IPv4".into(),
                    "ipv6" => "IPv6".into(),
                    "uri" => "URI".into(),
                    f @ ("int32" | "int64") => {
                        if is_string {
                            format!("String{}", crate::naming::capitalize(f))
                        } else {
                            primitive.as_str().into()
                        }
                    }
                    "unix" | "unix-seconds" => typed("UnixSeconds"),
                    "unix-nano" => typed("UnixNano"),
                    "unix-micro" => typed("UnixMicro"),
                    "unix-milli" => typed("UnixMilli"),
                    _ => primitive.as_str().into(),
                }
            }
            Kind::Array { item, .. } => format!("{}Array", self.name_postfix(*item, schemas)),
            Kind::Any => "Any".into(),
            Kind::Pointer { to, .. } => format!("{}Pointer", self.name_postfix(*to, schemas)),
            _ => t.name.clone(),
        }
    }

    /// Name suffix of a generic wrapper over the type.
    pub fn generic_postfix(&self, id: TypeId, schemas: &SchemaArena) -> String {
        let name = self.name_postfix(id, schemas);
        let name = match name.find('.') {
            Some(idx) if idx > 0 => &name[idx + 1..],
            _ => name.as_str(),
        };
        pascal(&[name])
    }

    /// Human-readable type expression (`[]*Pet`, `string`, `OptInt`).
    pub fn type_expr(&self, id: TypeId) -> String {
        if !self.live(id) {
            return "?".into();
        }
        let t = &self[id];
        match &t.kind {
            Kind::Primitive {
                external: Some(ext),
                ..
            } => ext.clone(),
            Kind::Primitive { primitive, .. } => primitive.as_str().into(),
            Kind::Any => "any".into(),
            Kind::Array { item, .. } => format!("[]{}", self.type_expr(*item)),
            Kind::Pointer { to, .. } => format!("*{}", self.type_expr(*to)),
            _ => t.name.clone(),
        }
    }

    /// Follows aliases and generics down to the payload.
    pub fn underlying(&self, mut id: TypeId) -> TypeId {
        let mut steps = 0;
        while self.live(id) && steps < self.types.len() {
            match &self[id].kind {
                Kind::Alias { to } => id = *to,
                Kind::Generic { of, .. } => id = *of,
                _ => break,
            }
            steps += 1;
        }
        id
    }

    /// Checks that every interface link has its counterpart.
    pub fn check_interfaces(&self) -> AppResult<()> {
        for (id, t) in self.iter() {
            for iface in &t.implements {
                let consistent = matches!(
                    &self[*iface].kind,
                    Kind::Interface { implementations, .. } if implementations.contains(&id)
                );
                if !consistent {
                    return Err(AppError::General(format!(
                        "{:?} implements {:?} without back-reference",
                        t.name, self[*iface].name
                    )));
                }
            }
            if let Kind::Interface {
                implementations, ..
            } = &t.kind
            {
                for imp in implementations {
                    if !self[*imp].implements.contains(&id) {
                        return Err(AppError::General(format!(
                            "{:?} lists {:?} as implementation without back-reference",
                            t.name, self[*imp].name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Index<TypeId> for TypeArena {
    type Output = Type;

    fn index(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }
}

impl IndexMut<TypeId> for TypeArena {
    fn index_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.index()]
    }
}
