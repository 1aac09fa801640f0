//! Distributed class schema: fields, type signatures, and field policies.
//!
//! A schema is built once from a set of named class definitions and is
//! immutable afterwards. Ids are derived from names, never from insertion
//! order:
//!
//! - class ids enumerate the class names in sorted order,
//! - field ids enumerate a class's field names in sorted order.
//!
//! Two processes that load the same definitions therefore agree on every
//! class id, every field id, and every class's *storage map* (the ordered
//! subset of fields whose values the state server keeps).
//!
//! # Field policy
//!
//! Each field carries a [`FieldPolicy`] bitmask made of three groups:
//!
//! ```text
//! origin       CLIENT_SEND | OWNER_SEND | AUTHORITY_SEND      who may write
//! propagation  CLIENT_RECEIVE | OWNER_RECEIVE | AUTHORITY_RECEIVE  who hears it
//! storage      RAM | PERSIST                                  is it kept
//! ```
//!
//! Exactly one propagation bit and at least one origin bit must be set;
//! anything else is rejected with a [`SchemaError`] when the schema is
//! built.

use std::collections::{BTreeMap, HashMap};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{ClassId, FieldId, FieldValue, PrimitiveType, SchemaError};

// ---------------------------------------------------------------------------
// FieldPolicy
// ---------------------------------------------------------------------------

bitflags! {
    /// Origin, propagation, and storage bits of a field.
    ///
    /// In human-readable formats (TOML, JSON) the policy is written as flag
    /// names joined with `|`, e.g. `"AUTHORITY_SEND | CLIENT_RECEIVE | RAM"`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FieldPolicy: u16 {
        /// Any client viewing the object may write the field.
        const CLIENT_SEND = 1 << 0;
        /// The object's owner may write the field.
        const OWNER_SEND = 1 << 1;
        /// The object's authority may write the field.
        const AUTHORITY_SEND = 1 << 2;
        /// Updates go to every recipient that currently sees the object.
        const CLIENT_RECEIVE = 1 << 3;
        /// Updates go to the owner only.
        const OWNER_RECEIVE = 1 << 4;
        /// Updates go to the authority only.
        const AUTHORITY_RECEIVE = 1 << 5;
        /// The state server keeps the latest value in memory.
        const RAM = 1 << 6;
        /// The value is tagged for durable storage.
        const PERSIST = 1 << 7;
    }
}

impl FieldPolicy {
    /// All origin bits.
    pub const ORIGIN: FieldPolicy = FieldPolicy::CLIENT_SEND
        .union(FieldPolicy::OWNER_SEND)
        .union(FieldPolicy::AUTHORITY_SEND);

    /// All propagation bits.
    pub const PROPAGATION: FieldPolicy = FieldPolicy::CLIENT_RECEIVE
        .union(FieldPolicy::OWNER_RECEIVE)
        .union(FieldPolicy::AUTHORITY_RECEIVE);

    /// All storage bits.
    pub const STORAGE: FieldPolicy = FieldPolicy::RAM.union(FieldPolicy::PERSIST);

    /// Whether a sender with the given standing may originate a change.
    pub fn permits_origin(self, standing: Standing) -> bool {
        self.contains(FieldPolicy::CLIENT_SEND)
            || (standing.is_owner && self.contains(FieldPolicy::OWNER_SEND))
            || (standing.is_authority
                && self.contains(FieldPolicy::AUTHORITY_SEND))
    }

    /// Where updates of this field are delivered.
    ///
    /// Returns `None` unless exactly one propagation bit is set. Schemas
    /// built through [`Schema::from_definitions`] never contain such a
    /// field.
    pub fn propagation(self) -> Option<Propagation> {
        let bits = self.intersection(FieldPolicy::PROPAGATION);
        if bits == FieldPolicy::CLIENT_RECEIVE {
            Some(Propagation::AllViewers)
        } else if bits == FieldPolicy::OWNER_RECEIVE {
            Some(Propagation::Owner)
        } else if bits == FieldPolicy::AUTHORITY_RECEIVE {
            Some(Propagation::Authority)
        } else {
            None
        }
    }

    /// Whether the state server keeps this field's value.
    pub fn is_stored(self) -> bool {
        self.intersects(FieldPolicy::STORAGE)
    }

    /// Whether an update of this field reaches a viewer with `standing`.
    pub fn reaches(self, standing: Standing) -> bool {
        match self.propagation() {
            Some(Propagation::AllViewers) => true,
            Some(Propagation::Owner) => standing.is_owner,
            Some(Propagation::Authority) => standing.is_authority,
            None => false,
        }
    }
}

/// A sender's relationship to an object, for origin checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Standing {
    /// The sender is the object's owner.
    pub is_owner: bool,
    /// The sender is the object's authority.
    pub is_authority: bool,
}

impl Standing {
    /// Neither owner nor authority.
    pub const STRANGER: Standing = Standing {
        is_owner: false,
        is_authority: false,
    };
}

/// Delivery target of a field update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Every recipient that currently sees the object.
    AllViewers,
    /// The owner only.
    Owner,
    /// The authority only.
    Authority,
}

// ---------------------------------------------------------------------------
// Definitions (serde input)
// ---------------------------------------------------------------------------

/// A field as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Type signature, one tag per position.
    #[serde(default)]
    pub types: Vec<PrimitiveType>,
    /// Origin, propagation, and storage bits.
    pub policy: FieldPolicy,
}

/// A class as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassDefinition {
    /// Fields keyed by name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
}

/// Class definitions keyed by class name.
pub type SchemaDefinition = BTreeMap<String, ClassDefinition>;

// ---------------------------------------------------------------------------
// FieldDef / DClass
// ---------------------------------------------------------------------------

/// A field of a distributed class, with its assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    id: FieldId,
    name: String,
    types: Vec<PrimitiveType>,
    policy: FieldPolicy,
}

impl FieldDef {
    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's type signature.
    pub fn types(&self) -> &[PrimitiveType] {
        &self.types
    }

    pub fn policy(&self) -> FieldPolicy {
        self.policy
    }
}

/// An immutable distributed class: an ordered list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DClass {
    id: ClassId,
    name: String,
    fields: Vec<FieldDef>,
    storage_map: Vec<FieldId>,
}

impl DClass {
    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in id order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field by id.
    pub fn field(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.get(id.0 as usize)
    }

    /// Looks up a field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The ordered ids of the fields with a storage bit set.
    ///
    /// An object of this class stores exactly one value per entry, in this
    /// order.
    pub fn storage_map(&self) -> &[FieldId] {
        &self.storage_map
    }

    /// Position of `field` inside the stored value vector, if stored.
    pub fn storage_index(&self, field: FieldId) -> Option<usize> {
        self.storage_map.iter().position(|id| *id == field)
    }

    /// Checks a stored value vector against the storage map.
    ///
    /// Returns the id of the first stored field whose value does not
    /// conform to its signature. Arity must be checked separately.
    pub fn first_nonconforming(&self, values: &[FieldValue]) -> Option<FieldId> {
        self.storage_map
            .iter()
            .zip(values)
            .find(|(id, value)| {
                let signature = &self.fields[id.0 as usize].types;
                !value.conforms_to(signature)
            })
            .map(|(id, _)| *id)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// The full set of distributed classes known to a process.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    classes: Vec<DClass>,
    by_name: HashMap<String, ClassId>,
}

impl Schema {
    /// Builds a schema, assigning ids by sorted name and validating every
    /// field policy.
    pub fn from_definitions(
        definitions: &SchemaDefinition,
    ) -> Result<Self, SchemaError> {
        let mut classes = Vec::with_capacity(definitions.len());
        let mut by_name = HashMap::with_capacity(definitions.len());

        // BTreeMap iterates in sorted key order, which is what makes the
        // enumeration stable.
        for (class_index, (class_name, class_def)) in
            definitions.iter().enumerate()
        {
            let class_id = ClassId(class_index as u32);
            let mut fields = Vec::with_capacity(class_def.fields.len());
            let mut storage_map = Vec::new();

            for (field_index, (field_name, field_def)) in
                class_def.fields.iter().enumerate()
            {
                validate_policy(class_name, field_name, field_def.policy)?;
                let field_id = FieldId(field_index as u32);
                if field_def.policy.is_stored() {
                    storage_map.push(field_id);
                }
                fields.push(FieldDef {
                    id: field_id,
                    name: field_name.clone(),
                    types: field_def.types.clone(),
                    policy: field_def.policy,
                });
            }

            by_name.insert(class_name.clone(), class_id);
            classes.push(DClass {
                id: class_id,
                name: class_name.clone(),
                fields,
                storage_map,
            });
        }

        Ok(Self { classes, by_name })
    }

    /// Starts a programmatic schema definition.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Looks up a class by id.
    pub fn class(&self, id: ClassId) -> Option<&DClass> {
        self.classes.get(id.0 as usize)
    }

    /// Looks up a class by name.
    pub fn class_by_name(&self, name: &str) -> Option<&DClass> {
        self.by_name.get(name).and_then(|id| self.class(*id))
    }

    /// All classes in id order.
    pub fn classes(&self) -> &[DClass] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

fn validate_policy(
    class: &str,
    field: &str,
    policy: FieldPolicy,
) -> Result<(), SchemaError> {
    if !policy.intersects(FieldPolicy::ORIGIN) {
        return Err(SchemaError::NoOrigin {
            class: class.to_string(),
            field: field.to_string(),
        });
    }
    let propagation = policy.intersection(FieldPolicy::PROPAGATION);
    if propagation.is_empty() {
        return Err(SchemaError::NoPropagation {
            class: class.to_string(),
            field: field.to_string(),
        });
    }
    if propagation.bits().count_ones() > 1 {
        return Err(SchemaError::ConflictingPropagation {
            class: class.to_string(),
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Collects class definitions in code.
///
/// ```rust
/// use agora_protocol::{FieldPolicy, PrimitiveType, Schema};
///
/// let schema = Schema::builder()
///     .field(
///         "avatar",
///         "position",
///         &[PrimitiveType::Float, PrimitiveType::Float],
///         FieldPolicy::AUTHORITY_SEND
///             | FieldPolicy::CLIENT_RECEIVE
///             | FieldPolicy::RAM,
///     )
///     .build()
///     .unwrap();
/// assert_eq!(schema.class_by_name("avatar").unwrap().storage_map().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    definitions: SchemaDefinition,
}

impl SchemaBuilder {
    /// Declares a class, even if it ends up with no fields.
    pub fn class(mut self, class: &str) -> Self {
        self.definitions.entry(class.to_string()).or_default();
        self
    }

    /// Declares a field (and its class, if new).
    pub fn field(
        mut self,
        class: &str,
        field: &str,
        types: &[PrimitiveType],
        policy: FieldPolicy,
    ) -> Self {
        self.definitions
            .entry(class.to_string())
            .or_default()
            .fields
            .insert(
                field.to_string(),
                FieldDefinition {
                    types: types.to_vec(),
                    policy,
                },
            );
        self
    }

    /// Validates the definitions and assigns ids.
    pub fn build(self) -> Result<Schema, SchemaError> {
        Schema::from_definitions(&self.definitions)
    }
}
