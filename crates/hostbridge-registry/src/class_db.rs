//! Class database: host and extension classes, their hierarchy and the
//! descriptor table.
//!
//! Built single-threaded during registration, then read-only. A class is
//! committed as a whole: [`ClassDb::commit`] validates everything before it
//! inserts anything.

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};

use hostbridge_core::{
    ClassHierarchy, ClassHooks, ClassId, ClassRegistration, ConstantRegistration, Descriptor,
    MethodId, MethodRegistration, PropertyGroupRegistration, PropertyRegistration,
    RegistrationError, SignalRegistration, VirtualSignature,
};

/// Root of every class hierarchy.
pub const OBJECT_CLASS: &str = "Object";

/// Host base class of reference-counted objects.
pub const REF_COUNTED_CLASS: &str = "RefCounted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Host,
    Extension,
}

#[derive(Debug)]
struct ClassEntry {
    name: String,
    parent: Option<ClassId>,
    kind: ClassKind,
    /// Every method name callable on the class itself.
    members: FxHashSet<String>,
    methods: FxHashMap<String, MethodId>,
    /// Overridable methods declared by a host class.
    virtuals: FxHashMap<String, VirtualSignature>,
    hooks: Option<ClassHooks>,
}

/// A fully built class, waiting to be committed.
#[derive(Debug)]
pub struct StagedClass {
    pub name: String,
    pub parent: String,
    pub hooks: ClassHooks,
    pub methods: Vec<Descriptor>,
    pub property_groups: Vec<PropertyGroupRegistration>,
    pub properties: Vec<PropertyRegistration>,
    pub signals: Vec<SignalRegistration>,
    pub constants: Vec<ConstantRegistration>,
}

/// What the host's class database must be told about a committed class.
#[derive(Debug, Clone)]
pub struct CommittedClass {
    pub class: ClassRegistration,
    pub methods: Vec<MethodRegistration>,
    pub property_groups: Vec<PropertyGroupRegistration>,
    pub properties: Vec<PropertyRegistration>,
    pub signals: Vec<SignalRegistration>,
    pub constants: Vec<ConstantRegistration>,
}

#[derive(Debug)]
pub struct ClassDb {
    classes: FxHashMap<ClassId, ClassEntry>,
    descriptors: FxHashMap<MethodId, Descriptor>,
}

impl ClassDb {
    /// A database holding the two root host classes.
    pub fn new() -> Self {
        let mut db = Self {
            classes: FxHashMap::default(),
            descriptors: FxHashMap::default(),
        };
        db.insert_host(
            OBJECT_CLASS,
            None,
            &[
                "get_class",
                "is_class",
                "set",
                "get",
                "call",
                "connect",
                "disconnect",
                "emit_signal",
                "has_method",
                "free",
                "notification",
                "to_string",
            ],
        );
        db.insert_host(
            REF_COUNTED_CLASS,
            Some(OBJECT_CLASS),
            &["init_ref", "reference", "unreference", "get_reference_count"],
        );
        db
    }

    fn insert_host(&mut self, name: &str, parent: Option<&str>, methods: &[&str]) {
        self.classes.insert(
            ClassId::from_name(name),
            ClassEntry {
                name: name.to_string(),
                parent: parent.map(ClassId::from_name),
                kind: ClassKind::Host,
                members: methods.iter().map(|m| m.to_string()).collect(),
                methods: FxHashMap::default(),
                virtuals: FxHashMap::default(),
                hooks: None,
            },
        );
    }

    /// Declare a host class and the methods it already provides.
    pub fn add_host_class(
        &mut self,
        name: &str,
        parent: &str,
        methods: &[&str],
    ) -> Result<(), RegistrationError> {
        if self.contains(name) {
            return Err(RegistrationError::DuplicateClass {
                class: name.to_string(),
            });
        }
        if !self.contains(parent) {
            return Err(RegistrationError::UnknownParent {
                class: name.to_string(),
                parent: parent.to_string(),
            });
        }
        self.insert_host(name, Some(parent), methods);
        debug!("host class {name} extends {parent}");
        Ok(())
    }

    /// Declare a virtual method on a host class.
    ///
    /// The name also counts as a member of the class, so plain `method`
    /// registrations of it are skipped like any inherited name.
    pub fn add_host_virtual(
        &mut self,
        class: &str,
        name: &str,
        signature: VirtualSignature,
    ) -> Result<(), RegistrationError> {
        let entry = self
            .classes
            .get_mut(&ClassId::from_name(class))
            .filter(|entry| entry.kind == ClassKind::Host)
            .ok_or_else(|| RegistrationError::UnknownClass {
                class: class.to_string(),
            })?;
        if !entry.members.insert(name.to_string()) {
            return Err(RegistrationError::DuplicateMethod {
                class: class.to_string(),
                method: name.to_string(),
            });
        }
        debug!("host virtual {class}::{name}{signature}");
        entry.virtuals.insert(name.to_string(), signature);
        Ok(())
    }

    /// The nearest declaration of virtual `name` on `class` or an ancestor.
    pub fn find_virtual(&self, class: &str, name: &str) -> Option<&VirtualSignature> {
        self.lineage(class)
            .find_map(|entry| entry.virtuals.get(name))
    }

    fn entry(&self, name: &str) -> Option<&ClassEntry> {
        self.classes.get(&ClassId::from_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn kind(&self, name: &str) -> Option<ClassKind> {
        self.entry(name).map(|entry| entry.kind)
    }

    pub fn parent(&self, name: &str) -> Option<&str> {
        let parent = self.entry(name)?.parent?;
        self.classes.get(&parent).map(|entry| entry.name.as_str())
    }

    /// `name` followed by each of its ancestors.
    fn lineage<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a ClassEntry> + use<'a> {
        let limit = self.classes.len();
        let mut next = self.entry(name);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent.and_then(|id| self.classes.get(&id));
            Some(current)
        })
        .take(limit)
    }

    /// True if `class` or any ancestor already defines `member`.
    pub fn ancestor_defines(&self, class: &str, member: &str) -> bool {
        self.lineage(class)
            .any(|entry| entry.members.contains(member))
    }

    /// Whether instances of `class` are reference counted.
    pub fn is_refcounted(&self, class: &str) -> bool {
        self.lineage(class)
            .any(|entry| entry.name == REF_COUNTED_CLASS)
    }

    /// Validate and insert a staged class.
    ///
    /// Nothing is inserted if any check fails.
    pub fn commit(&mut self, staged: StagedClass) -> Result<CommittedClass, RegistrationError> {
        if self.contains(&staged.name) {
            return Err(RegistrationError::DuplicateClass { class: staged.name });
        }
        if !self.contains(&staged.parent) {
            return Err(RegistrationError::UnknownParent {
                class: staged.name,
                parent: staged.parent,
            });
        }
        let mut members = FxHashSet::default();
        for descriptor in &staged.methods {
            if !members.insert(descriptor.name.clone())
                || self.descriptors.contains_key(&descriptor.id)
            {
                return Err(RegistrationError::DuplicateMethod {
                    class: staged.name,
                    method: descriptor.name.clone(),
                });
            }
        }

        let refcounted = self.is_refcounted(&staged.parent);
        let committed = CommittedClass {
            class: ClassRegistration {
                name: staged.name.clone(),
                parent: staged.parent.clone(),
                refcounted,
            },
            methods: staged
                .methods
                .iter()
                .map(Descriptor::registration)
                .collect(),
            property_groups: staged.property_groups,
            properties: staged.properties,
            signals: staged.signals,
            constants: staged.constants,
        };

        let methods = staged
            .methods
            .iter()
            .map(|descriptor| (descriptor.name.clone(), descriptor.id))
            .collect();
        for descriptor in staged.methods {
            self.descriptors.insert(descriptor.id, descriptor);
        }
        self.classes.insert(
            ClassId::from_name(&staged.name),
            ClassEntry {
                name: staged.name.clone(),
                parent: Some(ClassId::from_name(&staged.parent)),
                kind: ClassKind::Extension,
                members,
                methods,
                virtuals: FxHashMap::default(),
                hooks: Some(staged.hooks),
            },
        );
        info!(
            "registered class {} ({} methods)",
            staged.name,
            committed.methods.len()
        );
        Ok(committed)
    }

    pub fn descriptor(&self, id: MethodId) -> Option<&Descriptor> {
        self.descriptors.get(&id)
    }

    /// Look a method up by name on `class` and its extension ancestors.
    pub fn find_method(&self, class: &str, method: &str) -> Option<&Descriptor> {
        self.lineage(class)
            .find_map(|entry| entry.methods.get(method))
            .and_then(|id| self.descriptors.get(id))
    }

    pub fn hooks(&self, class: &str) -> Option<&ClassHooks> {
        self.entry(class)?.hooks.as_ref()
    }

    /// Descriptors registered directly on `class`.
    pub fn methods_of(&self, class: &str) -> Vec<&Descriptor> {
        let Some(entry) = self.entry(class) else {
            return Vec::new();
        };
        let mut methods: Vec<_> = entry
            .methods
            .values()
            .filter_map(|id| self.descriptors.get(id))
            .collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    pub fn method_count(&self) -> usize {
        self.descriptors.len()
    }
}

impl Default for ClassDb {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassHierarchy for ClassDb {
    fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        class == ancestor || self.lineage(class).any(|entry| entry.name == ancestor)
    }
}
