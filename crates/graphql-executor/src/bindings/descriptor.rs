use crate::registry::TypeRef;

/// How the values of one schema object type are implemented.
///
/// A descriptor is a static declaration: it names members, it never holds live values. The
/// runtime [`Object`](crate::Object) returned for that type must answer the attributes and
/// methods declared here.
#[derive(Debug, Clone)]
pub struct ImplementationDescriptor {
    pub(crate) type_name: String,
    pub(crate) kind: DescriptorKind,
    pub(crate) attributes: Vec<AttributeDescriptor>,
    pub(crate) methods: Vec<MethodDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DescriptorKind {
    Members,
    /// Every argument-less field is a lookup by field name.
    Map,
}

#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub name: String,
    /// Declared type of the member, checked against the field type when present.
    pub ty: Option<TypeRef>,
}

#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    /// Parameter names, matched against field arguments.
    pub params: Vec<String>,
    /// Whether the method consults the request context or may fail.
    pub takes_context: bool,
    pub ty: Option<TypeRef>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        MethodDescriptor {
            name: name.into(),
            params: Vec::new(),
            takes_context: false,
            ty: None,
        }
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self) -> Self {
        self.takes_context = true;
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.ty = Some(ty);
        self
    }
}

impl ImplementationDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        ImplementationDescriptor {
            type_name: type_name.into(),
            kind: DescriptorKind::Members,
            attributes: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// A map-backed implementation, such as [`MapObject`](crate::MapObject).
    pub fn map(type_name: impl Into<String>) -> Self {
        ImplementationDescriptor {
            kind: DescriptorKind::Map,
            ..Self::new(type_name)
        }
    }

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(AttributeDescriptor {
            name: name.into(),
            ty: None,
        });
        self
    }

    #[must_use]
    pub fn typed_attribute(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.attributes.push(AttributeDescriptor {
            name: name.into(),
            ty: Some(ty),
        });
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_map(&self) -> bool {
        self.kind == DescriptorKind::Map
    }
}
