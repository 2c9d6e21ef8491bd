//! Structural schema descriptor for form types.
//!
//! A form type describes its shape once as a [`Schema`]; the allowed write
//! pointers are then enumerated from it instead of being listed by hand.

use crate::{AllowedPaths, Pointer, ARRAY_WILDCARD, MAP_WILDCARD};

/// Shape of a form value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Schema {
    /// Any leaf value (string, number, bool, or an opaque value).
    Scalar,
    /// A record with named fields, in declaration order.
    Object(Vec<(String, Schema)>),
    /// A homogeneous list.
    Array(Box<Schema>),
    /// A string-keyed map.
    Map(Box<Schema>),
}

impl Schema {
    /// Build an object schema from `(name, schema)` pairs.
    pub fn object<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Schema)>,
        S: Into<String>,
    {
        Schema::Object(
            fields
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
        )
    }

    /// Build an array schema.
    #[inline]
    pub fn array(element: Schema) -> Self {
        Schema::Array(Box::new(element))
    }

    /// Build a map schema.
    #[inline]
    pub fn map(value: Schema) -> Self {
        Schema::Map(Box::new(value))
    }

    /// Enumerate every writable pointer, in declaration order.
    ///
    /// Each object field yields its own pointer. Arrays yield `<prefix>/-`
    /// and maps yield `<prefix>/*`; both recurse only when their element is
    /// an object. A non-object root yields nothing.
    ///
    /// ```
    /// use formflow_state::Schema;
    ///
    /// let schema = Schema::object([
    ///     ("customer", Schema::Scalar),
    ///     ("items", Schema::array(Schema::object([("amount", Schema::Scalar)]))),
    /// ]);
    /// assert_eq!(
    ///     schema.pointers(),
    ///     ["/customer", "/items", "/items/-", "/items/-/amount"]
    /// );
    /// ```
    pub fn pointers(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Schema::Object(fields) = self {
            collect_fields(fields, &Pointer::root(), &mut out);
        }
        out
    }

    /// The pointers as an allow-list.
    pub fn allowed_paths(&self) -> AllowedPaths {
        self.pointers().into_iter().collect()
    }
}

fn collect_fields(fields: &[(String, Schema)], prefix: &Pointer, out: &mut Vec<String>) {
    for (name, schema) in fields {
        let path = prefix.child(name.as_str());
        out.push(path.to_string());
        collect(schema, &path, out);
    }
}

fn collect(schema: &Schema, prefix: &Pointer, out: &mut Vec<String>) {
    match schema {
        Schema::Scalar => {}
        Schema::Object(fields) => collect_fields(fields, prefix, out),
        Schema::Array(element) => collect_container(element, prefix.child(ARRAY_WILDCARD), out),
        Schema::Map(value) => collect_container(value, prefix.child(MAP_WILDCARD), out),
    }
}

fn collect_container(element: &Schema, path: Pointer, out: &mut Vec<String>) {
    out.push(path.to_string());
    if let Schema::Object(fields) = element {
        collect_fields(fields, &path, out);
    }
}
