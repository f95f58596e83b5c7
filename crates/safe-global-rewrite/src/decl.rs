//! Declaration model.
//!
//! A small, host-agnostic view of a declaration. The rewriter only ever
//! looks at the shape of this tree; anything that belongs to the host
//! language (types, expressions, attributes, source locations) is carried
//! around as an opaque node supplied by a [`Host`].
use std::fmt;

/// The opaque node types a host language plugs into the model.
pub trait Host: Clone + fmt::Debug {
    /// Source location used to anchor diagnostics.
    type Span: Clone + fmt::Debug;
    /// An attribute that is carried over verbatim.
    type Attribute: Clone + fmt::Debug;
    /// A modifier the model has no name for.
    type Modifier: Clone + fmt::Debug;
    type Type: Clone + fmt::Debug;
    type Expr: Clone + fmt::Debug;
}

/// A declaration the attribute may have been applied to.
#[derive(Clone, Debug)]
pub enum Decl<H: Host> {
    Variable(VariableDecl<H>),
    Function { name: String, span: H::Span },
    Type { name: String, span: H::Span },
    Other { kind: String, span: H::Span },
}

impl<H: Host> Decl<H> {
    /// A human readable name for the kind of declaration.
    pub fn kind(&self) -> &str {
        match self {
            Decl::Variable(_) => "variable",
            Decl::Function { .. } => "function",
            Decl::Type { .. } => "type",
            Decl::Other { kind, .. } => kind,
        }
    }

    /// The kind, followed by the declaration's name when it has one.
    pub fn description(&self) -> String {
        match self {
            Decl::Function { name, .. } | Decl::Type { name, .. } => {
                format!("{} `{name}`", self.kind())
            }
            other => other.kind().to_string(),
        }
    }

    pub fn span(&self) -> &H::Span {
        match self {
            Decl::Variable(var) => &var.span,
            Decl::Function { span, .. } | Decl::Type { span, .. } | Decl::Other { span, .. } => span,
        }
    }
}

/// How a variable is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingSpecifier {
    /// May be reassigned after initialization.
    Mutable,
    /// Declared exactly once, never reassigned.
    BindOnce,
}

#[derive(Clone, Debug)]
pub struct VariableDecl<H: Host> {
    pub attributes: Vec<Attribute<H>>,
    pub modifiers: Vec<Modifier<H>>,
    pub specifier: BindingSpecifier,
    pub bindings: Vec<Binding<H>>,
    pub span: H::Span,
}

#[derive(Clone, Debug)]
pub struct Attribute<H: Host> {
    /// The attribute's name, without any path qualification.
    pub name: String,
    pub node: H::Attribute,
}

/// A visibility level, ordered from most to least visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Visible within the named scope only.
    Restricted(String),
    /// The most private level the host offers.
    Private,
}

#[derive(Clone, Debug)]
pub enum Modifier<H: Host> {
    Visibility(Visibility),
    /// Storage class qualifier.
    Static,
    /// Anything the rewriter doesn't know how to handle.
    Other {
        name: String,
        node: H::Modifier,
        span: H::Span,
    },
}

impl<H: Host> Modifier<H> {
    pub fn name(&self) -> &str {
        match self {
            Modifier::Visibility(Visibility::Public) => "public",
            Modifier::Visibility(Visibility::Restricted(_)) => "restricted",
            Modifier::Visibility(Visibility::Private) => "private",
            Modifier::Static => "static",
            Modifier::Other { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Binding<H: Host> {
    pub pattern: Pattern<H>,
    pub ty: Option<TypeExpr<H>>,
    pub initializer: Option<Expr<H>>,
}

#[derive(Clone, Debug)]
pub enum Pattern<H: Host> {
    Identifier { name: String, span: H::Span },
    /// Destructuring, wildcards and the like.
    Other { description: String, span: H::Span },
}

impl<H: Host> Pattern<H> {
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Pattern::Identifier { name, .. } => Some(name),
            Pattern::Other { .. } => None,
        }
    }

    pub fn span(&self) -> &H::Span {
        match self {
            Pattern::Identifier { span, .. } | Pattern::Other { span, .. } => span,
        }
    }
}

#[derive(Clone, Debug)]
pub enum TypeExpr<H: Host> {
    Host(H::Type),
    Optional(Box<TypeExpr<H>>),
    /// An optional that is implicitly unwrapped on use.
    ImplicitlyUnwrappedOptional(Box<TypeExpr<H>>),
    /// The global value container holding the inner type.
    Container(Box<TypeExpr<H>>),
}

#[derive(Clone, Debug)]
pub enum Expr<H: Host> {
    Host(H::Expr),
    /// Constructs a container holding the initial value.
    ContainerNew(Box<Expr<H>>),
    /// Constructs a container holding the empty optional.
    ContainerEmpty,
    /// Reads the value held by the named backing container.
    ContainerRead { backing: String },
    /// Writes `value` into the named backing container.
    ContainerWrite { backing: String, value: Box<Expr<H>> },
    /// The value handed to a setter.
    NewValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorKind {
    Get,
    Set,
}

#[derive(Clone, Debug)]
pub struct Accessor<H: Host> {
    pub kind: AccessorKind,
    pub body: Expr<H>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Diagnostic<S> {
    pub id: &'static str,
    pub message: String,
    pub severity: Severity,
    pub span: S,
}

impl fmt::Display for BindingSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindingSpecifier::Mutable => "var",
            BindingSpecifier::BindOnce => "let",
        })
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::Restricted(scope) => write!(f, "restricted({scope})"),
            Visibility::Private => f.write_str("private"),
        }
    }
}

impl<H: Host> fmt::Display for Modifier<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Visibility(vis) => fmt::Display::fmt(vis, f),
            other => f.write_str(other.name()),
        }
    }
}

impl<H: Host> fmt::Display for TypeExpr<H>
where
    H::Type: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Host(ty) => fmt::Display::fmt(ty, f),
            TypeExpr::Optional(inner) => write!(f, "{inner}?"),
            TypeExpr::ImplicitlyUnwrappedOptional(inner) => write!(f, "{inner}!"),
            TypeExpr::Container(inner) => write!(f, "SafeGlobal<{inner}>"),
        }
    }
}

impl<H: Host> fmt::Display for Expr<H>
where
    H::Expr: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Host(expr) => fmt::Display::fmt(expr, f),
            Expr::ContainerNew(initial) => write!(f, "SafeGlobal.new(initial: {initial})"),
            Expr::ContainerEmpty => f.write_str("SafeGlobal.new()"),
            Expr::ContainerRead { backing } => write!(f, "{backing}.read()"),
            Expr::ContainerWrite { backing, value } => write!(f, "{backing}.write({value})"),
            Expr::NewValue => f.write_str("newValue"),
        }
    }
}

impl<H: Host> fmt::Display for Binding<H>
where
    H::Type: fmt::Display,
    H::Expr: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            Pattern::Identifier { name, .. } => f.write_str(name)?,
            Pattern::Other { description, .. } => f.write_str(description)?,
        }
        if let Some(ty) = &self.ty {
            write!(f, ": {ty}")?;
        }
        if let Some(init) = &self.initializer {
            write!(f, " = {init}")?;
        }
        Ok(())
    }
}

impl<H: Host> fmt::Display for VariableDecl<H>
where
    H::Type: fmt::Display,
    H::Expr: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for attr in self.attributes.iter() {
            write!(f, "@{} ", attr.name)?;
        }
        for modifier in self.modifiers.iter() {
            write!(f, "{modifier} ")?;
        }
        write!(f, "{} ", self.specifier)?;
        for (i, binding) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(binding, f)?;
        }
        Ok(())
    }
}

impl<H: Host> fmt::Display for Accessor<H>
where
    H::Expr: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self.kind {
            AccessorKind::Get => "get",
            AccessorKind::Set => "set",
        };
        write!(f, "{keyword} {{ {} }}", self.body)
    }
}


#[cfg(test)]
mod test {
    use super::{text::*, *};

    #[test]
    fn display_variable() {
        let var = variable(BindingSpecifier::Mutable, "dummy", Some(ty("Int")), Some("42"));
        assert_eq!("@safe_global static var dummy: Int = 42", var.to_string());
    }

    #[test]
    fn display_optional_types() {
        let iuo: TypeExpr<Text> = TypeExpr::ImplicitlyUnwrappedOptional(Box::new(ty("Int")));
        assert_eq!("Int!", iuo.to_string());
        let container: TypeExpr<Text> =
            TypeExpr::Container(Box::new(TypeExpr::Optional(Box::new(ty("Int")))));
        assert_eq!("SafeGlobal<Int?>", container.to_string());
    }

    #[test]
    fn decl_kind() {
        let decl: Decl<Text> = Decl::Function {
            name: "main".into(),
            span: (),
        };
        assert_eq!("function", decl.kind());
        assert_eq!("function `main`", decl.description());
        let decl = Decl::Variable(variable(BindingSpecifier::BindOnce, "x", None, None));
        assert_eq!("variable", decl.kind());
    }
}
