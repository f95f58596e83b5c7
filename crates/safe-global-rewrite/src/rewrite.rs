//! Rewrites an annotated variable declaration into a private, container
//! backed peer plus the accessors that forward to it.
//!
//! Both expansions are pure functions of the input declaration. The host
//! calls them separately and each re-derives what it needs.
use snafu::prelude::*;

use crate::decl::*;

/// Prepended to the original name to form the backing declaration's name.
pub const BACKING_PREFIX: char = '_';

/// Name of the attribute that triggers the rewrite.
pub const ATTRIBUTE_NAME: &str = "safe_global";

/// Diagnostic id for modifiers the rewriter keeps but doesn't understand.
pub const UNKNOWN_MODIFIER_ID: &str = "safe_global::unknown_modifier";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "#[{ATTRIBUTE_NAME}] can only be applied to a variable declaration, found a {kind}"
    ))]
    NotAVariable { kind: String },

    #[snafu(display(
        "#[{ATTRIBUTE_NAME}] can only be applied to a variable bound to a simple identifier, \
         found {pattern}"
    ))]
    NotAnIdentifierPattern { pattern: String },

    #[snafu(display("Internal error in #[{ATTRIBUTE_NAME}]: {note}"))]
    Internal { note: &'static str },
}

/// The backing declaration, plus anything worth telling the user about it.
#[derive(Clone, Debug)]
pub struct PeerExpansion<H: Host> {
    pub declaration: VariableDecl<H>,
    pub diagnostics: Vec<Diagnostic<H::Span>>,
}

pub fn backing_name(name: &str) -> String {
    format!("{BACKING_PREFIX}{name}")
}

/// Turns an implicitly unwrapped optional into a plain optional.
///
/// Every other type is returned as is.
pub fn normalized_type<H: Host>(ty: &TypeExpr<H>) -> TypeExpr<H> {
    match ty {
        TypeExpr::ImplicitlyUnwrappedOptional(inner) => TypeExpr::Optional(inner.clone()),
        other => other.clone(),
    }
}

fn as_variable<H: Host>(decl: &Decl<H>) -> Result<&VariableDecl<H>, Error> {
    match decl {
        Decl::Variable(var) => Ok(var),
        other => NotAVariableSnafu {
            kind: other.description(),
        }
        .fail(),
    }
}

fn rewrite_binding<H: Host>(binding: &Binding<H>) -> Result<Binding<H>, Error> {
    let (name, span) = match &binding.pattern {
        Pattern::Identifier { name, span } => (name, span),
        Pattern::Other { description, .. } => {
            return NotAnIdentifierPatternSnafu {
                pattern: description.as_str(),
            }
            .fail();
        }
    };
    let ty = binding
        .ty
        .as_ref()
        .map(|ty| TypeExpr::Container(Box::new(normalized_type(ty))));
    let initializer = match &binding.initializer {
        Some(initial) => Expr::ContainerNew(Box::new(initial.clone())),
        None => Expr::ContainerEmpty,
    };
    Ok(Binding {
        pattern: Pattern::Identifier {
            name: backing_name(name),
            span: span.clone(),
        },
        ty,
        initializer: Some(initializer),
    })
}

fn unknown_modifier<S: Clone>(name: &str, span: &S) -> Diagnostic<S> {
    Diagnostic {
        id: UNKNOWN_MODIFIER_ID,
        message: format!(
            "Ignored modifier \"{name}\": {ATTRIBUTE_NAME} does not preserve its semantics on the \
             backing declaration"
        ),
        severity: Severity::Warning,
        span: span.clone(),
    }
}

/// Produces the backing declaration for an annotated variable.
pub fn expand_peer<H: Host>(decl: &Decl<H>) -> Result<PeerExpansion<H>, Error> {
    let var = as_variable(decl)?;
    ensure!(
        !var.bindings.is_empty(),
        InternalSnafu {
            note: "the declaration has no bindings"
        }
    );

    let bindings = var
        .bindings
        .iter()
        .map(rewrite_binding)
        .collect::<Result<Vec<_>, _>>()?;

    let attributes = var
        .attributes
        .iter()
        .filter(|attr| attr.name != ATTRIBUTE_NAME)
        .cloned()
        .collect();

    let mut diagnostics = vec![];
    let mut modifiers = vec![Modifier::Visibility(Visibility::Private)];
    for modifier in var.modifiers.iter() {
        match modifier {
            // Visibility is reapplied explicitly above.
            Modifier::Visibility(_) => {}
            Modifier::Static => modifiers.push(Modifier::Static),
            Modifier::Other { name, span, .. } => {
                log::trace!("keeping unrecognized modifier '{name}'");
                diagnostics.push(unknown_modifier(name, span));
                modifiers.push(modifier.clone());
            }
        }
    }

    let declaration = VariableDecl {
        attributes,
        modifiers,
        // The container is mutated in place, the binding never is.
        specifier: BindingSpecifier::BindOnce,
        bindings,
        span: var.span.clone(),
    };
    log::trace!(
        "expanded peer with {} binding(s), {} diagnostic(s)",
        declaration.bindings.len(),
        diagnostics.len()
    );
    Ok(PeerExpansion {
        declaration,
        diagnostics,
    })
}

/// Produces the accessors that forward to the backing declaration.
///
/// A getter is always produced. A setter is produced only for mutable
/// declarations.
pub fn expand_accessors<H: Host>(decl: &Decl<H>) -> Result<Vec<Accessor<H>>, Error> {
    let var = as_variable(decl)?;
    let [binding] = var.bindings.as_slice() else {
        return InternalSnafu {
            note: "accessors require exactly one binding",
        }
        .fail();
    };
    let name = binding.pattern.identifier().context(InternalSnafu {
        note: "accessors require an identifier binding",
    })?;
    let backing = backing_name(name);

    let mut accessors = vec![Accessor {
        kind: AccessorKind::Get,
        body: Expr::ContainerRead {
            backing: backing.clone(),
        },
    }];
    if var.specifier == BindingSpecifier::Mutable {
        accessors.push(Accessor {
            kind: AccessorKind::Set,
            body: Expr::ContainerWrite {
                backing,
                value: Box::new(Expr::NewValue),
            },
        });
    }
    Ok(accessors)
}
