//! Rust as a host for the declaration model.
//!
//! Lowers `static` items into [`Decl`]s and lifts rewritten declarations back
//! into Rust items:
//!
//! ```rust,ignore
//! #[safe_global]
//! pub static mut COUNTER: u32 = 0;
//! ```
//!
//! becomes
//!
//! ```rust,ignore
//! #[allow(non_camel_case_types)]
//! #[derive(Clone, Copy, Debug)]
//! pub struct COUNTER;
//! impl COUNTER {
//!     #[inline]
//!     pub fn get(&self) -> u32 { _COUNTER.get() }
//!     #[inline]
//!     pub fn set(&self, new_value: u32) { _COUNTER.set(new_value) }
//! }
//! static _COUNTER: ::safe_global::SafeGlobal<u32> = ::safe_global::SafeGlobal::new(0);
//! ```
use proc_macro2::{Span, TokenStream};
use quote::{ToTokens, quote};
use syn::{Token, ext::IdentExt, parse::Parse, spanned::Spanned};

use crate::{
    decl::*,
    rewrite::{self, ATTRIBUTE_NAME},
};

/// Attributes that change how a static is stored or linked.
///
/// The backing static keeps them, but what they meant for the original
/// value is lost, so they are treated as unrecognized modifiers.
pub const STORAGE_ATTRIBUTES: &[&str] = &[
    "no_mangle",
    "export_name",
    "link_section",
    "used",
    "thread_local",
];

#[derive(Clone, Debug)]
pub struct RustSyntax;

impl Host for RustSyntax {
    type Span = Span;
    type Attribute = syn::Attribute;
    type Modifier = syn::Attribute;
    type Type = syn::Type;
    type Expr = syn::Expr;
}

pub fn default_crate_path() -> syn::Path {
    syn::parse_quote!(::safe_global)
}

/// A `static` item, where the initializer may be missing.
///
/// ```rust,ignore
/// static mut DATA: Option<u32>;
/// ```
///
/// rustc rejects a free static without a body only after macro expansion,
/// so the attribute still gets to see it.
pub struct ItemVariable {
    pub attrs: Vec<syn::Attribute>,
    pub vis: syn::Visibility,
    pub static_token: Token![static],
    pub mut_token: Option<Token![mut]>,
    pub pat: syn::Pat,
    pub ty: Option<(Token![:], syn::Type)>,
    pub init: Option<(Token![=], syn::Expr)>,
    pub semi_token: Token![;],
}

impl Parse for ItemVariable {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let attrs = input.call(syn::Attribute::parse_outer)?;
        let vis = input.parse()?;
        let static_token = input.parse()?;
        let mut_token = input.parse()?;
        let pat = syn::Pat::parse_single(input)?;
        let ty = if input.peek(Token![:]) {
            Some((input.parse()?, input.parse()?))
        } else {
            None
        };
        let init = if input.peek(Token![=]) {
            Some((input.parse()?, input.parse()?))
        } else {
            None
        };
        let semi_token = input.parse()?;
        Ok(ItemVariable {
            attrs,
            vis,
            static_token,
            mut_token,
            pat,
            ty,
            init,
            semi_token,
        })
    }
}

impl ToTokens for ItemVariable {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        for attr in self.attrs.iter() {
            attr.to_tokens(tokens);
        }
        self.vis.to_tokens(tokens);
        self.static_token.to_tokens(tokens);
        self.mut_token.to_tokens(tokens);
        self.pat.to_tokens(tokens);
        if let Some((colon, ty)) = &self.ty {
            colon.to_tokens(tokens);
            ty.to_tokens(tokens);
        }
        if let Some((eq, init)) = &self.init {
            eq.to_tokens(tokens);
            init.to_tokens(tokens);
        }
        self.semi_token.to_tokens(tokens);
    }
}

/// Whatever item the attribute was applied to.
pub enum ItemInput {
    Variable(ItemVariable),
    Other(syn::Item),
}

impl Parse for ItemInput {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let fork = input.fork();
        fork.call(syn::Attribute::parse_outer)?;
        fork.parse::<syn::Visibility>()?;
        if fork.peek(Token![static]) {
            Ok(ItemInput::Variable(input.parse()?))
        } else {
            Ok(ItemInput::Other(input.parse()?))
        }
    }
}

impl ItemInput {
    pub fn lower(&self) -> Decl<RustSyntax> {
        match self {
            ItemInput::Variable(var) => Decl::Variable(var.lower()),
            ItemInput::Other(item) => lower_item(item),
        }
    }

    /// Returns true if the item carries the triggering attribute.
    pub fn is_annotated(&self) -> bool {
        match self {
            ItemInput::Variable(var) => var.attrs.iter().any(is_trigger),
            ItemInput::Other(_) => false,
        }
    }
}

pub fn is_trigger(attr: &syn::Attribute) -> bool {
    attribute_name(attr) == ATTRIBUTE_NAME
}

/// The last segment of an attribute's path, looking through `unsafe(..)`.
fn attribute_name(attr: &syn::Attribute) -> String {
    if attr.path().is_ident("unsafe") {
        if let syn::Meta::List(list) = &attr.meta {
            if let Ok(inner) = list.parse_args::<syn::Meta>() {
                if let Some(segment) = inner.path().segments.last() {
                    return segment.ident.to_string();
                }
            }
        }
    }
    attr.path()
        .segments
        .last()
        .map(|segment| segment.ident.to_string())
        .unwrap_or_default()
}

fn lower_item(item: &syn::Item) -> Decl<RustSyntax> {
    let span = item.span();
    let kind = match item {
        syn::Item::Fn(item) => {
            return Decl::Function {
                name: item.sig.ident.to_string(),
                span,
            };
        }
        syn::Item::Struct(syn::ItemStruct { ident, .. })
        | syn::Item::Enum(syn::ItemEnum { ident, .. })
        | syn::Item::Union(syn::ItemUnion { ident, .. })
        | syn::Item::Type(syn::ItemType { ident, .. })
        | syn::Item::Trait(syn::ItemTrait { ident, .. }) => {
            return Decl::Type {
                name: ident.to_string(),
                span,
            };
        }
        syn::Item::Const(_) => "constant",
        syn::Item::Impl(_) => "impl block",
        syn::Item::Mod(_) => "module",
        syn::Item::Use(_) => "use declaration",
        syn::Item::Macro(_) => "macro invocation",
        syn::Item::ExternCrate(_) => "extern crate",
        syn::Item::ForeignMod(_) => "extern block",
        _ => "item",
    };
    Decl::Other {
        kind: kind.to_string(),
        span,
    }
}

fn lower_visibility(vis: &syn::Visibility) -> Option<Visibility> {
    match vis {
        syn::Visibility::Public(_) => Some(Visibility::Public),
        syn::Visibility::Restricted(restricted) => {
            let path = &restricted.path;
            let scope = match restricted.in_token {
                Some(_) => quote!(in #path),
                None => path.to_token_stream(),
            };
            Some(Visibility::Restricted(scope.to_string()))
        }
        syn::Visibility::Inherited => None,
    }
}

fn lower_pattern(pat: &syn::Pat) -> Pattern<RustSyntax> {
    match pat {
        syn::Pat::Ident(syn::PatIdent {
            by_ref: None,
            mutability: None,
            subpat: None,
            ident,
            ..
        }) => Pattern::Identifier {
            name: ident.unraw().to_string(),
            span: ident.span(),
        },
        other => Pattern::Other {
            description: other.to_token_stream().to_string(),
            span: other.span(),
        },
    }
}

/// Paths that name the std optional.
const OPTION_PATHS: &[&[&str]] = &[
    &["Option"],
    &["std", "option", "Option"],
    &["core", "option", "Option"],
];

/// Returns `T` when `ty` is the std `Option<T>`.
///
/// Any other type named `Option` is left alone.
fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let syn::Type::Path(syn::TypePath { qself: None, path }) = ty else {
        return None;
    };
    let names = path
        .segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect::<Vec<_>>();
    if !OPTION_PATHS.iter().any(|known| *known == names.as_slice()) {
        return None;
    }
    let mut prefix = path.segments.iter().rev().skip(1);
    if !prefix.all(|segment| segment.arguments.is_none()) {
        return None;
    }
    let segment = path.segments.last()?;
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Makes an identifier for `name`, falling back to a raw identifier for
/// keywords.
fn ident(name: &str, span: Span) -> syn::Ident {
    match syn::parse_str::<syn::Ident>(name) {
        Ok(mut ident) => {
            ident.set_span(span);
            ident
        }
        Err(_) => syn::Ident::new_raw(name, span),
    }
}

fn lower_type(ty: &syn::Type) -> TypeExpr<RustSyntax> {
    match option_inner(ty) {
        Some(inner) => TypeExpr::Optional(Box::new(lower_type(inner))),
        None => TypeExpr::Host(ty.clone()),
    }
}

impl ItemVariable {
    pub fn lower(&self) -> VariableDecl<RustSyntax> {
        let mut modifiers = vec![];
        if let Some(vis) = lower_visibility(&self.vis) {
            modifiers.push(Modifier::Visibility(vis));
        }
        modifiers.push(Modifier::Static);

        let mut attributes = vec![];
        for attr in self.attrs.iter() {
            let name = attribute_name(attr);
            if STORAGE_ATTRIBUTES.contains(&name.as_str()) {
                modifiers.push(Modifier::Other {
                    name,
                    node: attr.clone(),
                    span: attr.span(),
                });
            } else {
                attributes.push(Attribute {
                    name,
                    node: attr.clone(),
                });
            }
        }

        VariableDecl {
            attributes,
            modifiers,
            specifier: if self.mut_token.is_some() {
                BindingSpecifier::Mutable
            } else {
                BindingSpecifier::BindOnce
            },
            bindings: vec![Binding {
                pattern: lower_pattern(&self.pat),
                ty: self.ty.as_ref().map(|(_, ty)| lower_type(ty)),
                initializer: self.init.as_ref().map(|(_, init)| Expr::Host(init.clone())),
            }],
            span: self.static_token.span,
        }
    }
}

/// Lifts model nodes back into Rust tokens.
struct Lift<'a> {
    crate_path: &'a syn::Path,
}

impl Lift<'_> {
    fn ty(&self, ty: &TypeExpr<RustSyntax>) -> TokenStream {
        match ty {
            TypeExpr::Host(ty) => ty.to_token_stream(),
            TypeExpr::Optional(inner) | TypeExpr::ImplicitlyUnwrappedOptional(inner) => {
                let inner = self.ty(inner);
                quote!(::core::option::Option<#inner>)
            }
            TypeExpr::Container(inner) => {
                let crate_path = self.crate_path;
                let inner = self.ty(inner);
                quote!(#crate_path::SafeGlobal<#inner>)
            }
        }
    }

    fn expr(&self, expr: &Expr<RustSyntax>) -> TokenStream {
        let crate_path = self.crate_path;
        match expr {
            Expr::Host(expr) => expr.to_token_stream(),
            Expr::ContainerNew(initial) => {
                let initial = self.expr(initial);
                quote!(#crate_path::SafeGlobal::new(#initial))
            }
            Expr::ContainerEmpty => quote!(#crate_path::SafeGlobal::empty()),
            Expr::ContainerRead { backing } => {
                let backing = ident(backing, Span::call_site());
                quote!(#backing.get())
            }
            Expr::ContainerWrite { backing, value } => {
                let backing = ident(backing, Span::call_site());
                let value = self.expr(value);
                quote!(#backing.set(#value))
            }
            Expr::NewValue => quote!(new_value),
        }
    }

    fn visibility(&self, modifiers: &[Modifier<RustSyntax>]) -> syn::Result<TokenStream> {
        let vis = modifiers.iter().find_map(|modifier| match modifier {
            Modifier::Visibility(vis) => Some(vis),
            _ => None,
        });
        Ok(match vis {
            Some(Visibility::Public) => quote!(pub),
            Some(Visibility::Restricted(scope)) => {
                let scope: TokenStream = scope
                    .parse()
                    .map_err(|e| syn::Error::new(Span::call_site(), e))?;
                quote!(pub(#scope))
            }
            Some(Visibility::Private) | None => quote!(),
        })
    }

    /// The backing `static` items.
    fn peer(&self, decl: &VariableDecl<RustSyntax>) -> syn::Result<Vec<syn::Item>> {
        let attrs = decl.attributes.iter().map(|attr| &attr.node).collect::<Vec<_>>();
        let storage = decl
            .modifiers
            .iter()
            .filter_map(|modifier| match modifier {
                Modifier::Other { node, .. } => Some(node),
                _ => None,
            })
            .collect::<Vec<_>>();
        let vis = self.visibility(&decl.modifiers)?;
        let mut_token = (decl.specifier == BindingSpecifier::Mutable).then(|| quote!(mut));

        let mut items = vec![];
        for binding in decl.bindings.iter() {
            let span = *binding.pattern.span();
            let name = binding.pattern.identifier().ok_or_else(|| {
                syn::Error::new(span, "expected an identifier for the backing static")
            })?;
            let ident = ident(name, span);
            let ty = binding.ty.as_ref().ok_or_else(|| {
                syn::Error::new(span, format!("#[{ATTRIBUTE_NAME}] statics need a type"))
            })?;
            let ty = self.ty(ty);
            let init = binding
                .initializer
                .as_ref()
                .map(|init| self.expr(init))
                .unwrap_or_else(|| self.expr(&Expr::ContainerEmpty));
            items.push(syn::parse2(quote! {
                #(#attrs)*
                #(#storage)*
                #vis static #mut_token #ident: #ty = #init;
            })?);
        }
        Ok(items)
    }

    /// The accessor struct and its `get`/`set` methods.
    fn accessors(
        &self,
        original: &VariableDecl<RustSyntax>,
        accessors: &[Accessor<RustSyntax>],
    ) -> syn::Result<Vec<syn::Item>> {
        let [binding] = original.bindings.as_slice() else {
            return Err(syn::Error::new(
                original.span,
                "accessors require exactly one binding",
            ));
        };
        let span = *binding.pattern.span();
        let name = binding
            .pattern
            .identifier()
            .ok_or_else(|| syn::Error::new(span, "accessors require an identifier binding"))?;
        let ident = ident(name, span);
        let ty = binding.ty.as_ref().ok_or_else(|| {
            syn::Error::new(span, format!("#[{ATTRIBUTE_NAME}] statics need a type"))
        })?;
        let ty = self.ty(&rewrite::normalized_type(ty));
        let vis = self.visibility(&original.modifiers)?;

        let attrs = original
            .attributes
            .iter()
            .filter(|attr| attr.name != ATTRIBUTE_NAME)
            .map(|attr| &attr.node)
            .collect::<Vec<_>>();
        // The impl has to disappear along with the struct.
        let cfgs = original
            .attributes
            .iter()
            .filter(|attr| attr.name == "cfg")
            .map(|attr| &attr.node);

        let methods = accessors.iter().map(|accessor| {
            let body = self.expr(&accessor.body);
            match accessor.kind {
                AccessorKind::Get => quote! {
                    #[inline]
                    #vis fn get(&self) -> #ty {
                        #body
                    }
                },
                AccessorKind::Set => quote! {
                    #[inline]
                    #vis fn set(&self, new_value: #ty) {
                        #body
                    }
                },
            }
        });

        Ok(vec![
            syn::parse2(quote! {
                #(#attrs)*
                #[allow(non_camel_case_types)]
                #[derive(Clone, Copy, Debug)]
                #vis struct #ident;
            })?,
            syn::parse2(quote! {
                #(#cfgs)*
                impl #ident {
                    #(#methods)*
                }
            })?,
        ])
    }
}

/// Surfaces a warning on stable Rust by way of a deprecated marker, spanned
/// at the offending node.
pub fn warning_tokens(diagnostic: &Diagnostic<Span>) -> TokenStream {
    let note = &diagnostic.message;
    let marker = syn::Ident::new("safe_global_warning", diagnostic.span);
    quote! {
        const _: () = {
            #[deprecated(note = #note)]
            #[allow(non_camel_case_types)]
            struct #marker;
            let _ = #marker;
        };
    }
}

/// The result of expanding one annotated static.
pub struct Expansion {
    /// Accessor items first, followed by the backing static.
    pub items: Vec<syn::Item>,
    pub diagnostics: Vec<Diagnostic<Span>>,
}

impl ToTokens for Expansion {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        for item in self.items.iter() {
            item.to_tokens(tokens);
        }
        for diagnostic in self.diagnostics.iter() {
            tokens.extend(warning_tokens(diagnostic));
        }
    }
}

fn to_syn_error(decl: &Decl<RustSyntax>, error: rewrite::Error) -> syn::Error {
    let span = match (&error, decl) {
        (rewrite::Error::NotAnIdentifierPattern { .. }, Decl::Variable(var)) => var
            .bindings
            .iter()
            .find(|binding| binding.pattern.identifier().is_none())
            .map(|binding| *binding.pattern.span())
            .unwrap_or(var.span),
        _ => *decl.span(),
    };
    syn::Error::new(span, error)
}

/// Runs both expansions on `input`, producing Rust items.
pub fn expand(crate_path: &syn::Path, input: &ItemInput) -> syn::Result<Expansion> {
    let decl = input.lower();
    let peer = rewrite::expand_peer(&decl).map_err(|e| to_syn_error(&decl, e))?;
    let accessors = rewrite::expand_accessors(&decl).map_err(|e| to_syn_error(&decl, e))?;
    let Decl::Variable(original) = &decl else {
        return Err(syn::Error::new(*decl.span(), "expected a variable"));
    };

    let lift = Lift { crate_path };
    let mut items = lift.accessors(original, &accessors)?;
    items.extend(lift.peer(&peer.declaration)?);
    Ok(Expansion {
        items,
        diagnostics: peer.diagnostics,
    })
}

pub fn expand_tokens(crate_path: &syn::Path, tokens: TokenStream) -> syn::Result<Expansion> {
    let input: ItemInput = syn::parse2(tokens)?;
    expand(crate_path, &input)
}
