//! The `#[safe_global]` attribute.
use darling::FromMeta;
use proc_macro::TokenStream;
use quote::ToTokens;
use safe_global_rewrite::rust;

#[derive(Default, FromMeta)]
#[darling(derive_syn_parse)]
struct Attrs {
    /// Present if the `safe_global` macro is of the form:
    /// #[safe_global(crate_path = path::to::crate)]
    ///
    /// Otherwise this is `None`.
    crate_path: Option<syn::Path>,
}

impl Attrs {
    fn crate_path(&self) -> syn::Path {
        self.crate_path
            .clone()
            .unwrap_or_else(rust::default_crate_path)
    }
}

fn go_safe_global(
    attr: TokenStream,
    item: proc_macro2::TokenStream,
) -> Result<proc_macro2::TokenStream, syn::Error> {
    let attrs: Attrs = syn::parse(attr)?;
    let crate_path = attrs.crate_path();
    let expansion = rust::expand_tokens(&crate_path, item)?;
    Ok(expansion.into_token_stream())
}

/// Turns a `static` into a lock-guarded global.
///
/// ```rust,ignore
/// use safe_global::safe_global;
///
/// #[safe_global]
/// pub static mut COUNTER: u32 = 0;
///
/// COUNTER.set(COUNTER.get() + 1);
/// ```
///
/// The value moves into a private `static _COUNTER: SafeGlobal<u32>`, and
/// `COUNTER` becomes a unit struct with a `get` method, plus a `set` method
/// when the static was declared `mut`.
///
/// A `static mut` of type `Option<T>` may leave out its initializer, in which
/// case it starts out as `None`.
#[proc_macro_attribute]
pub fn safe_global(attr: TokenStream, token_stream: TokenStream) -> TokenStream {
    match go_safe_global(attr, token_stream.into()) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.into_compile_error().into(),
    }
}
