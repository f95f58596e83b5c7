//! Expands `#[safe_global]` statics in a Rust source file.
//!
//! This is the same rewrite the attribute performs, run as a separate build
//! step for code that can't depend on the proc-macro.
use std::path::{Path, PathBuf};

use clap::Parser;
use quote::ToTokens;
use safe_global_rewrite::{
    decl::{Diagnostic, Severity},
    rust::{self, ItemInput},
};

#[derive(clap::Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the crate providing `SafeGlobal` in the expanded code
    #[arg(long, global = true, default_value = "::safe_global")]
    crate_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Expand every annotated static and print the result
    Expand {
        /// The Rust source file to expand
        input: PathBuf,
        /// Write the expanded source here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report diagnostics without writing anything
    Check {
        /// The Rust source file to check
        input: PathBuf,
    },
}

/// What happened to the annotated statics in one file.
#[derive(Default)]
struct Report {
    expanded: usize,
    warnings: usize,
    errors: usize,
}

struct Expander<'a> {
    path: &'a Path,
    crate_path: syn::Path,
    report: Report,
}

impl Expander<'_> {
    fn log_diagnostic(&self, diagnostic: &Diagnostic<proc_macro2::Span>) {
        let start = diagnostic.span.start();
        let location = format!("{}:{}:{}", self.path.display(), start.line, start.column + 1);
        match diagnostic.severity {
            Severity::Warning => log::warn!("{location}: {}", diagnostic.message),
            Severity::Error => log::error!("{location}: {}", diagnostic.message),
        }
    }

    fn log_error(&self, error: &syn::Error) {
        let start = error.span().start();
        log::error!(
            "{}:{}:{}: {error}",
            self.path.display(),
            start.line,
            start.column + 1
        );
    }

    /// Expands `item` if it carries the attribute, recursing into inline
    /// modules.
    ///
    /// Returns the items that replace it.
    fn expand_item(&mut self, item: syn::Item) -> Vec<syn::Item> {
        let item = match item {
            syn::Item::Mod(mut item_mod) => {
                if let Some((_, content)) = item_mod.content.as_mut() {
                    let items = std::mem::take(content);
                    *content = items
                        .into_iter()
                        .flat_map(|item| self.expand_item(item))
                        .collect();
                }
                return vec![syn::Item::Mod(item_mod)];
            }
            other => other,
        };

        let input = match &item {
            // Statics without an initializer
            syn::Item::Verbatim(tokens) => match syn::parse2::<ItemInput>(tokens.clone()) {
                Ok(input) if input.is_annotated() => Ok(input),
                _ => return vec![item],
            },
            other if item_attrs(other).iter().any(rust::is_trigger) => {
                syn::parse2::<ItemInput>(other.to_token_stream())
            }
            _ => return vec![item],
        };

        match input.and_then(|input| rust::expand(&self.crate_path, &input)) {
            Ok(expansion) => {
                for diagnostic in expansion.diagnostics.iter() {
                    self.log_diagnostic(diagnostic);
                    if diagnostic.severity == Severity::Warning {
                        self.report.warnings += 1;
                    } else {
                        self.report.errors += 1;
                    }
                }
                self.report.expanded += 1;
                expansion.items
            }
            Err(e) => {
                self.log_error(&e);
                self.report.errors += 1;
                let error = e.into_compile_error();
                vec![syn::Item::Verbatim(error)]
            }
        }
    }
}

fn item_attrs(item: &syn::Item) -> &[syn::Attribute] {
    match item {
        syn::Item::Const(item) => &item.attrs,
        syn::Item::Enum(item) => &item.attrs,
        syn::Item::ExternCrate(item) => &item.attrs,
        syn::Item::Fn(item) => &item.attrs,
        syn::Item::ForeignMod(item) => &item.attrs,
        syn::Item::Impl(item) => &item.attrs,
        syn::Item::Macro(item) => &item.attrs,
        syn::Item::Mod(item) => &item.attrs,
        syn::Item::Static(item) => &item.attrs,
        syn::Item::Struct(item) => &item.attrs,
        syn::Item::Trait(item) => &item.attrs,
        syn::Item::TraitAlias(item) => &item.attrs,
        syn::Item::Type(item) => &item.attrs,
        syn::Item::Union(item) => &item.attrs,
        syn::Item::Use(item) => &item.attrs,
        _ => &[],
    }
}

fn expand_file(
    path: &Path,
    crate_path: &str,
) -> Result<(syn::File, Report), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let mut file = syn::parse_file(&source)?;
    let mut expander = Expander {
        path,
        crate_path: syn::parse_str(crate_path)?,
        report: Report::default(),
    };
    let items = std::mem::take(&mut file.items);
    file.items = items
        .into_iter()
        .flat_map(|item| expander.expand_item(item))
        .collect();
    let report = expander.report;
    log::info!(
        "{}: expanded {} static(s), {} warning(s), {} error(s)",
        path.display(),
        report.expanded,
        report.warnings,
        report.errors
    );
    Ok((file, report))
}

fn expand(
    input: &Path,
    output: Option<&Path>,
    crate_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (file, report) = expand_file(input, crate_path)?;
    let expanded = file.into_token_stream().to_string();
    match output {
        Some(output) => {
            std::fs::write(output, expanded)?;
            log::debug!("wrote {}", output.display());
        }
        None => println!("{expanded}"),
    }
    if report.errors > 0 {
        return Err(format!("{} static(s) failed to expand", report.errors).into());
    }
    Ok(())
}

fn check(input: &Path, crate_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (_, report) = expand_file(input, crate_path)?;
    if report.errors > 0 {
        return Err(format!("{} static(s) failed to expand", report.errors).into());
    }
    Ok(())
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Expand { input, output } => expand(input, output.as_deref(), &cli.crate_path),
        Commands::Check { input } => check(input, &cli.crate_path),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn expand_source(source: &str) -> (syn::File, Report) {
        let mut file = syn::parse_file(source).unwrap();
        let mut expander = Expander {
            path: Path::new("test.rs"),
            crate_path: rust::default_crate_path(),
            report: Report::default(),
        };
        let items = std::mem::take(&mut file.items);
        file.items = items
            .into_iter()
            .flat_map(|item| expander.expand_item(item))
            .collect();
        (file, expander.report)
    }

    #[test]
    fn expands_annotated_statics_only() {
        let (file, report) = expand_source(
            r#"
            #[safe_global]
            static mut COUNTER: u32 = 0;
            static PLAIN: u32 = 1;
            fn main() {}
            "#,
        );
        assert_eq!(1, report.expanded);
        assert_eq!(0, report.errors);
        // accessor struct, impl, backing static, plain static, main
        assert_eq!(5, file.items.len());
        let expected: syn::Item = syn::parse_quote! {
            static _COUNTER: ::safe_global::SafeGlobal<u32> = ::safe_global::SafeGlobal::new(0);
        };
        assert_eq!(expected, file.items[2]);
    }

    #[test]
    fn expands_inside_modules() {
        let (file, report) = expand_source(
            r#"
            mod conf {
                #[safe_global::safe_global]
                pub static mut LEVEL: Option<u8>;
            }
            "#,
        );
        assert_eq!(1, report.expanded);
        let syn::Item::Mod(item_mod) = &file.items[0] else {
            panic!("expected a module");
        };
        let (_, content) = item_mod.content.as_ref().unwrap();
        let expected: syn::Item = syn::parse_quote! {
            static _LEVEL: ::safe_global::SafeGlobal<::core::option::Option<u8>> =
                ::safe_global::SafeGlobal::empty();
        };
        assert_eq!(&expected, &content[2]);
    }

    #[test]
    fn counts_warnings() {
        let (_, report) = expand_source(
            r#"
            #[safe_global]
            #[link_section = ".data"]
            static mut TABLE: [u8; 4] = [0; 4];
            "#,
        );
        assert_eq!(1, report.expanded);
        assert_eq!(1, report.warnings);
    }

    #[test]
    fn failures_become_compile_errors() {
        let (file, report) = expand_source(
            r#"
            #[safe_global]
            fn not_a_static() {}
            "#,
        );
        assert_eq!(1, report.errors);
        assert_eq!(0, report.expanded);
        let tokens = file.into_token_stream().to_string();
        assert!(tokens.contains("compile_error"));
    }
}
