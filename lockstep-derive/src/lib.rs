//! Derive macros for lockstep model-based testing.
//!
//! `#[derive(Generate)]` implements `lockstep::Arbitrary` for records and
//! enums, which makes them usable as command arguments that shrink field by
//! field.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, Field, Fields, Ident};

/// Derive `lockstep::Arbitrary` for a struct or enum.
///
/// Every field uses `<T as Arbitrary>::arbitrary()` unless it carries a
/// `#[generator(expr)]` attribute, in which case `expr` must evaluate to a
/// `Gen` of the field type. Fields are generated independently and shrink
/// left to right. Enum variants are chosen uniformly.
///
/// # Example
///
/// ```rust,ignore
/// use lockstep::*;
///
/// #[derive(Generate, Debug, Clone)]
/// struct AddTrack {
///     #[generator(Gen::<usize>::int_range(0, 20))]
///     position: usize,
///     #[generator(Gen::<String>::hex_string(1, 10))]
///     name: String,
/// }
///
/// let gen = AddTrack::arbitrary();
/// ```
#[proc_macro_derive(Generate, attributes(generator))]
pub fn derive_generate(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Generate the `Arbitrary` implementation.
fn generate_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::lockstep::Arbitrary));
        param.bounds.push(parse_quote!(::std::clone::Clone));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let generator = match &input.data {
        Data::Struct(data) => fields_generator(&data.fields, quote!(Self))?,
        Data::Enum(data) => {
            if data.variants.is_empty() {
                return Err(syn::Error::new_spanned(
                    input,
                    "Generate cannot be derived for an enum without variants",
                ));
            }
            let variants = data
                .variants
                .iter()
                .map(|variant| {
                    let variant_name = &variant.ident;
                    fields_generator(&variant.fields, quote!(Self::#variant_name))
                })
                .collect::<Result<Vec<_>, syn::Error>>()?;
            quote! {
                ::lockstep::Gen::one_of(vec![#(#variants),*])
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Generate derive macro does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::lockstep::Arbitrary for #name #ty_generics #where_clause {
            fn arbitrary() -> ::lockstep::Gen<Self> {
                #generator
            }
        }
    })
}

/// A generator building `constructor` from independently generated fields.
///
/// Field generators are zipped right-nested, `a.zip(b.zip(c))`, and the
/// resulting tuple is destructured into the constructor.
fn fields_generator(fields: &Fields, constructor: TokenStream2) -> Result<TokenStream2, syn::Error> {
    let generators = fields
        .iter()
        .map(field_generator)
        .collect::<Result<Vec<_>, syn::Error>>()?;
    let vars: Vec<Ident> = (0..generators.len())
        .map(|i| Ident::new(&format!("field_{i}"), Span::call_site()))
        .collect();

    let value = match fields {
        Fields::Named(named) => {
            let names = named.named.iter().map(|field| &field.ident);
            quote!(#constructor { #(#names: #vars),* })
        }
        Fields::Unnamed(_) => quote!(#constructor(#(#vars),*)),
        Fields::Unit => quote!(#constructor),
    };

    match (nested_zip(&generators), nested_pattern(&vars)) {
        (Some(zipped), Some(pattern)) => Ok(quote! {
            #zipped.map(|#pattern| #value)
        }),
        _ => Ok(quote! {
            ::lockstep::Gen::new(|_size, _seed| ::lockstep::Tree::singleton(#value))
        }),
    }
}

/// `(a).zip((b).zip(c))` for `[a, b, c]`.
fn nested_zip(generators: &[TokenStream2]) -> Option<TokenStream2> {
    let (last, rest) = generators.split_last()?;
    Some(
        rest.iter()
            .rev()
            .fold(quote!((#last)), |acc, gen| quote!((#gen).zip(#acc))),
    )
}

/// `(a, (b, c))` for `[a, b, c]`; a bare identifier for a single field.
fn nested_pattern(vars: &[Ident]) -> Option<TokenStream2> {
    let (last, rest) = vars.split_last()?;
    Some(
        rest.iter()
            .rev()
            .fold(quote!(#last), |acc, var| quote!((#var, #acc))),
    )
}

/// The generator for one field: its `#[generator(...)]` override or the
/// field type's `Arbitrary` instance.
fn field_generator(field: &Field) -> Result<TokenStream2, syn::Error> {
    for attr in &field.attrs {
        if attr.path().is_ident("generator") {
            let expr: syn::Expr = attr.parse_args()?;
            return Ok(quote!(#expr));
        }
    }
    let ty = &field.ty;
    Ok(quote!(<#ty as ::lockstep::Arbitrary>::arbitrary()))
}
