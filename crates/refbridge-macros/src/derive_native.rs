//! Implementation of the `#[derive(Native)]` macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Member, Type, parse_macro_input, parse_quote};

use crate::attrs::{FieldAttrs, PolicyAttr, TypeAttrs};

pub fn derive_native_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_native_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_native_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let attrs = TypeAttrs::from_attrs(&input.attrs)?;
    let native_name = attrs
        .name
        .clone()
        .unwrap_or_else(|| input.ident.to_string());

    let ref_count = find_ref_count(input)?;
    let policy = match (attrs.policy, &ref_count) {
        (Some(PolicyAttr::External), Some(field)) => {
            return Err(syn::Error::new(
                field.span(),
                "`ref_count` field on an external type",
            ));
        }
        (Some(PolicyAttr::Intrusive), None) => {
            return Err(syn::Error::new(
                input.ident.span(),
                "intrusive types need a `#[refbridge(ref_count)]` field",
            ));
        }
        (Some(policy), _) => policy,
        (None, Some(_)) => PolicyAttr::Intrusive,
        (None, None) => PolicyAttr::External,
    };

    let native_type_impl = generate_native_type_impl(input, &native_name);

    let mut targets: Vec<Type> = vec![parse_quote!(dyn ::refbridge_core::Native)];
    let ref_counted_impl = match (policy, ref_count) {
        (PolicyAttr::Intrusive, Some(field)) => {
            targets.push(parse_quote!(dyn ::refbridge_core::RefCounted));
            generate_ref_counted_impl(input, &field)
        }
        _ => TokenStream2::new(),
    };
    targets.extend(attrs.upcasts.iter().cloned());
    let upcast_impls = targets.iter().map(|target| generate_upcast_impl(input, target));

    Ok(quote! {
        #native_type_impl
        #ref_counted_impl
        #(#upcast_impls)*
    })
}

/// Locate the field marked `#[refbridge(ref_count)]`.
fn find_ref_count(input: &DeriveInput) -> syn::Result<Option<Member>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "#[derive(Native)] only supports structs",
        ));
    };

    let mut found = None;
    let members: Vec<(Member, &syn::Field)> = match &data.fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .filter_map(|f| f.ident.clone().map(|ident| (Member::Named(ident), f)))
            .collect(),
        Fields::Unnamed(fields) => fields
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, f)| (Member::from(i), f))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    for (member, field) in members {
        if !FieldAttrs::from_attrs(&field.attrs)?.ref_count {
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new(field.span(), "duplicate `ref_count` field"));
        }
        found = Some(member);
    }

    Ok(found)
}

/// Generate the `NativeType` implementation.
fn generate_native_type_impl(input: &DeriveInput, native_name: &str) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    quote! {
        impl #impl_generics ::refbridge_core::NativeType for #name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #native_name
            }
        }
    }
}

/// Generate the `RefCounted` implementation backed by the marked field.
fn generate_ref_counted_impl(input: &DeriveInput, field: &Member) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    quote! {
        impl #impl_generics ::refbridge_core::RefCounted for #name #ty_generics #where_clause {
            fn ref_count(&self) -> &::refbridge_core::RefCount {
                &self.#field
            }
        }
    }
}

/// Generate one `Upcast` implementation.
fn generate_upcast_impl(input: &DeriveInput, target: &Type) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Spanned on the target so a bad `upcast(...)` entry points at itself
    quote_spanned! {target.span()=>
        // SAFETY: unsizing coercions keep the data address.
        unsafe impl #impl_generics ::refbridge_core::Upcast<#target> for #name #ty_generics #where_clause {
            #[inline]
            fn upcast_ptr(ptr: *mut Self) -> *mut #target {
                ptr
            }

            #[inline]
            fn upcast_ref(&self) -> &#target {
                self
            }
        }
    }
}
