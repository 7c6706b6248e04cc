//! Attribute parsing for refbridge macros.

use syn::{Attribute, LitStr, Token, Type, parenthesized, punctuated::Punctuated};

/// Ownership policy selected on a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyAttr {
    Intrusive,
    #[default]
    External,
}

/// Parsed `#[refbridge(...)]` attributes on a type.
#[derive(Default)]
pub struct TypeAttrs {
    /// Registered name (default: Rust struct name)
    pub name: Option<String>,
    /// Explicit policy, if given
    pub policy: Option<PolicyAttr>,
    /// Extra base trait objects, e.g. `dyn Object`
    pub upcasts: Vec<Type>,
}

/// Parsed `#[refbridge(...)]` attributes on a field.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    /// Field holds the embedded `RefCount`
    pub ref_count: bool,
}

impl TypeAttrs {
    /// Parse attributes from a list of `#[refbridge(...)]` attributes.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("refbridge") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else if meta.path.is_ident("intrusive") {
                    result.set_policy(PolicyAttr::Intrusive, &meta)?;
                } else if meta.path.is_ident("external") {
                    result.set_policy(PolicyAttr::External, &meta)?;
                } else if meta.path.is_ident("upcast") {
                    let content;
                    parenthesized!(content in meta.input);
                    let targets = Punctuated::<Type, Token![,]>::parse_terminated(&content)?;
                    result.upcasts.extend(targets);
                } else {
                    return Err(meta.error(format!(
                        "unknown refbridge attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }

    fn set_policy(
        &mut self,
        policy: PolicyAttr,
        meta: &syn::meta::ParseNestedMeta<'_>,
    ) -> syn::Result<()> {
        match self.policy {
            Some(existing) if existing != policy => {
                Err(meta.error("`intrusive` and `external` are mutually exclusive"))
            }
            _ => {
                self.policy = Some(policy);
                Ok(())
            }
        }
    }
}

impl FieldAttrs {
    /// Parse attributes from a list of `#[refbridge(...)]` attributes.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("refbridge") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("ref_count") {
                    result.ref_count = true;
                } else {
                    return Err(meta.error(format!(
                        "unknown refbridge field attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}
