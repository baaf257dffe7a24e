use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Fields, FieldsNamed, Ident, LitStr, Type, parse_macro_input,
    spanned::Spanned,
};

/// Describes a record type mapped onto one table.
///
/// Only fields carrying `#[id]`, `#[embedded_id]` or `#[column]` are mapped;
/// `#[transient]` fields and fields without attributes are left alone.
///
/// ```ignore
/// #[derive(Debug, Default, Entity)]
/// #[entity(table = "users", consistency(read = "ONE", write = "QUORUM"))]
/// struct User {
///     #[id]
///     id: i64,
///     #[column(name = "user_name")]
///     name: String,
///     #[column(lazy, consistency(read = "LOCAL_QUORUM", write = "ALL"))]
///     friends: Vec<String>,
///     #[column]
///     visits: Counter,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, id, embedded_id, column, transient))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Describes a compound primary key.
///
/// Components follow field order. `#[partition]` and `#[clustering]` /
/// `#[clustering(reversed)]` set their role; without any marker the first
/// component is the partition key and the others are clustering columns.
#[proc_macro_derive(CompoundKey, attributes(partition, clustering))]
pub fn derive_compound_key(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_compound_key(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct EntityOptions {
    table_name: Option<String>,
    consistency: Option<(Ident, Ident)>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Id,
    EmbeddedId,
    Column,
}

struct FieldOptions {
    kind: FieldKind,
    column_name: Option<String>,
    lazy: bool,
    consistency: Option<(Ident, Ident)>,
}

fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> syn::Result<&'a FieldsNamed> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            format!("{} does not support generic structs", derive),
        ));
    }
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            format!("{} can only be derived for structs", derive),
        ));
    };
    match &data.fields {
        Fields::Named(fields) => Ok(fields),
        _ => Err(syn::Error::new(
            input.ident.span(),
            format!("{} requires named fields", derive),
        )),
    }
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let options = parse_entity_options(&input.attrs)?;
    let fields = named_fields(&input, "Entity")?;

    let mut field_descriptors = Vec::new();
    for field in &fields.named {
        let Some(field_options) = parse_field_options(&field.attrs)? else {
            continue;
        };
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new(field.span(), "Entity requires named fields"))?;
        field_descriptors.push(field_descriptor(ident, &field.ty, &field_options));
    }

    let table = options
        .table_name
        .map(|table| quote! { .table(#table) });
    let consistency = options.consistency.map(|(read, write)| {
        quote! {
            .consistency(
                ::cqlmap::core::ConsistencyLevel::#read,
                ::cqlmap::core::ConsistencyLevel::#write,
            )
        }
    });

    Ok(quote! {
        impl ::cqlmap::entity::Entity for #struct_name {
            fn descriptor() -> ::cqlmap::metadata::EntityDescriptor<Self> {
                ::cqlmap::metadata::EntityDescriptor::new(
                    concat!(module_path!(), "::", stringify!(#struct_name)),
                )
                #table
                #consistency
                #(.field(#field_descriptors))*
            }
        }
    })
}

fn field_descriptor(ident: &Ident, ty: &Type, options: &FieldOptions) -> TokenStream2 {
    let field_name = ident.to_string();
    let constructor = match options.kind {
        FieldKind::Id => quote! { id::<#ty> },
        FieldKind::EmbeddedId => quote! { embedded_id::<#ty> },
        FieldKind::Column => quote! { column::<#ty> },
    };
    let name = options
        .column_name
        .as_ref()
        .map(|name| quote! { .name(#name) });
    let lazy = options.lazy.then(|| quote! { .lazy() });
    let consistency = options.consistency.as_ref().map(|(read, write)| {
        quote! {
            .consistency(
                ::cqlmap::core::ConsistencyLevel::#read,
                ::cqlmap::core::ConsistencyLevel::#write,
            )
        }
    });

    quote! {
        ::cqlmap::metadata::FieldDescriptor::#constructor(
            #field_name,
            |entity: &Self| -> ::cqlmap::core::Result<::cqlmap::core::Value> {
                ::cqlmap::entity::CqlValue::to_value(&entity.#ident)
            },
            |entity: &mut Self, value: ::cqlmap::core::Value| -> ::cqlmap::core::Result<()> {
                entity.#ident = <#ty as ::cqlmap::entity::CqlValue>::from_value(value)?;
                Ok(())
            },
        )
        #name
        #lazy
        #consistency
    }
}

fn parse_entity_options(attrs: &[Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.table_name = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("consistency") {
                options.consistency = Some(parse_consistency(&meta)?);
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[entity(...)] option. Supported: table = \"...\", consistency(read = \"...\", write = \"...\")",
            ))
        })?;
    }

    Ok(options)
}

fn parse_field_options(attrs: &[Attribute]) -> syn::Result<Option<FieldOptions>> {
    let mut options: Option<FieldOptions> = None;
    let mut transient = false;

    for attr in attrs {
        let kind = if attr.path().is_ident("id") {
            FieldKind::Id
        } else if attr.path().is_ident("embedded_id") {
            FieldKind::EmbeddedId
        } else if attr.path().is_ident("column") {
            FieldKind::Column
        } else if attr.path().is_ident("transient") {
            transient = true;
            continue;
        } else {
            continue;
        };

        if options.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                "A field accepts only one of #[id], #[embedded_id] and #[column]",
            ));
        }

        let mut parsed = FieldOptions {
            kind,
            column_name: None,
            lazy: false,
            consistency: None,
        };

        if let syn::Meta::List(list) = &attr.meta {
            list.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") && kind != FieldKind::EmbeddedId {
                    let value = meta.value()?;
                    let lit: LitStr = value.parse()?;
                    parsed.column_name = Some(lit.value());
                    return Ok(());
                }

                if meta.path.is_ident("lazy") && kind == FieldKind::Column {
                    parsed.lazy = true;
                    return Ok(());
                }

                if meta.path.is_ident("consistency") && kind == FieldKind::Column {
                    parsed.consistency = Some(parse_consistency(&meta)?);
                    return Ok(());
                }

                Err(meta.error(match kind {
                    FieldKind::Column => {
                        "Unsupported #[column(...)] option. Supported: name = \"...\", lazy, consistency(read = \"...\", write = \"...\")"
                    }
                    FieldKind::Id => "Unsupported #[id(...)] option. Supported: name = \"...\"",
                    FieldKind::EmbeddedId => "#[embedded_id] does not accept options",
                }))
            })?;
        } else if let syn::Meta::NameValue(_) = &attr.meta {
            return Err(syn::Error::new(
                attr.span(),
                "Unsupported attribute syntax. Use #[column] or #[column(...)]",
            ));
        }

        options = Some(parsed);
    }

    if transient && options.is_some() {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[transient] cannot be combined with #[id], #[embedded_id] or #[column]",
        ));
    }

    Ok(options)
}

/// Parses `consistency(read = "...", write = "...")` into level variants.
fn parse_consistency(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<(Ident, Ident)> {
    let mut read = None;
    let mut write = None;

    meta.parse_nested_meta(|inner| {
        let target = if inner.path.is_ident("read") {
            &mut read
        } else if inner.path.is_ident("write") {
            &mut write
        } else {
            return Err(inner.error("Supported: read = \"...\", write = \"...\""));
        };
        let lit: LitStr = inner.value()?.parse()?;
        *target = Some(consistency_variant(&lit)?);
        Ok(())
    })?;

    match (read, write) {
        (Some(read), Some(write)) => Ok((read, write)),
        _ => Err(meta.error("consistency(...) needs both read and write levels")),
    }
}

fn consistency_variant(lit: &LitStr) -> syn::Result<Ident> {
    let variant = match lit.value().trim().to_ascii_uppercase().as_str() {
        "ANY" => "Any",
        "ONE" => "One",
        "TWO" => "Two",
        "THREE" => "Three",
        "QUORUM" => "Quorum",
        "LOCAL_ONE" => "LocalOne",
        "LOCAL_QUORUM" => "LocalQuorum",
        "EACH_QUORUM" => "EachQuorum",
        "ALL" => "All",
        _ => {
            return Err(syn::Error::new(
                lit.span(),
                format!("Unknown consistency level '{}'", lit.value()),
            ));
        }
    };
    Ok(Ident::new(variant, lit.span()))
}

fn expand_compound_key(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let fields = named_fields(&input, "CompoundKey")?;

    let mut idents = Vec::new();
    let mut types = Vec::new();
    let mut components = Vec::new();

    for field in &fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "CompoundKey requires named fields"))?;
        let (column_name, role) = parse_component_options(&field.attrs, &ident)?;
        let ty = &field.ty;
        components.push(quote! {
            ::cqlmap::metadata::ComponentDescriptor::of::<#ty>(#column_name, #role)
        });
        idents.push(ident);
        types.push(field.ty.clone());
    }

    if idents.is_empty() {
        return Err(syn::Error::new(
            struct_name.span(),
            "CompoundKey requires at least one field",
        ));
    }
    let arity = idents.len();

    Ok(quote! {
        impl ::cqlmap::entity::CqlValue for #struct_name {
            fn value_type() -> ::cqlmap::core::ValueType {
                ::cqlmap::core::ValueType::Compound(stringify!(#struct_name))
            }

            fn kind() -> ::cqlmap::entity::ValueKind {
                ::cqlmap::entity::ValueKind::Compound
            }

            fn to_value(&self) -> ::cqlmap::core::Result<::cqlmap::core::Value> {
                Ok(::cqlmap::core::Value::Tuple(vec![
                    #(::cqlmap::entity::CqlValue::to_value(&self.#idents)?),*
                ]))
            }

            fn from_value(value: ::cqlmap::core::Value) -> ::cqlmap::core::Result<Self> {
                let components = match value {
                    ::cqlmap::core::Value::Tuple(components) if components.len() == #arity => {
                        components
                    }
                    other => {
                        return Err(::cqlmap::core::CqlMapError::TypeMismatch(format!(
                            "Expected a compound key {} of {} components, got {}",
                            stringify!(#struct_name),
                            #arity,
                            other.type_name()
                        )));
                    }
                };
                let mut components = components.into_iter();
                Ok(Self {
                    #(#idents: <#types as ::cqlmap::entity::CqlValue>::from_value(
                        components.next().unwrap_or(::cqlmap::core::Value::Null),
                    )?,)*
                })
            }
        }

        impl ::cqlmap::entity::CompoundKey for #struct_name {
            fn components() -> Vec<::cqlmap::metadata::ComponentDescriptor> {
                vec![#(#components),*]
            }
        }
    })
}

fn parse_component_options(
    attrs: &[Attribute],
    ident: &Ident,
) -> syn::Result<(String, TokenStream2)> {
    let mut column_name = ident.to_string();
    let mut role = None;

    for attr in attrs {
        let partition = if attr.path().is_ident("partition") {
            true
        } else if attr.path().is_ident("clustering") {
            false
        } else {
            continue;
        };

        if role.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                "A component is either #[partition] or #[clustering]",
            ));
        }

        let mut reversed = false;
        if let syn::Meta::List(list) = &attr.meta {
            list.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let lit: LitStr = meta.value()?.parse()?;
                    column_name = lit.value();
                    return Ok(());
                }
                if meta.path.is_ident("reversed") && !partition {
                    reversed = true;
                    return Ok(());
                }
                Err(meta.error(if partition {
                    "Supported: #[partition(name = \"...\")]"
                } else {
                    "Supported: #[clustering(name = \"...\", reversed)]"
                }))
            })?;
        }

        role = Some(if partition {
            quote! { ::cqlmap::metadata::ComponentRole::Partition }
        } else {
            quote! { ::cqlmap::metadata::ComponentRole::Clustering { reversed: #reversed } }
        });
    }

    let role = role.unwrap_or_else(|| quote! { ::cqlmap::metadata::ComponentRole::Unspecified });
    Ok((column_name, role))
}
