use crate::utils::{apply_derives, ensure_leading_fields, parse_bool};
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Item, Result, Token, Type, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[entity] 宏实现
/// - 若缺失则追加字段：`id: IdType`, `version: Version`，并置于字段最前
/// - 合并派生：Debug（可关闭）、Clone、Serialize、Deserialize
/// - 实现 `::flashsale_domain::entity::Entity`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EntityAttrConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[entity] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let Some(id_type) = cfg.id_ty else {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[entity] requires an id type, e.g. #[entity(id = StockId)]",
        )
        .to_compile_error()
        .into();
    };

    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    let version_ty: Type = syn::parse_quote! { ::flashsale_domain::value_object::Version };
    ensure_leading_fields(fields_named, &[("id", &id_type), ("version", &version_ty)]);

    let mut required: Vec<syn::Path> = vec![
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    if cfg.derive_debug.unwrap_or(true) {
        required.insert(0, syn::parse_quote!(Debug));
    }
    apply_derives(&mut st.attrs, required);

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    let expanded = quote! {
        #st

        impl #impl_generics ::flashsale_domain::entity::Entity for #ident #ty_generics #where_clause {
            type Id = #id_type;

            fn id(&self) -> &Self::Id {
                &self.id
            }

            fn version(&self) -> ::flashsale_domain::value_object::Version {
                self.version
            }

            fn set_version(&mut self, version: ::flashsale_domain::value_object::Version) {
                self.version = version;
            }
        }
    };

    TokenStream::from(expanded)
}

// -------- parsing --------

struct EntityAttrConfig {
    id_ty: Option<Type>,
    derive_debug: Option<bool>,
}

impl Parse for EntityAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut id_ty: Option<Type> = None;
        let mut derive_debug: Option<bool> = None;

        let elems: Punctuated<EntityAttrElem, Token![,]> = Punctuated::parse_terminated(input)?;

        for elem in elems {
            match elem {
                EntityAttrElem::Id(ty) => {
                    if id_ty.is_some() {
                        return Err(syn::Error::new(ty.span(), "duplicate key 'id' in attribute"));
                    }
                    id_ty = Some(*ty);
                }
                EntityAttrElem::Debug(b) => {
                    if derive_debug.is_some() {
                        return Err(syn::Error::new(
                            proc_macro2::Span::call_site(),
                            "duplicate key 'debug' in attribute",
                        ));
                    }
                    derive_debug = Some(b);
                }
            }
        }

        Ok(Self {
            id_ty,
            derive_debug,
        })
    }
}

enum EntityAttrElem {
    Id(Box<Type>),
    Debug(bool),
}

impl Parse for EntityAttrElem {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: syn::Ident = input.parse()?;
        let _eq: Token![=] = input.parse()?;
        if key == "id" {
            Ok(EntityAttrElem::Id(Box::new(input.parse()?)))
        } else if key == "debug" {
            Ok(EntityAttrElem::Debug(parse_bool(input.parse()?, "debug")?))
        } else {
            Err(syn::Error::new(
                key.span(),
                "unknown key in attribute; expected 'id' or 'debug'",
            ))
        }
    }
}
