use crate::utils::{apply_derives, parse_bool};
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Item, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[value_object] 宏实现
/// - 支持结构体（具名或 tuple）与枚举
/// - 合并/追加派生：Default, Clone, (Debug 可控), Serialize, Deserialize, PartialEq, Eq
/// - 参数：`#[value_object(debug = true|false)]`，默认 true
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as ValueObjectAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let mut required: Vec<syn::Path> = vec![
        syn::parse_quote!(Default),
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
    ];
    if cfg.derive_debug {
        required.insert(0, syn::parse_quote!(Debug));
    }

    match &mut input {
        Item::Struct(st) => {
            apply_derives(&mut st.attrs, required);
            TokenStream::from(quote! { #st })
        }
        Item::Enum(en) => {
            apply_derives(&mut en.attrs, required);
            TokenStream::from(quote! { #en })
        }
        other => syn::Error::new(other.span(), "#[value_object] only supports struct or enum")
            .to_compile_error()
            .into(),
    }
}

struct ValueObjectAttrConfig {
    derive_debug: bool,
}

impl Parse for ValueObjectAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut derive_debug: Option<bool> = None;
        let pairs: Punctuated<(syn::Ident, syn::Expr), Token![,]> =
            Punctuated::parse_terminated_with(input, |input| {
                let key: syn::Ident = input.parse()?;
                let _eq: Token![=] = input.parse()?;
                Ok((key, input.parse()?))
            })?;

        for (key, expr) in pairs {
            if key != "debug" {
                return Err(syn::Error::new(
                    key.span(),
                    "unknown key in attribute; expected 'debug'",
                ));
            }
            if derive_debug.is_some() {
                return Err(syn::Error::new(key.span(), "duplicate key 'debug' in attribute"));
            }
            derive_debug = Some(parse_bool(expr, "debug")?);
        }

        Ok(Self {
            derive_debug: derive_debug.unwrap_or(true),
        })
    }
}
