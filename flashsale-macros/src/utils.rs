use quote::ToTokens;
use syn::{Attribute, Field, FieldsNamed, Token, Type, punctuated::Punctuated};

// 提取非 derive 属性与已有 derive 列表
pub(crate) fn split_derives(attrs: &[Attribute]) -> (Vec<Attribute>, Vec<syn::Path>) {
    let mut retained = Vec::new();
    let mut existing = Vec::new();
    for attr in attrs.iter() {
        if attr.path().is_ident("derive") {
            if let Ok(list) =
                attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
            {
                existing.extend(list);
            }
        } else {
            retained.push(attr.clone());
        }
    }
    (retained, existing)
}

// 合并默认与已有 derive（去重，required 在前）
pub(crate) fn merge_derives(existing: Vec<syn::Path>, required: Vec<syn::Path>) -> Attribute {
    let mut seen = std::collections::HashSet::<String>::new();
    let mut merged: Vec<syn::Path> = Vec::new();
    for p in required.into_iter().chain(existing) {
        if seen.insert(derive_key(&p)) {
            merged.push(p);
        }
    }
    syn::parse_quote!(#[derive(#(#merged),*)])
}

// Serialize 与 serde::Serialize 视为同一项
fn derive_key(p: &syn::Path) -> String {
    match p.segments.last() {
        Some(last) => {
            let name = last.ident.to_string();
            match name.as_str() {
                "Serialize" | "Deserialize" => format!("serde::{name}"),
                _ => name,
            }
        }
        None => p.to_token_stream().to_string(),
    }
}

pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let (retained, existing) = split_derives(attrs);
    let merged = merge_derives(existing, required);
    *attrs = std::iter::once(merged).chain(retained).collect();
}

/// 确保具名字段结构体包含 `required` 中的字段，并按给定顺序置于最前；
/// 已存在的同名字段沿用用户定义（保留其属性与可见性）。
pub(crate) fn ensure_leading_fields(fields_named: &mut FieldsNamed, required: &[(&str, &Type)]) {
    let old_named = fields_named.named.clone();
    let mut new_named: Punctuated<Field, Token![,]> = Punctuated::new();

    for (name, ty) in required {
        match old_named.iter().find(|f| is_named(f, name)) {
            Some(existing) => new_named.push(existing.clone()),
            None => {
                let ident = syn::Ident::new(name, proc_macro2::Span::call_site());
                new_named.push(syn::parse_quote! { #ident: #ty });
            }
        }
    }

    for f in old_named {
        if !required.iter().any(|(name, _)| is_named(&f, name)) {
            new_named.push(f);
        }
    }

    fields_named.named = new_named;
}

fn is_named(field: &Field, name: &str) -> bool {
    field.ident.as_ref().is_some_and(|i| i == name)
}

/// 解析 `key = true|false`
pub(crate) fn parse_bool(expr: syn::Expr, key: &str) -> syn::Result<bool> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Bool(b),
            ..
        }) => Ok(b.value()),
        other => Err(syn::Error::new_spanned(
            other,
            format!("expected boolean literal for '{key}'"),
        )),
    }
}
