use quote::ToTokens;
use syn::{Attribute, Field, FieldsNamed, Token, punctuated::Punctuated};

// 拆分出已有 derive 列表与其余属性
fn split_derives(attrs: &[Attribute]) -> (Vec<Attribute>, Vec<syn::Path>) {
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

// 归一化 derive 的 key，避免 Serialize/serde::Serialize 重复
fn derive_key(p: &syn::Path) -> String {
    match p.segments.last() {
        Some(last) => {
            let ident = last.ident.to_string();
            match ident.as_str() {
                "Serialize" | "Deserialize" => format!("serde::{ident}"),
                _ => ident,
            }
        }
        None => p.to_token_stream().to_string(),
    }
}

/// 合并必需与已有的 derive（去重，必需项在前），并放在属性列表最前
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let (retained, existing) = split_derives(attrs);

    let mut seen = std::collections::HashSet::<String>::new();
    let merged: Vec<syn::Path> = required
        .into_iter()
        .chain(existing)
        .filter(|p| seen.insert(derive_key(p)))
        .collect();

    let derive: Attribute = syn::parse_quote!(#[derive(#(#merged),*)]);
    *attrs = std::iter::once(derive).chain(retained).collect();
}

pub(crate) fn field_name_is(f: &Field, name: &str) -> bool {
    f.ident.as_ref().map(|i| i == name).unwrap_or(false)
}

/// 确保具名字段中存在所需字段
/// - `leading`：放在最前面的字段（已存在则复用原定义并移动到前面）
/// - `trailing`：放在最后面的字段（已存在则保持原位置）
pub(crate) fn ensure_fields(fields_named: &mut FieldsNamed, leading: &[Field], trailing: &[Field]) {
    let old_named = fields_named.named.clone();
    let mut new_named: Punctuated<Field, Token![,]> = Punctuated::new();

    let name_of = |f: &Field| f.ident.as_ref().map(|i| i.to_string()).unwrap_or_default();

    for required in leading {
        let name = name_of(required);
        match old_named.iter().find(|f| field_name_is(f, &name)) {
            Some(existing) => new_named.push(existing.clone()),
            None => new_named.push(required.clone()),
        }
    }

    for f in old_named.iter() {
        let is_leading = leading.iter().any(|r| field_name_is(f, &name_of(r)));
        if !is_leading {
            new_named.push(f.clone());
        }
    }

    for required in trailing {
        let name = name_of(required);
        if !old_named.iter().any(|f| field_name_is(f, &name)) {
            new_named.push(required.clone());
        }
    }

    fields_named.named = new_named;
}
