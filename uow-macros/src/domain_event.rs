use crate::utils::{apply_derives, ensure_fields};
use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashMap;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Expr, Field, Ident, Item, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[domain_event] 宏实现
/// - 仅支持具名字段变体：`Variant { .. }`
/// - 确保每个变体以 `id: String`（事件唯一标识）开头
/// - 生成 `::uow_domain::domain_event::DomainEvent` 实现（event_id/event_type/event_version）
/// - 枚举级参数：`#[domain_event(version = N)]`，默认 1
/// - 变体可覆写：`#[event(event_type = "...", event_version = N)]`，
///   未覆写时事件类型为 `Enum.Variant`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EventAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let enum_item = match &mut input {
        Item::Enum(e) => e,
        other => {
            return syn::Error::new(
                other.span(),
                "#[domain_event] can only be used on enum types",
            )
            .to_compile_error()
            .into();
        }
    };

    let version_lit = cfg.version.unwrap_or_else(|| syn::parse_quote! { 1 });

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    apply_derives(&mut enum_item.attrs, required);

    let id_field: Field = syn::parse_quote! { id: String };

    let mut variant_types: HashMap<String, syn::LitStr> = HashMap::new();
    let mut variant_versions: HashMap<String, syn::LitInt> = HashMap::new();

    for v in &mut enum_item.variants {
        let syn::Fields::Named(fields_named) = &mut v.fields else {
            return syn::Error::new(
                v.span(),
                "#[domain_event] supports only named-field enum variants, e.g., Variant { x: T }",
            )
            .to_compile_error()
            .into();
        };
        ensure_fields(fields_named, std::slice::from_ref(&id_field), &[]);

        let mut retained_attrs = Vec::new();
        for attr in v.attrs.iter() {
            if !attr.path().is_ident("event") {
                retained_attrs.push(attr.clone());
                continue;
            }

            let vc = match parse_variant_event_attr(attr) {
                Ok(vc) => vc,
                Err(err) => return err.to_compile_error().into(),
            };
            let key = v.ident.to_string();
            if let Some(lit) = vc.ty {
                if variant_types.insert(key.clone(), lit).is_some() {
                    return syn::Error::new(
                        attr.span(),
                        "duplicate 'event_type' specified for this variant",
                    )
                    .to_compile_error()
                    .into();
                }
            }
            if let Some(lit) = vc.version {
                if variant_versions.insert(key, lit).is_some() {
                    return syn::Error::new(
                        attr.span(),
                        "duplicate 'event_version' specified for this variant",
                    )
                    .to_compile_error()
                    .into();
                }
            }
        }
        v.attrs = retained_attrs;
    }

    let enum_ident = &enum_item.ident;
    let enum_name = enum_ident.to_string();

    let type_match_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        let lit = variant_types.get(&v_ident.to_string()).cloned().unwrap_or_else(|| {
            syn::LitStr::new(&format!("{enum_name}.{v_ident}"), v_ident.span())
        });
        quote! { Self::#v_ident { .. } => #lit }
    });

    let id_match_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        quote! { Self::#v_ident { id, .. } => id.as_str() }
    });

    let ver_match_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        match variant_versions.get(&v_ident.to_string()) {
            Some(lit) => quote! { Self::#v_ident { .. } => #lit },
            None => quote! { Self::#v_ident { .. } => #version_lit },
        }
    });

    let (impl_generics, ty_generics, where_clause) = enum_item.generics.split_for_impl();

    let out = quote! {
        #enum_item

        impl #impl_generics ::uow_domain::domain_event::DomainEvent for #enum_ident #ty_generics #where_clause {
            fn event_id(&self) -> &str { match self { #( #id_match_arms, )* } }
            fn event_type(&self) -> &str { match self { #( #type_match_arms, )* } }
            fn event_version(&self) -> usize { match self { #( #ver_match_arms, )* } }
        }
    };

    TokenStream::from(out)
}

// -------- parsing --------

struct VariantEventAttrConfig {
    ty: Option<syn::LitStr>,
    version: Option<syn::LitInt>,
}

fn parse_variant_event_attr(attr: &syn::Attribute) -> Result<VariantEventAttrConfig> {
    let pairs = attr.parse_args_with(Punctuated::<VariantEventAttrKv, Token![,]>::parse_terminated)?;

    let mut ty: Option<syn::LitStr> = None;
    let mut version: Option<syn::LitInt> = None;

    for kv in pairs {
        match (kv.key.to_string().as_str(), kv.value) {
            (
                "event_type",
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(lit),
                    ..
                }),
            ) if ty.is_none() => ty = Some(lit),
            (
                "event_version",
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Int(lit),
                    ..
                }),
            ) if version.is_none() => version = Some(lit),
            ("event_type" | "event_version", _) => {
                return Err(syn::Error::new(
                    kv.key.span(),
                    "expected a single string 'event_type' / integer 'event_version'",
                ));
            }
            _ => {
                return Err(syn::Error::new(
                    kv.key.span(),
                    "unknown key; expected 'event_type' | 'event_version'",
                ));
            }
        }
    }

    Ok(VariantEventAttrConfig { ty, version })
}

struct VariantEventAttrKv {
    key: Ident,
    value: Expr,
}

impl Parse for VariantEventAttrKv {
    fn parse(input: ParseStream) -> Result<Self> {
        let key = input.parse()?;
        let _eq: Token![=] = input.parse()?;
        let value = input.parse()?;
        Ok(Self { key, value })
    }
}

// 枚举级配置：默认事件版本号
struct EventAttrConfig {
    version: Option<syn::LitInt>,
}

impl Parse for EventAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut version: Option<syn::LitInt> = None;

        let pairs = Punctuated::<syn::MetaNameValue, Token![,]>::parse_terminated(input)?;
        for kv in pairs {
            if !kv.path.is_ident("version") {
                return Err(syn::Error::new(kv.path.span(), "unknown key; expected 'version'"));
            }
            if version.is_some() {
                return Err(syn::Error::new(
                    kv.path.span(),
                    "duplicate key 'version' in attribute",
                ));
            }
            match kv.value {
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Int(lit),
                    ..
                }) => version = Some(lit),
                other => {
                    return Err(syn::Error::new(
                        other.span(),
                        "expected integer literal for 'version'",
                    ));
                }
            }
        }

        Ok(Self { version })
    }
}
