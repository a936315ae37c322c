use crate::utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, parse_macro_input};

/// #[entity_id] 宏实现
/// 仅支持单字段 tuple struct（如 `struct OrderId(Uuid);`），使其满足 `Entity::Id` 的约束：
/// - 合并/追加派生：Default, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize（透明序列化）
/// - 提供 new(value)、is_unset()、Display、FromStr 与双向 From
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[entity_id] takes no arguments",
        )
        .to_compile_error()
        .into();
    }

    let mut st = match parse_macro_input!(item as Item) {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[entity_id] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let inner_ty = match &st.fields {
        syn::Fields::Unnamed(f) if f.unnamed.len() == 1 => f.unnamed[0].ty.clone(),
        other => {
            return syn::Error::new(
                other.span(),
                "#[entity_id] requires a tuple struct with exactly one field, e.g., struct X(Uuid);",
            )
            .to_compile_error()
            .into();
        }
    };

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Default),
        syn::parse_quote!(Clone),
        syn::parse_quote!(Debug),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
        syn::parse_quote!(Hash),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    apply_derives(&mut st.attrs, required);
    st.attrs.push(syn::parse_quote!(#[serde(transparent)]));

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    let out = quote! {
        #st

        impl #impl_generics #ident #ty_generics #where_clause {
            pub fn new(value: #inner_ty) -> Self { Self(value) }

            /// 是否仍为默认值（未赋值的标识）
            pub fn is_unset(&self) -> bool
            where #inner_ty: ::core::default::Default + ::core::cmp::PartialEq
            {
                self.0 == <#inner_ty as ::core::default::Default>::default()
            }
        }

        impl #impl_generics ::std::str::FromStr for #ident #ty_generics #where_clause
        where #inner_ty: ::std::str::FromStr
        {
            type Err = <#inner_ty as ::std::str::FromStr>::Err;
            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                s.parse::<#inner_ty>().map(Self)
            }
        }

        impl #impl_generics ::std::fmt::Display for #ident #ty_generics #where_clause
        where #inner_ty: ::std::fmt::Display
        {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl #impl_generics ::core::convert::From<#inner_ty> for #ident #ty_generics #where_clause {
            fn from(value: #inner_ty) -> Self { Self(value) }
        }

        impl #impl_generics ::core::convert::From<#ident #ty_generics> for #inner_ty #where_clause {
            fn from(value: #ident #ty_generics) -> Self { value.0 }
        }
    };

    TokenStream::from(out)
}
