use crate::utils::{apply_derives, ensure_fields};
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Field, Item, Result, Token, Type, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[entity] 宏实现
/// - 若缺失则在最前追加 `id: IdType` 字段，并实现 `::uow_domain::entity::Entity`
/// - 指定 `event = EventType` 时，在末尾追加不参与序列化的
///   `events: EventQueue<EventType>` 字段，并实现 `::uow_domain::aggregate::Aggregate`
/// - 参数：`#[entity(id = IdType, event = EventType, aggregate_type = "...", debug = bool)]`
///   - `id` 默认 `String`
///   - `aggregate_type` 默认结构体名
///   - `debug` 默认 `true`；为 `false` 时不派生 Debug
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

    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    let id_type = cfg.id_ty.unwrap_or_else(|| syn::parse_quote! { String });

    let leading: Vec<Field> = vec![syn::parse_quote! { id: #id_type }];
    let trailing: Vec<Field> = match &cfg.event_ty {
        Some(ev) => vec![syn::parse_quote! {
            #[serde(skip)]
            events: ::uow_domain::domain_event::EventQueue<#ev>
        }],
        None => Vec::new(),
    };
    ensure_fields(fields_named, &leading, &trailing);

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

    let aggregate_impl = cfg.event_ty.as_ref().map(|ev| {
        let type_name = cfg
            .aggregate_type
            .clone()
            .unwrap_or_else(|| syn::LitStr::new(&ident.to_string(), ident.span()));
        quote! {
            impl #impl_generics ::uow_domain::aggregate::Aggregate for #ident #ty_generics #where_clause {
                const TYPE: &'static str = #type_name;
                type Event = #ev;

                fn events(&self) -> &::uow_domain::domain_event::EventQueue<Self::Event> { &self.events }

                fn events_mut(&mut self) -> &mut ::uow_domain::domain_event::EventQueue<Self::Event> { &mut self.events }
            }
        }
    });

    let expanded = quote! {
        #st

        impl #impl_generics ::uow_domain::entity::Entity for #ident #ty_generics #where_clause {
            type Id = #id_type;

            fn id(&self) -> &Self::Id { &self.id }
        }

        #aggregate_impl
    };

    TokenStream::from(expanded)
}

// -------- parsing --------

#[derive(Default)]
struct EntityAttrConfig {
    id_ty: Option<Type>,
    event_ty: Option<Type>,
    aggregate_type: Option<syn::LitStr>,
    derive_debug: Option<bool>,
}

impl Parse for EntityAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut cfg = EntityAttrConfig::default();

        let elems = Punctuated::<EntityAttrElem, Token![,]>::parse_terminated(input)?;

        for elem in elems.into_iter() {
            match elem {
                EntityAttrElem::Id(ty) => {
                    if cfg.id_ty.is_some() {
                        return Err(syn::Error::new(ty.span(), "duplicate key 'id' in attribute"));
                    }
                    cfg.id_ty = Some(*ty);
                }
                EntityAttrElem::Event(ty) => {
                    if cfg.event_ty.is_some() {
                        return Err(syn::Error::new(
                            ty.span(),
                            "duplicate key 'event' in attribute",
                        ));
                    }
                    cfg.event_ty = Some(*ty);
                }
                EntityAttrElem::AggregateType(lit) => {
                    if cfg.aggregate_type.is_some() {
                        return Err(syn::Error::new(
                            lit.span(),
                            "duplicate key 'aggregate_type' in attribute",
                        ));
                    }
                    cfg.aggregate_type = Some(lit);
                }
                EntityAttrElem::Debug(b) => {
                    if cfg.derive_debug.is_some() {
                        return Err(syn::Error::new(
                            proc_macro2::Span::call_site(),
                            "duplicate key 'debug' in attribute",
                        ));
                    }
                    cfg.derive_debug = Some(b);
                }
            }
        }

        if cfg.aggregate_type.is_some() && cfg.event_ty.is_none() {
            return Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                "'aggregate_type' requires 'event'",
            ));
        }

        Ok(cfg)
    }
}

enum EntityAttrElem {
    Id(Box<Type>),
    Event(Box<Type>),
    AggregateType(syn::LitStr),
    Debug(bool),
}

impl Parse for EntityAttrElem {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: syn::Ident = input.parse()?;
        let _eq: Token![=] = input.parse()?;

        match key.to_string().as_str() {
            "id" => Ok(EntityAttrElem::Id(Box::new(input.parse()?))),
            "event" => Ok(EntityAttrElem::Event(Box::new(input.parse()?))),
            "aggregate_type" => Ok(EntityAttrElem::AggregateType(input.parse()?)),
            "debug" => {
                let lit: syn::LitBool = input.parse()?;
                Ok(EntityAttrElem::Debug(lit.value()))
            }
            _ => Err(syn::Error::new(
                key.span(),
                "unknown key in attribute; expected 'id' | 'event' | 'aggregate_type' | 'debug'",
            )),
        }
    }
}
