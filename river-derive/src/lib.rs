//! `#[derive(River)]`: record support for the River runtime.
//!
//! ```ignore
//! #[derive(River, Clone, Default)]
//! #[river(default, validate)]
//! struct Rule {
//!     #[river(",label")]
//!     name: String,
//!     #[river("action,attr,optional")]
//!     action: String,
//! }
//! ```
//!
//! Field attributes hold the raw tag text; it is validated when the record
//! type is first resolved at runtime. Struct attributes opt into lifecycle
//! hooks: `default` (`Defaulter`), `validate` (`Validator`) and `unmarshal`
//! (`Unmarshaler`), each of which the struct must implement.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

#[proc_macro_derive(River, attributes(river))]
pub fn derive_river(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct Hooks {
    default: bool,
    validate: bool,
    unmarshal: bool,
}

fn struct_hooks(input: &DeriveInput) -> syn::Result<Hooks> {
    let mut hooks = Hooks::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("river")) {
        attr.parse_nested_meta(|meta| {
            let slot = if meta.path.is_ident("default") {
                &mut hooks.default
            } else if meta.path.is_ident("validate") {
                &mut hooks.validate
            } else if meta.path.is_ident("unmarshal") {
                &mut hooks.unmarshal
            } else {
                return Err(meta.error("expected `default`, `validate` or `unmarshal`"));
            };
            if *slot {
                return Err(meta.error("duplicate river hook"));
            }
            *slot = true;
            Ok(())
        })?;
    }
    Ok(hooks)
}

fn hook_accessors(hooks: &Hooks) -> TokenStream2 {
    let default = hooks.default.then(|| {
        quote! {
            fn defaulter(&mut self) -> ::core::option::Option<&mut dyn ::river::Defaulter> {
                ::core::option::Option::Some(self)
            }
        }
    });
    let validate = hooks.validate.then(|| {
        quote! {
            fn validator(&self) -> ::core::option::Option<&dyn ::river::Validator> {
                ::core::option::Option::Some(self)
            }
        }
    });
    let unmarshal = hooks.unmarshal.then(|| {
        quote! {
            fn unmarshaler(&mut self) -> ::core::option::Option<&mut dyn ::river::Unmarshaler> {
                ::core::option::Option::Some(self)
            }
        }
    });
    quote! {
        #default
        #validate
        #unmarshal
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "River cannot be derived for generic types",
        ));
    }
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "River can only be derived for structs",
        ));
    };
    let fields: Vec<&syn::Field> = match &data.fields {
        Fields::Named(named) => named.named.iter().collect(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                &data.fields,
                "River requires named fields",
            ))
        }
    };

    let name = &input.ident;
    let hooks = hook_accessors(&struct_hooks(input)?);

    let mut raw_tags = Vec::new();
    let mut indices = Vec::new();
    let mut idents = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        let Some(ident) = &field.ident else {
            continue;
        };
        let field_name = ident.to_string();
        let mut tags = field.attrs.iter().filter(|a| a.path().is_ident("river"));
        let Some(attr) = tags.next() else {
            raw_tags.push(quote! { ::river::RawTag::untagged(#field_name) });
            continue;
        };
        if let Some(extra) = tags.next() {
            return Err(syn::Error::new_spanned(extra, "duplicate river attribute"));
        }

        let tag: LitStr = attr.parse_args()?;
        let ty = &field.ty;
        raw_tags.push(quote! {
            ::river::RawTag::new(#field_name, #tag, <#ty as ::river::HostValue>::host_type)
        });
        indices.push(i);
        idents.push(ident);
    }

    Ok(quote! {
        impl ::river::HostValue for #name {
            fn host_type() -> ::river::HostType {
                ::river::HostType::record::<Self>()
            }

            fn type_of(&self) -> ::river::HostType {
                <Self as ::river::HostValue>::host_type()
            }

            fn encode(&self) -> ::river::Value {
                ::river::value::encode_record(self)
            }

            fn set_zero(&mut self) {
                *self = ::core::default::Default::default();
            }

            fn assign_exact(&mut self, value: &::river::Value) -> bool {
                ::river::value::assign_exact(self, value)
            }

            fn decode_converted(
                &mut self,
                value: &::river::Value,
            ) -> ::core::result::Result<(), ::river::ValueError> {
                ::river::value::decode_record(value, self)
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }

            fn record(&self) -> ::core::option::Option<&dyn ::river::Record> {
                ::core::option::Option::Some(self)
            }

            fn record_mut(&mut self) -> ::core::option::Option<&mut dyn ::river::Record> {
                ::core::option::Option::Some(self)
            }

            #hooks
        }

        impl ::river::Record for #name {
            fn raw_tags() -> ::std::vec::Vec<::river::RawTag> {
                ::std::vec![#(#raw_tags),*]
            }

            fn fields(&self) -> ::std::sync::Arc<[::river::Field]> {
                ::river::tags::resolve::<Self>()
            }

            fn field(&self, index: usize) -> &dyn ::river::HostValue {
                match index {
                    #(#indices => &self.#idents as &dyn ::river::HostValue,)*
                    _ => ::river::tags::no_such_field(::core::any::type_name::<Self>(), index),
                }
            }

            fn field_mut(&mut self, index: usize) -> &mut dyn ::river::HostValue {
                match index {
                    #(#indices => &mut self.#idents as &mut dyn ::river::HostValue,)*
                    _ => ::river::tags::no_such_field(::core::any::type_name::<Self>(), index),
                }
            }

            fn as_host(&self) -> &dyn ::river::HostValue {
                self
            }

            fn as_host_mut(&mut self) -> &mut dyn ::river::HostValue {
                self
            }
        }
    })
}
