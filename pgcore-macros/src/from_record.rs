use proc_macro::TokenStream;
use quote::quote;
use syn::{token::{Brace, Paren}, *};

pub fn from_record(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { attrs: _, vis: _, ident, mut generics, data } = input;
    let Data::Struct(data) = data else {
        error!("only struct are currently supported")
    };

    let mut head = quote! {};
    let mut output = quote! {};

    match data.fields {
        Fields::Unnamed(FieldsUnnamed { unnamed, .. }) => {
            head = quote! { let mut iter = record.into_iter(); };
            let body = (0..unnamed.len()).map(|i| quote! {
                match iter.next() {
                    Some((_, value)) => ::pgcore::FromValue::from_value(value)?,
                    None => return Err(::pgcore::DecodeError::IndexOutOfBounds(#i)),
                },
            });
            Paren::default().surround(&mut output, |e| e.extend(body));
        }
        Fields::Named(FieldsNamed { named, .. }) => {
            let body = named
                .into_iter()
                .filter_map(|e| e.ident)
                .map(|id| (id.to_string(), id))
                .map(|(name, id)| quote! {
                    #id: match record.remove(#name) {
                        Some(value) => ::pgcore::FromValue::from_value(value)?,
                        None => return Err(::pgcore::DecodeError::FieldNotFound(#name.into())),
                    },
                });
            Brace::default().surround(&mut output, |e| e.extend(body));
        }
        Fields::Unit => {}
    };

    for ty in generics.type_params_mut() {
        ty.bounds.push(syn::parse_quote!(::pgcore::FromValue));
    }

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #g1 ::pgcore::FromRecord for #ident #g2 #g3 {
            #[allow(unused_mut)]
            fn from_record(mut record: ::pgcore::Record) -> Result<Self, ::pgcore::DecodeError> {
                #head
                Ok(Self #output)
            }
        }

        #[automatically_derived]
        impl #g1 ::pgcore::FromValue for #ident #g2 #g3 {
            fn from_value(value: ::pgcore::Value) -> Result<Self, ::pgcore::DecodeError> {
                ::pgcore::record::record_from_value(value)
            }
        }
    }.into())
}
