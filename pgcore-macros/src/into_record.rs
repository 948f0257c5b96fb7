use proc_macro::TokenStream;
use quote::quote;
use syn::*;

pub fn into_record(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { attrs: _, vis: _, ident, mut generics, data } = input;
    let Data::Struct(data) = data else {
        error!("only struct are currently supported")
    };
    let Fields::Named(FieldsNamed { named, .. }) = data.fields else {
        error!("only struct with named fields is supported, composite fields are matched by name")
    };

    let len = named.len();
    let inserts = named
        .into_iter()
        .filter_map(|e| e.ident)
        .map(|id| (id.to_string(), id))
        .map(|(name, id)| quote! { record.insert(#name, self.#id); });

    for ty in generics.type_params_mut() {
        ty.bounds.push(syn::parse_quote!(::core::convert::Into<::pgcore::Value>));
    }

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #g1 ::pgcore::IntoRecord for #ident #g2 #g3 {
            fn into_record(self) -> ::pgcore::Record {
                let mut record = ::pgcore::Record::with_capacity(#len);
                #(#inserts)*
                record
            }
        }

        #[automatically_derived]
        impl #g1 ::core::convert::From<#ident #g2> for ::pgcore::Value #g3 {
            fn from(value: #ident #g2) -> Self {
                ::pgcore::Value::Record(::pgcore::IntoRecord::into_record(value))
            }
        }
    }.into())
}
