use proc_macro::TokenStream;
use syn::DeriveInput;

macro_rules! error {
    ($($tt:tt)*) => {
        return Err(syn::Error::new(proc_macro::Span::call_site().into(), format!($($tt)*)))
    };
}

mod from_record;
mod into_record;

/// Implement `FromRecord` and `FromValue`.
///
/// Named fields are looked up by name, tuple struct fields by position.
#[proc_macro_derive(FromRecord)]
pub fn from_record(input: TokenStream) -> TokenStream {
    match from_record::from_record(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}

/// Implement `IntoRecord` and `From<Self> for Value`.
///
/// Every field type must implement `Into<Value>`.
#[proc_macro_derive(IntoRecord)]
pub fn into_record(input: TokenStream) -> TokenStream {
    match into_record::into_record(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}
