// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Procedural macro behind `test_with_tracing::test`.

use proc_macro::TokenStream;
use quote::quote;
use syn::parse_macro_input;
use syn::spanned::Spanned;
use syn::Error;
use syn::ItemFn;

/// Attribute macro for creating tests with tracing support.
///
/// This macro wraps a test function to automatically initialize tracing
/// and create a tracing span for the test execution. The test function
/// must be synchronous and take no arguments.
///
/// # Errors
///
/// Returns a compile error if:
/// - The function is marked as async
/// - The function has any parameters
#[proc_macro_attribute]
pub fn test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemFn);
    make_test(item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn make_test(item: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    if item.sig.asyncness.is_some() {
        return Err(Error::new(
            item.sig.fn_token.span(),
            "test function must not be async",
        ));
    }

    let name = &item.sig.ident;
    let return_type = &item.sig.output;
    if !item.sig.inputs.is_empty() {
        return Err(Error::new(item.sig.inputs.span(), "expected 0 arguments"));
    };
    let attrs = &item.attrs;

    // Attributes belong to the harness entry point only.
    let mut inner = item.clone();
    inner.attrs.clear();

    Ok(quote! {
        #[::core::prelude::v1::test]
        #(#attrs)*
        fn #name() #return_type {
            #inner
            ::test_with_tracing::init();
            let span = ::test_with_tracing::tracing::span!(
                ::test_with_tracing::tracing::Level::INFO,
                stringify!(#name)
            );
            let _span_guard = span.enter();
            #name()
        }
    })
}
