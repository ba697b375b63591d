use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Ident, ItemFn, LitStr};

/// Marks a test that runs the same way for sync and async bodies.
///
/// - `#[rxsingle_macro::test]` on a plain fn expands to `#[test]`.
/// - On an `async fn` it expands to `#[tokio::test]` (current-thread).
/// - `#[rxsingle_macro::test(threaded)]` on an `async fn` runs on the
///   multi-thread tokio runtime, which the cross-thread race tests need.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);
  let is_async = input.sig.asyncness.is_some();
  let raw_args = proc_macro2::TokenStream::from(attr);

  if raw_args.is_empty() {
    let expanded = if is_async {
      quote! {
        #[tokio::test]
        #input
      }
    } else {
      quote! {
        #[test]
        #input
      }
    };
    return TokenStream::from(expanded);
  }

  if !is_async {
    return syn::Error::new(
      raw_args.span(),
      "rxsingle_macro::test flavor args are only supported for async tests",
    )
    .to_compile_error()
    .into();
  }

  let flavor = if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
    ident.to_string()
  } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
    lit.value()
  } else {
    String::new()
  };

  let tokio_args = match flavor.as_str() {
    "current" => quote!(flavor = "current_thread"),
    "threaded" => quote!(flavor = "multi_thread", worker_threads = 4),
    _ => {
      return syn::Error::new(
        raw_args.span(),
        "rxsingle_macro::test only accepts: #[rxsingle_macro::test], \
         #[rxsingle_macro::test(current)] or #[rxsingle_macro::test(threaded)]",
      )
      .to_compile_error()
      .into();
    }
  };

  TokenStream::from(quote! {
    #[tokio::test(#tokio_args)]
    #input
  })
}
