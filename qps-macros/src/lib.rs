use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ItemFn;

/// Proc macro to denote a measured RPC
///
/// The function body is timed and its latency and status code are recorded into the
/// enclosing `Worker::scope`. Calls outside of a worker scope are passed through unrecorded.
///
/// NOTE: Currently this macro only works on `async` functions with a `Result<T, E>` return
/// value, where `E: AsStatus`.
///
/// # Example
/// ```ignore
/// use qps::prelude::*;
///
/// #[rpc]
/// async fn unary_call(client: &Client) -> Result<Response, Status> {
///     ...
/// }
/// ```
#[proc_macro_attribute]
pub fn rpc(attr: TokenStream, item: TokenStream) -> TokenStream {
    rpc_internal(attr, item).into()
}

fn rpc_internal(_attr: TokenStream, item: TokenStream) -> TokenStream2 {
    let input = match syn::parse::<ItemFn>(item) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(sig.fn_token, "#[rpc] requires an async fn")
            .to_compile_error();
    }

    let name = &sig.ident;
    let stmts = &block.stmts;

    quote! {
        #(#attrs)* #vis #sig {
            ::qps::recorder::rpc_hook(::qps::core::generate_labels!(#name), async move {
                #(#stmts)*
            }).await
        }
    }
}
