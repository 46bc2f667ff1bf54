use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Error, Expr, ItemFn, ReturnType};

/// Expansion of `#[transactional(<unit>)]`
///
/// ```rust,ignore
/// #[transactional(UNIT)]
/// fn work(arg: Arg) -> Result<T, E> { body }
/// ```
///
/// becomes
///
/// ```rust,ignore
/// fn work(arg: Arg) -> Result<T, E> {
///     (UNIT).transactional(move || -> Result<T, E> { body })
/// }
/// ```
pub fn transactional_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let function = parse_macro_input!(item as ItemFn);

    if attr.is_empty() {
        return Error::new_spanned(
            &function.sig.ident,
            "transactional requires a persistence unit: #[transactional(<unit expression>)]",
        )
        .to_compile_error()
        .into();
    }
    let unit = parse_macro_input!(attr as Expr);

    match expand(unit, function) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(unit: Expr, function: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = function;

    if let Some(asyncness) = &sig.asyncness {
        return Err(Error::new_spanned(
            asyncness,
            "transactional cannot be used on async functions: sessions are bound to the calling thread",
        ));
    }

    let return_type = match &sig.output {
        ReturnType::Type(_, ty) => ty,
        ReturnType::Default => {
            return Err(Error::new_spanned(
                &sig.ident,
                "transactional functions must return Result<T, E>",
            ))
        }
    };

    let statements = &block.stmts;

    Ok(quote! {
        #(#attrs)*
        #vis #sig {
            (#unit).transactional(move || -> #return_type {
                #(#statements)*
            })
        }
    })
}
