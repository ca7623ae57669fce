//! Code generation for the `#[routes]` attribute macro.
//!
//! Generates:
//! - The user's impl block (methods wrapped by interceptors / transactions / managed resources)
//! - Free-standing Axum handler functions
//! - `impl Controller<State>` — route registration, metadata, consumers, scheduled tasks

mod controller_impl;
mod handlers;
mod wrapping;

use proc_macro2::TokenStream;
use quote::quote;

use crate::routes_parsing::RoutesImplDef;

/// Main entry point: generate all code for a `#[routes]` impl block.
pub fn generate(def: &RoutesImplDef) -> TokenStream {
    let impl_block = wrapping::generate_impl_block(def);
    let handlers = handlers::generate_handlers(def);
    let controller_impl = controller_impl::generate_controller_impl(def);

    quote! {
        #impl_block
        #handlers
        #controller_impl
    }
}
