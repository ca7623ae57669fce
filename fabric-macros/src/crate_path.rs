//! Crate path resolution for generated code.
//!
//! Detects whether the user depends on `fabric` (facade) or `fabric-core` directly,
//! and returns the appropriate path prefix for generated code.

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;

/// Returns the token stream for accessing `fabric_core` types.
///
/// If the user depends on `fabric`, returns `::fabric`.
/// Otherwise returns `::fabric_core`.
pub fn fabric_core_path() -> TokenStream {
    // First check if the facade crate is available
    if let Ok(found) = crate_name("fabric") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else if let Ok(found) = crate_name("fabric-core") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else {
        // Fallback - assume fabric_core is available (for error messages)
        quote!(::fabric_core)
    }
}

/// Returns the token stream for accessing `fabric_security` types.
///
/// If the user depends on `fabric`, returns `::fabric::fabric_security`.
/// Otherwise returns `::fabric_security`.
pub fn fabric_security_path() -> TokenStream {
    // First check if the facade crate is available
    if let Ok(found) = crate_name("fabric") {
        match found {
            FoundCrate::Itself => quote!(crate::fabric_security),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::fabric_security)
            }
        }
    } else if let Ok(found) = crate_name("fabric-security") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else {
        // Fallback
        quote!(::fabric_security)
    }
}

/// Returns the token stream for accessing `fabric_events` types.
///
/// If the user depends on `fabric`, returns `::fabric::fabric_events`.
/// Otherwise returns `::fabric_events`.
pub fn fabric_events_path() -> TokenStream {
    if let Ok(found) = crate_name("fabric") {
        match found {
            FoundCrate::Itself => quote!(crate::fabric_events),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::fabric_events)
            }
        }
    } else if let Ok(found) = crate_name("fabric-events") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else {
        quote!(::fabric_events)
    }
}

/// Returns the token stream for accessing `fabric_scheduler` types.
///
/// If the user depends on `fabric`, returns `::fabric::fabric_scheduler`.
/// Otherwise returns `::fabric_scheduler`.
pub fn fabric_scheduler_path() -> TokenStream {
    // First check if the facade crate is available
    if let Ok(found) = crate_name("fabric") {
        match found {
            FoundCrate::Itself => quote!(crate::fabric_scheduler),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::fabric_scheduler)
            }
        }
    } else if let Ok(found) = crate_name("fabric-scheduler") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else {
        // Fallback
        quote!(::fabric_scheduler)
    }
}

/// Returns the token stream for accessing `fabric_devtools` types.
///
/// If the user depends on `fabric`, returns `::fabric::devtools`.
/// Otherwise returns `::fabric_devtools`.
pub fn fabric_devtools_path() -> TokenStream {
    if let Ok(found) = crate_name("fabric") {
        match found {
            FoundCrate::Itself => quote!(crate::devtools),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::devtools)
            }
        }
    } else if let Ok(found) = crate_name("fabric-devtools") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else {
        // Fallback
        quote!(::fabric_devtools)
    }
}

/// Returns the token stream for accessing `schemars` through `fabric-openapi`.
///
/// Resolution order:
/// 1. Direct `schemars` dependency → `::schemars`
/// 2. Direct `fabric-openapi` dependency → `::fabric_openapi::schemars`
/// 3. `fabric` facade → `::fabric::fabric_openapi::schemars`
///
/// Returns `None` if no path is found.
pub fn fabric_schemars_path() -> Option<TokenStream> {
    // Direct schemars dep
    if let Ok(found) = crate_name("schemars") {
        let p = match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        };
        return Some(p);
    }

    // Through fabric-openapi
    if let Ok(found) = crate_name("fabric-openapi") {
        let p = match found {
            FoundCrate::Itself => quote!(crate::schemars),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::schemars)
            }
        };
        return Some(p);
    }

    // Through fabric facade (assumes openapi feature is enabled)
    if let Ok(found) = crate_name("fabric") {
        let p = match found {
            FoundCrate::Itself => quote!(crate::fabric_openapi::schemars),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::fabric_openapi::schemars)
            }
        };
        return Some(p);
    }

    None
}

/// Returns the token stream for accessing `fabric_grpc` types.
///
/// If the user depends on `fabric`, returns `::fabric::fabric_grpc`.
/// Otherwise returns `::fabric_grpc`.
pub fn fabric_grpc_path() -> TokenStream {
    // First check if the facade crate is available
    if let Ok(found) = crate_name("fabric") {
        match found {
            FoundCrate::Itself => quote!(crate::fabric_grpc),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::fabric_grpc)
            }
        }
    } else if let Ok(found) = crate_name("fabric-grpc") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else {
        // Fallback
        quote!(::fabric_grpc)
    }
}
