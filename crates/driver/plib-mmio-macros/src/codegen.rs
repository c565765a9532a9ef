//! Code generation for the `register_block!` macro.
//!
//! Transforms the parsed register block definition into a struct with typed
//! volatile accessor methods.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::parse::{AccessMode, RegisterBlock, RegisterDef};

/// Generates the complete output for a register block definition.
pub fn generate(block: &RegisterBlock) -> TokenStream {
    let vis = &block.vis;
    let name = &block.name;
    let attrs = &block.attrs;

    let methods: Vec<TokenStream> = block.registers.iter().map(generate_methods).collect();

    quote! {
        #(#attrs)*
        #[derive(Debug, Clone, Copy)]
        #vis struct #name {
            base: usize,
        }

        impl #name {
            /// Creates a new register block accessor.
            ///
            /// # Safety
            ///
            /// `base` must be the address of a valid MMIO region (or memory
            /// standing in for one) covering all defined registers, suitably
            /// aligned, for as long as the accessor is used.
            #[must_use]
            #vis const unsafe fn new(base: usize) -> Self {
                Self { base }
            }

            /// Returns the base address.
            #[must_use]
            #vis const fn base(&self) -> usize {
                self.base
            }

            #(#methods)*
        }
    }
}

/// Generates accessor methods for a single register.
fn generate_methods(reg: &RegisterDef) -> TokenStream {
    let mut methods = TokenStream::new();

    if let Some(m) = generate_read(reg) {
        methods.extend(m);
    }
    if let Some(m) = generate_write(reg) {
        methods.extend(m);
    }
    if let Some(m) = generate_modify(reg) {
        methods.extend(m);
    }

    methods
}

/// Generates the read accessor for a register, if applicable.
fn generate_read(reg: &RegisterDef) -> Option<TokenStream> {
    if !reg.access.readable() {
        return None;
    }

    let name = &reg.name;
    let offset = &reg.offset;
    let width_ty = width_type(reg);
    let attrs = &reg.attrs;

    let raw_read = quote! {
        // SAFETY: Caller of `new` guarantees base points to a valid MMIO region.
        unsafe {
            core::ptr::read_volatile((self.base + #offset) as *const #width_ty)
        }
    };

    Some(match reg.bitflags_type {
        Some(ref bf_type) => quote! {
            #(#attrs)*
            #[inline]
            #[must_use]
            pub fn #name(&self) -> #bf_type {
                let raw = #raw_read;
                #bf_type::from_bits_retain(raw)
            }
        },
        None => quote! {
            #(#attrs)*
            #[inline]
            #[must_use]
            pub fn #name(&self) -> #width_ty {
                #raw_read
            }
        },
    })
}

/// Generates the write accessor for a register, if applicable.
fn generate_write(reg: &RegisterDef) -> Option<TokenStream> {
    if !reg.access.writable() {
        return None;
    }

    let name = &reg.name;
    let setter_name = format_ident!("set_{}", name);
    let offset = &reg.offset;
    let width_ty = width_type(reg);
    let set_doc = format!("Writes the `{name}` register.");

    let (value_ty, raw) = match reg.bitflags_type {
        Some(ref bf_type) => (quote! { #bf_type }, quote! { value.bits() }),
        None => (quote! { #width_ty }, quote! { value }),
    };

    Some(quote! {
        #[doc = #set_doc]
        #[inline]
        pub fn #setter_name(&self, value: #value_ty) {
            // SAFETY: Caller of `new` guarantees base points to a valid MMIO region.
            unsafe {
                core::ptr::write_volatile((self.base + #offset) as *mut #width_ty, #raw);
            }
        }
    })
}

/// Generates the read-modify-write helper for a read-write register.
fn generate_modify(reg: &RegisterDef) -> Option<TokenStream> {
    if reg.access != AccessMode::ReadWrite {
        return None;
    }

    let name = &reg.name;
    let setter_name = format_ident!("set_{}", name);
    let modify_name = format_ident!("modify_{}", name);
    let modify_doc = format!("Read-modify-writes the `{name}` register.");
    let value_ty = match reg.bitflags_type {
        Some(ref bf_type) => quote! { #bf_type },
        None => width_type(reg),
    };

    Some(quote! {
        #[doc = #modify_doc]
        #[inline]
        pub fn #modify_name(&self, f: impl FnOnce(#value_ty) -> #value_ty) {
            self.#setter_name(f(self.#name()));
        }
    })
}

/// Returns the token stream for the register's width type.
fn width_type(reg: &RegisterDef) -> TokenStream {
    let ident = format_ident!("{}", reg.width.type_name());
    quote! { #ident }
}
