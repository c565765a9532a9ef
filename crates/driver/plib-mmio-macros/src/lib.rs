//! Proc-macro crate for the `register_block!` MMIO register DSL.
//!
//! Generates typed, safe MMIO register accessors from a declarative definition.
//! The single `unsafe` point is at struct construction (`new()`); all generated
//! read/write/modify methods are safe.

mod codegen;
mod parse;

use proc_macro::TokenStream;
use syn::parse_macro_input;

use crate::parse::RegisterBlock;

/// Generates a typed MMIO register block struct with safe accessors.
///
/// # Syntax
///
/// ```ignore
/// register_block! {
///     /// Doc comment for the struct.
///     pub StructName {
///         /// Doc comment for the register.
///         [offset; width; access_mode] name => OptionalBitflagsType,
///     }
/// }
/// ```
///
/// - `offset`: byte offset from base (integer literal, e.g. `0x04`)
/// - `width`: `u8`, `u16` or `u32`
/// - `access_mode`: `ro` (read-only), `wo` (write-only), `rw` (read-write)
/// - `name`: register name (generates method names)
/// - `=> Type`: optional bitflags type (must have `from_bits_retain`/`.bits()`)
///
/// # Generated Code
///
/// For each register, generates:
/// - `ro`/`rw`: `fn name(&self) -> Type` (reader)
/// - `wo`/`rw`: `fn set_name(&self, value: Type)` (writer)
/// - `rw`: `fn modify_name(&self, f: impl FnOnce(Type) -> Type)`
///   (read-modify-write, not atomic with respect to interrupts)
///
/// # Example
///
/// ```ignore
/// use plib_mmio::register_block;
///
/// register_block! {
///     /// UART registers.
///     pub UartRegs {
///         /// Control register.
///         [0x00; u32; rw] con => UartCon,
///         /// Status register.
///         [0x04; u32; rw] stat => UartStat,
///         /// Receive buffer (read-only).
///         [0x0C; u32; ro] rxb,
///     }
/// }
/// ```
#[proc_macro]
pub fn register_block(input: TokenStream) -> TokenStream {
    let block = parse_macro_input!(input as RegisterBlock);
    codegen::generate(&block).into()
}
