use proc_macro::TokenStream;
mod ast_node;

/// Used on the AST types of ledgerscript-lib.
///
/// Every node carries an id, which is the index into the location table the parser
/// returns together with the tree. Diagnostics and the analysis tables are keyed by it,
/// so every node type needs a uniform way to hand it out.
///
/// This Macro generates `impl crate::core::AstNode for T` with `fn id(&self) -> NodeId`:
/// * structs with named fields must have a field `id: usize`
/// * tuple structs must have the id as their first field
/// * enums may contain variants with a single unnamed field that is itself a node
///   (the call is forwarded), or variants with named fields including `id`
///
/// Like the rest of the crate, the generated code refers to `crate::core` directly, so
/// the derive is only usable inside ledgerscript-lib.
#[proc_macro_derive(AstNode)]
pub fn ast_node(tokens: TokenStream) -> TokenStream {
    ast_node::ast_node_impl(tokens)
}
