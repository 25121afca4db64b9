use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

pub fn ast_node_impl(tokens: TokenStream) -> TokenStream {
    let def = parse_macro_input!(tokens as DeriveInput);
    let body = match &def.data {
        Data::Struct(st) => struct_body(&def, &st.fields),
        Data::Enum(en) => enum_body(en),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &def.ident,
            "AstNode can only be derived for structs and enums",
        )),
    };
    let body = match body {
        Ok(body) => body,
        Err(e) => return e.to_compile_error().into(),
    };

    let name = &def.ident;
    quote! {
        impl crate::core::AstNode for #name {
            fn id(&self) -> crate::core::NodeId {
                #body
            }
        }
    }
    .into()
}

fn struct_body(def: &DeriveInput, fields: &Fields) -> syn::Result<TokenStream2> {
    match fields {
        Fields::Named(named) => {
            if named.named.iter().any(is_id_field) {
                Ok(quote!(self.id))
            } else {
                Err(syn::Error::new_spanned(
                    &def.ident,
                    "a struct with named fields must have an `id` field",
                ))
            }
        }
        Fields::Unnamed(unnamed) if !unnamed.unnamed.is_empty() => Ok(quote!(self.0)),
        _ => Err(syn::Error::new_spanned(
            &def.ident,
            "a tuple struct must carry its id as the first field, unit structs are not nodes",
        )),
    }
}

fn enum_body(en: &syn::DataEnum) -> syn::Result<TokenStream2> {
    let mut arms = TokenStream2::new();
    for variant in &en.variants {
        let var_name = &variant.ident;
        let arm = match &variant.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                quote! { Self::#var_name(x) => crate::core::AstNode::id(x), }
            }
            Fields::Named(fields) if fields.named.iter().any(is_id_field) => {
                quote! { Self::#var_name { id, .. } => *id, }
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    variant,
                    "enum variants must wrap a single node or have an `id` field",
                ))
            }
        };
        arms.extend(arm);
    }
    Ok(quote! {
        match self {
            #arms
        }
    })
}

fn is_id_field(field: &syn::Field) -> bool {
    field.ident.as_ref().map_or(false, |ident| ident == "id")
}
