use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{ItemStruct, LitStr, Path, parse::ParseBuffer};

pub(crate) struct EntityMetadata {
    pub(crate) table: String,
    pub(crate) schema: String,
    pub(crate) alias: String,
    pub(crate) select: String,
    pub(crate) comment: String,
    pub(crate) extends: Option<Path>,
}

impl EntityMetadata {
    pub(crate) fn extends_tokens(&self) -> TokenStream {
        match &self.extends {
            Some(parent) => quote!(Some(<#parent as ::trove::Entity>::info)),
            None => quote!(None),
        }
    }
}

fn string_argument(arg: &syn::meta::ParseNestedMeta, name: &str) -> String {
    let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
        panic!(
            "Error while parsing `{}`, use it like: `#[trove({} = \"value\")]`",
            name, name
        );
    };
    v.value()
}

pub(crate) fn decode_entity(item: &ItemStruct) -> EntityMetadata {
    let mut metadata = EntityMetadata {
        table: item.ident.to_string().to_case(Case::Snake),
        schema: String::new(),
        alias: String::new(),
        select: String::new(),
        comment: String::new(),
        extends: None,
    };
    for attr in &item.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("trove") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `trove`, use it like: `#[trove(attribute = value, ...)]`");
        };
        let _ = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("table") {
                metadata.table = string_argument(&arg, "table");
            } else if arg.path.is_ident("schema") {
                metadata.schema = string_argument(&arg, "schema");
            } else if arg.path.is_ident("alias") {
                metadata.alias = string_argument(&arg, "alias");
            } else if arg.path.is_ident("select") {
                metadata.select = string_argument(&arg, "select");
            } else if arg.path.is_ident("comment") {
                metadata.comment = string_argument(&arg, "comment");
            } else if arg.path.is_ident("extends") {
                let Ok(v) = arg.value().and_then(ParseBuffer::parse::<Path>) else {
                    panic!("Error while parsing `extends`, use it like: `#[trove(extends = ParentEntity)]`");
                };
                metadata.extends = Some(v);
            } else {
                panic!(
                    "Unknown attribute `{}` inside trove macro",
                    arg.path.to_token_stream().to_string()
                );
            }
            Ok(())
        });
    }
    metadata
}
