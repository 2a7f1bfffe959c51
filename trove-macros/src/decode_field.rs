use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    Field, GenericArgument, Ident, LitInt, LitStr, PathArguments, Type, parse::ParseBuffer,
};

pub(crate) enum FieldType {
    /// Scalar stored through `AsValue`.
    Value,
    /// `Option<Relation<Target>>`.
    Relation(Type),
    /// The `EntityState` bookkeeping field.
    State,
}

pub(crate) struct FieldMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    pub(crate) kind: FieldType,
    pub(crate) column: String,
    pub(crate) nullable: bool,
    pub(crate) primary_key: bool,
    pub(crate) mandatory: bool,
    pub(crate) length: i32,
    pub(crate) precision: i32,
    pub(crate) default: String,
    pub(crate) comment: String,
    pub(crate) index: String,
    pub(crate) unique_index: String,
    pub(crate) db_type: String,
}

impl FieldMetadata {
    pub(crate) fn kind_tokens(&self) -> TokenStream {
        let ty = &self.ty;
        match &self.kind {
            FieldType::Relation(target) => {
                quote!(::trove::FieldKind::Relation(<#target as ::trove::Entity>::info))
            }
            _ => quote!(::trove::FieldKind::Value(<#ty as ::trove::AsValue>::as_empty_value)),
        }
    }
}

/// Inner type of `Wrapper<Inner>` when the last path segment is `wrapper`.
fn unwrap_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|v| match v {
        GenericArgument::Type(t) => Some(t),
        _ => None,
    })
}

fn is_named(ty: &Type, name: &str) -> bool {
    matches!(ty, Type::Path(p) if p.path.segments.last().is_some_and(|s| s.ident == name))
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

fn integer_argument(arg: &syn::meta::ParseNestedMeta, name: &str) -> i32 {
    let Ok(v) = arg
        .value()
        .and_then(ParseBuffer::parse::<LitInt>)
        .and_then(|v| v.base10_parse::<i32>())
    else {
        panic!("Error while parsing `{}`, use it like: `#[trove({} = 10)]`", name, name);
    };
    v
}

fn flag_argument(arg: &syn::meta::ParseNestedMeta, name: &str) {
    let Err(..) = arg.value() else {
        // value() is Err for Meta::Path
        panic!("Error while parsing `{}`, use it like: `#[trove({})]`", name, name);
    };
}

pub(crate) fn decode_field(field: &Field) -> FieldMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Field is expected to have a name");
    let option = unwrap_generic(&field.ty, "Option");
    let kind = if is_named(&field.ty, "EntityState") {
        FieldType::State
    } else if let Some(target) = option.and_then(|v| unwrap_generic(v, "Relation")) {
        FieldType::Relation(target.clone())
    } else if unwrap_generic(&field.ty, "Relation").is_some() {
        panic!(
            "Field `{}` must be declared as `Option<Relation<_>>`",
            ident
        );
    } else {
        FieldType::Value
    };
    let mut column = ident.to_string();
    if column.starts_with('_') {
        column.remove(0);
    }
    let mut metadata = FieldMetadata {
        ident,
        ty: field.ty.clone(),
        kind,
        column,
        nullable: option.is_some(),
        primary_key: false,
        mandatory: false,
        length: -1,
        precision: -1,
        default: String::new(),
        comment: String::new(),
        index: String::new(),
        unique_index: String::new(),
        db_type: String::new(),
    };
    for attr in &field.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("trove") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `trove`, use it like: `#[trove(attribute = value, ...)]`");
        };
        let _ = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("column") {
                metadata.column = string_argument(&arg, "column");
            } else if arg.path.is_ident("primary_key") {
                flag_argument(&arg, "primary_key");
                metadata.primary_key = true;
            } else if arg.path.is_ident("mandatory") {
                flag_argument(&arg, "mandatory");
                metadata.mandatory = true;
            } else if arg.path.is_ident("length") {
                metadata.length = integer_argument(&arg, "length");
            } else if arg.path.is_ident("precision") {
                metadata.precision = integer_argument(&arg, "precision");
            } else if arg.path.is_ident("default") {
                metadata.default = string_argument(&arg, "default");
            } else if arg.path.is_ident("comment") {
                metadata.comment = string_argument(&arg, "comment");
            } else if arg.path.is_ident("index") {
                metadata.index = string_argument(&arg, "index");
            } else if arg.path.is_ident("unique_index") {
                metadata.unique_index = string_argument(&arg, "unique_index");
            } else if arg.path.is_ident("db_type") {
                metadata.db_type = string_argument(&arg, "db_type");
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
