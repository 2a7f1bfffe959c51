mod decode_entity;
mod decode_field;

use decode_entity::decode_entity;
use decode_field::{FieldType, decode_field};
use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemStruct, parse_macro_input};

/// Implement `trove::Entity` and generate one typed key constant per field.
///
/// The struct must hold exactly one `EntityState` field, relations are
/// declared as `Option<Relation<Target>>`.
#[proc_macro_derive(Entity, attributes(trove))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    let name = &item.ident;
    let entity = decode_entity(&item);
    let decoded: Vec<_> = item.fields.iter().map(decode_field).collect();
    let mut states = decoded.iter().filter(|f| matches!(f.kind, FieldType::State));
    let Some(state) = states.next().map(|f| &f.ident) else {
        panic!("Entity `{}` needs a field of type `trove::EntityState`", name);
    };
    if states.next().is_some() {
        panic!("Entity `{}` declares more than one `EntityState` field", name);
    }
    let fields: Vec<_> = decoded
        .iter()
        .filter(|f| !matches!(f.kind, FieldType::State))
        .collect();

    let keys = fields.iter().enumerate().map(|(i, f)| {
        let ident = &f.ident;
        let ty = &f.ty;
        quote! {
            pub const #ident: ::trove::Key<#name, #ty> = ::trove::Key::new(#i);
        }
    });
    let infos = fields.iter().map(|f| {
        let field_name = f.ident.to_string();
        let column = &f.column;
        let kind = f.kind_tokens();
        let nullable = f.nullable;
        let primary_key = f.primary_key;
        let mandatory = f.mandatory;
        let length = f.length;
        let precision = f.precision;
        let default = &f.default;
        let comment = &f.comment;
        let index = &f.index;
        let unique_index = &f.unique_index;
        let db_type = &f.db_type;
        quote! {
            ::trove::FieldInfo {
                name: #field_name,
                column: #column,
                kind: #kind,
                nullable: #nullable,
                primary_key: #primary_key,
                mandatory: #mandatory,
                length: #length,
                precision: #precision,
                default: #default,
                comment: #comment,
                index: #index,
                unique_index: #unique_index,
                db_type: #db_type,
            }
        }
    });
    let table = &entity.table;
    let schema = &entity.schema;
    let alias = &entity.alias;
    let select = &entity.select;
    let comment = &entity.comment;
    let extends = entity.extends_tokens();

    let mut read = Vec::new();
    let mut write = Vec::new();
    let mut read_key = Vec::new();
    let mut write_key = Vec::new();
    let mut write_relation = Vec::new();
    let mut related = Vec::new();
    let mut related_any = Vec::new();
    for (i, f) in fields.iter().enumerate() {
        let ident = &f.ident;
        let ty = &f.ty;
        match &f.kind {
            FieldType::Relation(..) => {
                read_key.push(quote! {
                    #i => match &self.#ident {
                        Some(v) => Ok(Some(v.foreign_key()?)),
                        None => Ok(None),
                    },
                });
                write_key.push(quote! {
                    #i => {
                        self.#ident = key.map(::trove::Relation::Key);
                        Ok(())
                    }
                });
                write_relation.push(quote! {
                    #i => match value.downcast::<#ty>() {
                        Ok(v) => {
                            self.#ident = *v;
                            Ok(())
                        }
                        Err(..) => Err(::trove::Error::msg(format!(
                            "Field `{}` of `{}` expects a `{}`",
                            stringify!(#ident),
                            stringify!(#name),
                            stringify!(#ty),
                        ))),
                    },
                });
                related.push(quote! {
                    #i => self.#ident.as_ref().and_then(|v| v.loaded()).map(|v| {
                        let v: ::std::rc::Rc<::std::cell::RefCell<dyn ::trove::Entity>> = v.clone();
                        v
                    }),
                });
                related_any.push(quote! {
                    #i => self.#ident.as_ref().and_then(|v| v.loaded()).map(|v| {
                        let v: ::std::rc::Rc<dyn ::std::any::Any> = v.clone();
                        v
                    }),
                });
            }
            _ => {
                read.push(quote! {
                    #i => Ok(::trove::AsValue::as_value(::std::clone::Clone::clone(&self.#ident))),
                });
                write.push(quote! {
                    #i => {
                        self.#ident = <#ty as ::trove::AsValue>::try_from_value(value)?;
                        Ok(())
                    }
                });
            }
        }
    }

    quote! {
        #[allow(non_upper_case_globals)]
        impl #name {
            #(#keys)*
        }

        impl ::trove::Entity for #name {
            fn info() -> &'static ::trove::EntityInfo {
                static FIELDS: &[::trove::FieldInfo] = &[#(#infos),*];
                static INFO: ::trove::EntityInfo = ::trove::EntityInfo {
                    name: concat!(module_path!(), "::", stringify!(#name)),
                    table: #table,
                    schema: #schema,
                    alias: #alias,
                    select: #select,
                    comment: #comment,
                    extends: #extends,
                    fields: FIELDS,
                };
                &INFO
            }

            fn entity_info(&self) -> &'static ::trove::EntityInfo {
                <Self as ::trove::Entity>::info()
            }

            fn read(&self, index: usize) -> ::trove::Result<::trove::Value> {
                match index {
                    #(#read)*
                    _ => Err(::trove::Error::msg(format!(
                        "`{}` has no scalar field {}", stringify!(#name), index
                    ))),
                }
            }

            fn write(&mut self, index: usize, value: ::trove::Value) -> ::trove::Result<()> {
                match index {
                    #(#write)*
                    _ => Err(::trove::Error::msg(format!(
                        "`{}` has no scalar field {}", stringify!(#name), index
                    ))),
                }
            }

            fn read_key(&self, index: usize) -> ::trove::Result<Option<::trove::ForeignKey>> {
                match index {
                    #(#read_key)*
                    _ => Err(::trove::Error::msg(format!(
                        "`{}` has no relation field {}", stringify!(#name), index
                    ))),
                }
            }

            fn write_key(&mut self, index: usize, key: Option<::trove::ForeignKey>) -> ::trove::Result<()> {
                match index {
                    #(#write_key)*
                    _ => Err(::trove::Error::msg(format!(
                        "`{}` has no relation field {}", stringify!(#name), index
                    ))),
                }
            }

            fn write_relation(
                &mut self,
                index: usize,
                value: ::std::boxed::Box<dyn ::std::any::Any>,
            ) -> ::trove::Result<()> {
                match index {
                    #(#write_relation)*
                    _ => Err(::trove::Error::msg(format!(
                        "`{}` has no relation field {}", stringify!(#name), index
                    ))),
                }
            }

            fn related(
                &self,
                index: usize,
            ) -> Option<::std::rc::Rc<::std::cell::RefCell<dyn ::trove::Entity>>> {
                match index {
                    #(#related)*
                    _ => None,
                }
            }

            fn related_any(&self, index: usize) -> Option<::std::rc::Rc<dyn ::std::any::Any>> {
                match index {
                    #(#related_any)*
                    _ => None,
                }
            }

            fn state(&self) -> &::trove::EntityState {
                &self.#state
            }

            fn state_mut(&mut self) -> &mut ::trove::EntityState {
                &mut self.#state
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    }
    .into()
}
