#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use trove::{
        DatabaseConfig, DbType, Entity, EntityState, MetaParams, MetaSelect, OrmError, OrmHandler,
        Relation, SequenceScope, Session,
    };
    use trove_tests::{
        City, Customer, Employee, Headcount, MockDriver, OrderLine, Person, Shipment, fixture_handler,
        init_logs, silent_logs,
    };

    #[derive(Entity, Default, Debug)]
    #[trove(table = "note")]
    struct Note {
        #[trove(primary_key, column = "note_id")]
        id: i32,
        #[trove(db_type = "CLOB", comment = "Free text")]
        body: Option<String>,
        #[trove(default = "0")]
        priority: i16,
        flagged: Option<bool>,
        grade: Option<i8>,
        state: EntityState,
    }

    #[derive(Entity, Default, Debug)]
    #[trove(table = "keyless")]
    struct Keyless {
        value: i32,
        state: EntityState,
    }

    #[derive(Entity, Default, Debug)]
    #[trove(table = "first", alias = "dup")]
    struct First {
        #[trove(primary_key)]
        id: i64,
        state: EntityState,
    }

    #[derive(Entity, Default, Debug)]
    #[trove(table = "second", alias = "dup")]
    struct Second {
        #[trove(primary_key)]
        id: i64,
        first: Option<Relation<First>>,
        state: EntityState,
    }

    fn fixtures() -> Arc<OrmHandler> {
        fixture_handler(&MockDriver::new(), MetaParams::default()).expect("Could not build the fixture handler")
    }

    #[test]
    fn column_inference() {
        init_logs();
        let handler = fixtures();
        let table = handler.table_of::<Employee>().unwrap();
        assert_eq!(table.name, "employee");
        assert_eq!(table.alias, "employee");
        assert!(table.schema.is_empty());
        let columns: Vec<_> = handler.columns_of(table.id).collect();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "salary", "born", "manager", "city"]);

        assert_eq!(columns[0].db_type, DbType::BigInt);
        assert!(columns[0].primary_key && columns[0].mandatory);
        assert_eq!((columns[1].db_type, columns[1].max_length), (DbType::Varchar, 64));
        assert!(columns[1].mandatory);
        assert_eq!(
            (columns[2].db_type, columns[2].max_length, columns[2].precision),
            (DbType::Decimal, 10, 2)
        );
        assert!(!columns[2].mandatory);
        assert_eq!(columns[3].db_type, DbType::Date);

        let manager = columns[4];
        assert_eq!(manager.foreign_table, Some(table.id));
        assert_eq!(manager.db_type, DbType::BigInt);
        assert_eq!(manager.physical.len(), 1);
        assert_eq!(manager.physical[0].name, "manager");
        assert_eq!(manager.physical[0].target.as_deref(), Some("id"));

        let city = handler.table_of::<City>().unwrap();
        assert_eq!(columns[5].foreign_table, Some(city.id));
        assert_eq!(city.indexes.len(), 1);
        assert_eq!(city.indexes[0].name, "idx_city_name");
        assert!(!city.indexes[0].unique);
    }

    #[test]
    fn attributes() {
        let mut handler = OrmHandler::new(MetaParams::default());
        handler
            .load_database(DatabaseConfig::builder("main", "generic").entity(Note::info).build().unwrap())
            .unwrap();
        let handler = handler.into_shared();
        let table = handler.table_of::<Note>().unwrap();
        let columns: Vec<_> = handler.columns_of(table.id).collect();
        assert_eq!(columns[0].name, "note_id");
        assert_eq!(columns[0].db_type, DbType::Int);
        assert_eq!(columns[1].db_type, DbType::Clob);
        assert_eq!(columns[1].comment, "Free text");
        assert_eq!(columns[2].db_type, DbType::SmallInt);
        assert_eq!(columns[2].default_value.as_deref(), Some("0"));
        assert!(columns[2].mandatory);
        assert_eq!(columns[3].db_type, DbType::Boolean);
        assert!(!columns[3].mandatory);
        assert_eq!((columns[4].db_type, columns[4].max_length), (DbType::Char, -1));
        assert_eq!(handler.sequencer(table.id).unwrap().id(), "~.note");
    }

    #[test]
    fn composite_keys() {
        let handler = fixtures();
        let line = handler.table_of::<OrderLine>().unwrap();
        assert_eq!(line.alias, "line");
        assert_eq!(line.pkey.len(), 2);
        assert_eq!(line.indexes.len(), 1);
        assert!(line.indexes[0].unique);
        assert!(handler.sequencer(line.id).is_err(), "Composite keys are assigned by the application");

        let shipment = handler.table_of::<Shipment>().unwrap();
        let relation = handler.columns_of(shipment.id).nth(1).unwrap();
        assert_eq!(relation.foreign_table, Some(line.id));
        let physical: Vec<(&str, DbType, Option<&str>)> = relation
            .physical
            .iter()
            .map(|p| (p.name.as_str(), p.db_type, p.target.as_deref()))
            .collect();
        assert_eq!(
            physical,
            [
                ("fk_line_order_id", DbType::BigInt, Some("order_id")),
                ("fk_line_line", DbType::Int, Some("line")),
            ]
        );
    }

    #[test]
    fn inheritance() {
        let handler = fixtures();
        let customer = handler.table_of::<Customer>().unwrap();
        let person = handler.table_of::<Person>().unwrap();
        let parent = customer.parent.map(|c| handler.column(c)).unwrap();
        assert_eq!(parent.name, "person");
        assert_eq!(parent.foreign_table, Some(person.id));
        assert_eq!(parent.physical[0].target.as_deref(), Some("id"));
        assert!(person.parent.is_none());
        assert!(handler.sequencer(customer.id).is_err());
        assert_eq!(handler.sequencer(person.id).unwrap().id(), "~.person");
    }

    #[test]
    fn inherited_keys_belong_to_the_ancestor() {
        init_logs();
        let orders: [[fn() -> &'static trove::EntityInfo; 2]; 2] =
            [[Customer::info, Person::info], [Person::info, Customer::info]];
        for order in orders {
            let mut handler = OrmHandler::new(MetaParams::default());
            handler
                .load_database(
                    DatabaseConfig::builder("main", "generic")
                        .entity(order[0])
                        .entity(order[1])
                        .build()
                        .unwrap(),
                )
                .unwrap();
            let person = handler.table_of::<Person>().unwrap().id;
            let customer = handler.table_of::<Customer>().unwrap().id;
            let name = Person::name.field_ref();
            assert_eq!(handler.registered_table(&name).unwrap().id, person);
            assert_eq!(handler.find_column(&name).unwrap().table, person);
            assert_eq!(handler.registered_table(&Person::id.field_ref()).unwrap().id, person);
            assert_eq!(
                handler.registered_table(&Customer::discount.field_ref()).unwrap().id,
                customer
            );
        }
    }

    #[test]
    fn views() {
        let handler = fixtures();
        let view = handler.table_of::<Headcount>().unwrap();
        assert!(view.is_view());
        assert!(view.pkey.is_empty());
        let select = view.select.as_ref().unwrap();
        assert_eq!(select.select, "city, COUNT(*)");
        assert_eq!(select.from, "employee");
        assert_eq!(select.where_, "manager IS NOT NULL");
        assert_eq!(select.group, "city");
        assert_eq!(select.order, "city");
        assert!(select.limit.is_empty());
        assert!(handler.sequencer(view.id).is_err());
    }

    #[test]
    fn select_templates() {
        let select = MetaSelect::parse(
            "SELECT a, (SELECT MAX(x) FROM t WHERE y = 'FROM') AS m FROM tab WHERE a > 1 GROUP BY a ORDER BY a LIMIT 10 OFFSET 5",
        )
        .unwrap();
        assert_eq!(
            select,
            MetaSelect {
                select: "a, (SELECT MAX(x) FROM t WHERE y = 'FROM') AS m".into(),
                from: "tab".into(),
                where_: "a > 1".into(),
                group: "a".into(),
                order: "a".into(),
                limit: "10".into(),
                offset: "5".into(),
            }
        );

        let select = MetaSelect::parse("select name, selection from fromage where name <> 'x'").unwrap();
        assert_eq!(select.select, "name, selection");
        assert_eq!(select.from, "fromage");
        assert_eq!(select.where_, "name <> 'x'");

        assert!(MetaSelect::parse("SELECT 1").is_err());
        assert!(MetaSelect::parse("UPDATE t SET a = 1 FROM u").is_err());
    }

    #[test]
    fn alias_parameters() {
        let mut handler = OrmHandler::new(MetaParams::new().table_alias("t_", "_"));
        handler
            .load_database(
                DatabaseConfig::builder("main", "generic")
                    .entity(Employee::info)
                    .entity(OrderLine::info)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let handler = handler.into_shared();
        assert_eq!(handler.table_of::<Employee>().unwrap().alias, "t_employee_");
        assert_eq!(handler.table_of::<City>().unwrap().alias, "t_city_");
        assert_eq!(handler.table_of::<OrderLine>().unwrap().alias, "line");
    }

    #[test]
    fn related_entities_are_mapped() {
        let mut handler = OrmHandler::new(MetaParams::default());
        let database = handler
            .load_database(DatabaseConfig::builder("main", "h2").entity(Employee::info).build().unwrap())
            .unwrap();
        let tables: Vec<&str> = handler
            .database(database)
            .tables
            .iter()
            .map(|t| handler.table(*t).name.as_str())
            .collect();
        assert_eq!(tables, ["employee", "city", "country"]);
    }

    #[test]
    fn schemas_and_sequence_scope() {
        let mut handler = OrmHandler::new(MetaParams::default());
        let database = handler
            .load_database(
                DatabaseConfig::builder("main", "postgres")
                    .schema("hr")
                    .sequence_scope(SequenceScope::Database)
                    .entity(Person::info)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let handler = handler.into_shared();
        let person = handler.table_of::<Person>().unwrap();
        assert_eq!(person.schema, "hr");
        assert_eq!(person.full_name(), "hr.person");
        assert_eq!(handler.database(database).sequence_table(), "hr.trove_pk_support");
        assert_eq!(handler.sequencer(person.id).unwrap().id(), "<ALL>");
    }

    #[test]
    fn mapping_errors() {
        init_logs();
        let mut handler = OrmHandler::new(MetaParams::default());
        let error = handler
            .load_database(DatabaseConfig::builder("main", "generic").entity(Keyless::info).build().unwrap())
            .expect_err("An entity needs a primary key");
        assert!(matches!(error.downcast_ref::<OrmError>(), Some(OrmError::Mapping(..))));
        assert!(handler.databases().is_empty());

        let error = handler
            .load_database(
                DatabaseConfig::builder("main", "generic")
                    .entity(Second::info)
                    .build()
                    .unwrap(),
            )
            .expect_err("The alias is used twice");
        assert!(format!("{:#}", error).contains("dup"));
        assert!(handler.databases().is_empty());
        assert!(handler.tables().is_empty());

        assert!(
            handler
                .load_database(DatabaseConfig::builder("main", "nosuchdb").entity(Note::info).build().unwrap())
                .is_err()
        );
        assert!(DatabaseConfig::builder("main", "generic").url("not a url").build().is_err());

        handler
            .load_database(DatabaseConfig::builder("main", "generic").entity(Note::info).build().unwrap())
            .expect("A failed load leaves the handler usable");
    }

    #[test]
    fn frozen_model() {
        init_logs();
        let mut handler = OrmHandler::new(MetaParams::default());
        handler
            .load_database(DatabaseConfig::builder("main", "generic").entity(Note::info).build().unwrap())
            .unwrap();
        assert!(!handler.is_locked());
        handler.lock();
        assert!(handler.is_locked());
        silent_logs! {
            let error = handler
                .load_database(DatabaseConfig::builder("other", "generic").entity(First::info).build().unwrap())
                .expect_err("The model is locked");
            assert!(matches!(error.downcast_ref::<OrmError>(), Some(OrmError::ModelFrozen(..))));
            let error = handler
                .register_driver(Box::new(MockDriver::new()))
                .expect_err("The model is locked");
            assert!(matches!(error.downcast_ref::<OrmError>(), Some(OrmError::ModelFrozen(..))));
            assert!(handler.set_params(MetaParams::default()).is_err());
        }

        let mut handler = OrmHandler::new(MetaParams::default());
        handler
            .load_database(DatabaseConfig::builder("main", "generic").entity(Note::info).build().unwrap())
            .unwrap();
        let handler = Arc::new(handler);
        assert!(!handler.is_locked());
        let _session = Session::new(handler.clone());
        assert!(handler.is_locked(), "Opening a session locks the model");
    }
}
