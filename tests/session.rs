#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rust_decimal::Decimal;
    use std::{rc::Rc, sync::Arc};
    use time::macros::date;
    use trove::{
        CachePolicy, DatabaseConfig, DdlPolicy, Entity, MetaParams, OrmError, OrmHandler, Property, Query, Relation,
        Session, SessionState, Value, entity_ref,
    };
    use trove_tests::{
        City, Country, Customer, Employee, MockDriver, Person, fixture_handler, init_logs, silent_logs,
    };

    fn handler(driver: &MockDriver, params: MetaParams) -> Arc<OrmHandler> {
        fixture_handler(driver, params).expect("Could not build the fixture handler")
    }

    fn text(value: &str) -> Value {
        Value::Varchar(Some(value.into()))
    }

    fn int(value: i64) -> Value {
        Value::Int64(Some(value))
    }

    fn employee_row(id: i64, name: &str, manager: Option<i64>) -> Vec<Value> {
        vec![
            int(id),
            text(name),
            Value::Decimal(Some(Decimal::new(1500, 0))),
            Value::Date(Some(date!(1990 - 04 - 12))),
            Value::Int64(manager),
            Value::Null,
        ]
    }

    #[test]
    fn save_and_load() {
        init_logs();
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::new().sequence_cache(10));
        {
            let mut session = Session::new(handler.clone());
            let alice = entity_ref(Employee {
                name: "Alice".into(),
                salary: Some(Decimal::new(1500, 0)),
                born: Some(date!(1990 - 04 - 12)),
                ..Default::default()
            });
            session.save(&alice).unwrap();
            assert_eq!(alice.borrow().id, Some(1));
            assert_eq!(alice.borrow().state.session(), Some(session.id()));
            let bob = entity_ref(Employee {
                name: "Bob".into(),
                manager: Some(Relation::to(&alice)),
                ..Default::default()
            });
            session.save(&bob).unwrap();
            assert_eq!(bob.borrow().id, Some(2));
            assert_eq!(session.cache().len(), 2);
            assert_eq!(session.state(), SessionState::Active);
            session.commit().unwrap();

            let state = driver.state();
            let inserts = state.business();
            assert_eq!(inserts.len(), 2);
            assert_eq!(
                inserts[0].sql,
                "INSERT INTO employee (id, name, salary, born, manager, city) VALUES (?, ?, ?, ?, ?, ?)"
            );
            assert_eq!(
                inserts[0].values,
                [
                    int(1),
                    text("Alice"),
                    Value::Decimal(Some(Decimal::new(1500, 0))),
                    Value::Date(Some(date!(1990 - 04 - 12))),
                    Value::Null,
                    Value::Null,
                ]
            );
            assert_eq!(inserts[1].values[4], int(1), "The relation is stored as the key of Alice");
            assert_eq!(state.sequence_round_trips(), 1);
            assert_eq!(state.commits, 2, "One for the sequence, one for the session");
        }
        driver.clear();

        let mut session = Session::new(handler.clone());
        driver.push_rows(vec![employee_row(2, "Bob", Some(1))]);
        let bob = Query::new(handler.clone(), Some(Employee::name.eq("Bob")))
            .unwrap()
            .unique_result(&mut session)
            .unwrap()
            .expect("Bob is found");
        assert_eq!(bob.borrow().name, "Bob");
        assert!(matches!(&bob.borrow().manager, Some(Relation::Key(key)) if key.values() == [int(1)]));
        assert_eq!(bob.borrow().state.session(), Some(session.id()));
        assert!(!bob.borrow().state.has_changes());

        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        let alice = session
            .load_related(&bob, Employee::manager)
            .unwrap()
            .expect("The manager is found");
        assert_eq!(alice.borrow().name, "Alice");
        assert_eq!(alice.borrow().born, Some(date!(1990 - 04 - 12)));
        assert!(bob.borrow().manager.as_ref().and_then(Relation::loaded).is_some());
        assert_eq!(
            driver.sql()[1],
            indoc! {"
                SELECT employee.id, employee.name, employee.salary, employee.born, employee.manager, employee.city
                \tFROM employee employee
                \tWHERE employee.id=?"}
        );

        let statements = driver.state().statements.len();
        let cached = session.load_by_key::<Employee>(1i64).unwrap().unwrap();
        assert!(Rc::ptr_eq(&cached, &alice));
        let again = session.load_related(&bob, Employee::manager).unwrap().unwrap();
        assert!(Rc::ptr_eq(&again, &alice));
        assert_eq!(driver.state().statements.len(), statements, "Served by the cache");
    }

    #[test]
    fn update_modified_fields() {
        init_logs();
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        driver.push_rows(vec![employee_row(2, "Bob", Some(1))]);
        let bob = session.load_by_key::<Employee>(2i64).unwrap().unwrap();
        driver.clear();

        assert_eq!(session.update(&bob).unwrap(), 0, "Nothing changed");
        assert!(driver.sql().is_empty());

        bob.borrow_mut()
            .set(Employee::salary, Some(Decimal::new(1300, 0)))
            .unwrap();
        assert!(bob.borrow().state.has_changes());
        assert_eq!(session.update(&bob).unwrap(), 1);
        let state = driver.state();
        let update = state.business()[0];
        assert_eq!(
            update.sql,
            "UPDATE employee employee\n\tSET salary=?\n\tWHERE employee.id=?"
        );
        assert_eq!(update.values, [Value::Decimal(Some(Decimal::new(1300, 0))), int(2)]);
        drop(state);
        assert!(!bob.borrow().state.has_changes());

        bob.borrow_mut().name = "Robert".into();
        bob.borrow_mut().touch(Employee::name);
        session.save_or_update(&bob).unwrap();
        assert_eq!(driver.sql().len(), 2);
        assert!(driver.sql()[1].contains("SET name=?"));
    }

    #[test]
    fn update_and_delete_by_criterion() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());

        let mut changes = Employee::default();
        assert_eq!(
            session.update_where(&changes, Employee::salary.is_null()).unwrap(),
            0
        );
        changes.set(Employee::salary, Some(Decimal::new(1000, 0))).unwrap();
        driver.push_affected(3);
        assert_eq!(
            session.update_where(&changes, Employee::salary.is_null()).unwrap(),
            3
        );
        assert_eq!(
            driver.sql(),
            ["UPDATE employee employee\n\tSET salary=?\n\tWHERE employee.salary IS NULL"]
        );
        driver.clear();

        driver.push_affected(2);
        let deleted = session
            .delete_where(Employee::city.then(City::name).eq("Rome"))
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(
            driver.sql(),
            ["DELETE FROM employee employee\n\tWHERE EXISTS (SELECT 1 FROM city city WHERE city.name=? AND (employee.city = city.id))"]
        );
    }

    #[test]
    fn delete_evicts_cached_entities() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        let alice = session.load_by_key::<Employee>(1i64).unwrap().unwrap();
        assert_eq!(session.cache().len(), 1);
        driver.clear();

        driver.push_rows(vec![vec![int(1)]]);
        session.delete_where(Employee::name.eq("Alice")).unwrap();
        assert_eq!(
            driver.sql(),
            [
                "SELECT employee.id\n\tFROM employee employee\n\tWHERE employee.name=?",
                "DELETE FROM employee employee\n\tWHERE employee.name=?",
            ]
        );
        assert_eq!(session.cache().len(), 0);
        assert!(session.load_by_key::<Employee>(1i64).unwrap().is_none());
        drop(alice);

        driver.push_rows(vec![employee_row(3, "Carol", None)]);
        let carol = session.load_by_key::<Employee>(3i64).unwrap().unwrap();
        driver.clear();
        assert_eq!(session.delete(&carol).unwrap(), 1);
        assert_eq!(driver.sql(), ["DELETE FROM employee employee\n\tWHERE employee.id=?"]);
        assert!(carol.borrow().state.session().is_none());
        assert!(session.cache().is_empty());
    }

    #[test]
    fn rollback_only_lifecycle() {
        init_logs();
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        assert_eq!(session.state(), SessionState::Open);
        driver.fail_on("INSERT INTO country");
        let italy = entity_ref(Country {
            code: "ITA".into(),
            name: "Italy".into(),
            ..Default::default()
        });
        silent_logs! {
            let error = session.save(&italy).expect_err("The insert fails");
            assert!(matches!(error.downcast_ref::<OrmError>(), Some(OrmError::SqlExecution { .. })));
            assert!(format!("{:#}", error).contains("INSERT INTO country"));
            assert_eq!(session.state(), SessionState::RollbackOnly);

            let error = session.commit().expect_err("The commit is refused");
            assert!(matches!(error.downcast_ref::<OrmError>(), Some(OrmError::SessionState(..))));
        }
        assert_eq!(session.state(), SessionState::RollbackOnly, "Only rollback clears the state");
        assert_eq!(driver.state().commits, 0);
        assert_eq!(driver.state().rollbacks, 1);

        session.rollback().unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(driver.state().rollbacks, 2);
        session.commit().unwrap();
        assert_eq!(driver.state().commits, 1);

        session.mark_for_rollback();
        silent_logs! {
            assert!(session.commit().is_err());
        }
        session.rollback().unwrap();

        driver.fail_commit(true);
        silent_logs! {
            assert!(session.commit().is_err());
        }
        assert!(session.is_rollback_only());
        driver.fail_commit(false);
        session.rollback().unwrap();

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(driver.state().closed, 1);
        let error = session.save(&italy).expect_err("The session is closed");
        assert!(matches!(error.downcast_ref::<OrmError>(), Some(OrmError::SessionState(..))));
        session.close().unwrap();
        assert_eq!(driver.state().closed, 1, "Closing twice does nothing");
    }

    #[test]
    fn close_releases_every_connection() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        {
            let mut session = Session::new(handler.clone());
            let person = entity_ref(Person {
                name: "Dan".into(),
                ..Default::default()
            });
            session.save(&person).unwrap();
            assert_eq!(driver.state().connections, 2);
        }
        let state = driver.state();
        assert_eq!(state.closed, 2);
        assert_eq!(state.commits, 1, "Only the key reservation was committed");
        assert_eq!(state.rollbacks, 2);
    }

    #[test]
    fn close_survives_failed_rollbacks() {
        init_logs();
        let driver = MockDriver::new();
        let mut handler = OrmHandler::new(MetaParams::default());
        handler.register_driver(Box::new(driver.clone())).unwrap();
        let main = handler
            .load_database(DatabaseConfig::builder("main", "mock").entity(Person::info).build().unwrap())
            .unwrap();
        let audit = handler
            .load_database(DatabaseConfig::builder("audit", "mock").entity(Country::info).build().unwrap())
            .unwrap();
        let mut session = Session::new(handler.into_shared());
        session.execute(main, "DELETE FROM person", &[]).unwrap();
        session.execute(audit, "DELETE FROM country", &[]).unwrap();
        assert_eq!(driver.state().connections, 2);

        driver.fail_rollback(1);
        silent_logs! {
            let error = session.close().expect_err("The first rollback fails");
            let message = format!("{:#}", error);
            assert!(message.contains("`main`"), "{}", message);
            assert!(message.contains("Simulated rollback failure"), "{}", message);
        }
        let state = driver.state();
        assert_eq!(state.closed, 2, "Every connection is released");
        assert_eq!(state.rollbacks, 1);
        drop(state);
        assert!(session.close().is_ok(), "Closing twice does nothing");
    }

    #[test]
    fn inheritance_cascade() {
        init_logs();
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        let person = entity_ref(Person {
            name: "Erin".into(),
            ..Default::default()
        });
        let customer = entity_ref(Customer {
            person: Some(Relation::to(&person)),
            discount: Some(Decimal::new(5, 2)),
            ..Default::default()
        });
        session.save(&customer).unwrap();
        assert_eq!(person.borrow().id, Some(1));
        assert_eq!(
            driver.sql(),
            [
                "INSERT INTO person (id, name) VALUES (?, ?)",
                "INSERT INTO customer (person, discount) VALUES (?, ?)",
            ]
        );
        assert_eq!(driver.state().business()[1].values[0], int(1));
        driver.clear();

        session.delete(&customer).unwrap();
        assert_eq!(
            driver.sql(),
            [
                "DELETE FROM customer customer\n\tWHERE customer.person=?",
                "DELETE FROM person person\n\tWHERE person.id=?",
            ]
        );
        driver.clear();

        driver.push_rows(vec![vec![int(4)], vec![int(5)]]);
        driver.push_affected(2);
        assert_eq!(
            session.delete_where(Customer::discount.gt(Decimal::new(1, 1))).unwrap(),
            2
        );
        assert_eq!(
            driver.sql(),
            [
                "SELECT customer.person\n\tFROM customer customer\n\tWHERE customer.discount>?",
                "DELETE FROM customer customer\n\tWHERE customer.discount>?",
                "DELETE FROM person person\n\tWHERE person.id=?",
                "DELETE FROM person person\n\tWHERE person.id=?",
            ]
        );
        assert_eq!(driver.state().business()[3].values, [int(5)]);
    }

    #[test]
    fn inheritance_disabled() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::new().inheritance_mode(false));
        let mut session = Session::new(handler.clone());
        let customer = entity_ref(Customer {
            person: Some(Relation::key(7i64)),
            ..Default::default()
        });
        session.save(&customer).unwrap();
        session.delete(&customer).unwrap();
        assert_eq!(
            driver.sql(),
            [
                "INSERT INTO customer (person, discount) VALUES (?, ?)",
                "DELETE FROM customer customer\n\tWHERE customer.person=?",
            ]
        );
    }

    #[test]
    fn save_all_batches_rows() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::new().insert_multirow_limit(2));
        let mut session = Session::new(handler.clone());
        let people: Vec<_> = ["Fay", "Gus", "Hal"]
            .into_iter()
            .map(|name| {
                entity_ref(Person {
                    name: name.into(),
                    ..Default::default()
                })
            })
            .collect();
        session.save_all(&people).unwrap();
        let state = driver.state();
        let inserts = state.business();
        assert_eq!(inserts.len(), 2);
        assert_eq!(
            inserts[0].sql,
            "INSERT INTO person (id, name) VALUES\n\t(?, ?),\n\t(?, ?)"
        );
        assert_eq!(inserts[0].values, [int(1), text("Fay"), int(2), text("Gus")]);
        assert_eq!(inserts[1].sql, "INSERT INTO person (id, name) VALUES (?, ?)");
        assert_eq!(inserts[1].values, [int(3), text("Hal")]);
        drop(state);
        assert_eq!(session.cache().len(), 3);
    }

    #[test]
    fn ambiguous_unique_result() {
        init_logs();
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        driver.push_rows(vec![employee_row(1, "Alice", None), employee_row(2, "Alice", None)]);
        let query = Query::new(handler.clone(), Some(Employee::name.eq("Alice"))).unwrap();
        silent_logs! {
            let error = query.unique_result(&mut session).expect_err("Two rows match");
            assert!(matches!(error.downcast_ref::<OrmError>(), Some(OrmError::AmbiguousResult(..))));
        }
        assert!(!session.is_rollback_only(), "Nothing failed in the database");

        assert!(query.unique_result(&mut session).unwrap().is_none());
        driver.push_rows(vec![employee_row(1, "Alice", None), employee_row(2, "Alice", None)]);
        let first = query.first(&mut session).unwrap().unwrap();
        assert_eq!(first.borrow().id, Some(1));
    }

    #[test]
    fn cache_identity() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        let query = Query::<Employee>::new(handler.clone(), None).unwrap();
        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        let first = query.list(&mut session).unwrap();
        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        let second = session.load(&query).unwrap();
        assert!(Rc::ptr_eq(&first[0], &second[0]));

        session.clear_cache();
        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        let third = query.list(&mut session).unwrap();
        assert!(!Rc::ptr_eq(&first[0], &third[0]));

        let handler = fixture_handler(&driver, MetaParams::new().cache_policy(CachePolicy::None)).unwrap();
        let mut session = Session::new(handler.clone());
        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        let query = Query::<Employee>::new(handler.clone(), None).unwrap();
        let first = query.list(&mut session).unwrap();
        let second = query.list(&mut session).unwrap();
        assert!(!Rc::ptr_eq(&first[0], &second[0]));
        assert!(session.cache().is_empty());
    }

    #[test]
    fn protected_cache_releases_entities() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        let alice = session.load_by_key::<Employee>(1i64).unwrap().unwrap();
        assert_eq!(session.cache().len(), 1);
        drop(alice);
        assert_eq!(session.cache().len(), 0);

        let handler = fixture_handler(&driver, MetaParams::new().cache_policy(CachePolicy::Solid)).unwrap();
        let mut session = Session::new(handler.clone());
        driver.push_rows(vec![employee_row(1, "Alice", None)]);
        drop(session.load_by_key::<Employee>(1i64).unwrap());
        assert_eq!(session.cache().len(), 1);
    }

    #[test]
    fn partial_columns() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        let query = Query::<Employee>::new(handler.clone(), None)
            .unwrap()
            .columns([Employee::name.field_ref()]);
        driver.push_rows(vec![vec![int(5), text("Eve")]]);
        let rows = query.list(&mut session).unwrap();
        assert_eq!(driver.sql()[0], "SELECT employee.id, employee.name\n\tFROM employee employee");
        assert_eq!(rows[0].borrow().id, Some(5));
        assert_eq!(rows[0].borrow().name, "Eve");
        assert!(rows[0].borrow().salary.is_none());
        assert!(session.cache().is_empty(), "Partial entities are not cached");

        let query = Query::<Employee>::new(handler.clone(), None)
            .unwrap()
            .columns([Country::name.field_ref()]);
        assert!(query.list(&mut session).is_err());
    }

    #[test]
    fn counting() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        let query = Query::new(handler.clone(), Some(Employee::salary.is_not_null()))
            .unwrap()
            .offset(7)
            .limit(5);
        driver.push_rows(vec![vec![int(10)]]);
        assert_eq!(query.limited_count(&mut session).unwrap(), 3);
        assert_eq!(
            driver.sql(),
            ["SELECT COUNT(*)\n\tFROM employee employee\n\tWHERE employee.salary IS NOT NULL"]
        );

        driver.push_rows(vec![vec![int(4)]]);
        assert_eq!(query.limited_count(&mut session).unwrap(), 0);

        driver.push_rows(vec![vec![int(12)]]);
        assert_eq!(session.row_count::<Employee>(None).unwrap(), 12);

        driver.push_rows(vec![vec![int(1)]]);
        assert!(query.exists(&mut session).unwrap());
        assert!(!query.exists(&mut session).unwrap());
        assert!(
            driver.sql()[3].starts_with("SELECT employee.id\n\tFROM employee employee\n\tWHERE employee.salary IS NOT NULL")
        );
    }

    #[test]
    fn limited_count_arithmetic() {
        assert_eq!(trove::limited_count(10, 7, Some(5)), 3);
        assert_eq!(trove::limited_count(10, 2, Some(5)), 5);
        assert_eq!(trove::limited_count(10, 2, None), 8);
        assert_eq!(trove::limited_count(10, 10, None), 0);
        assert_eq!(trove::limited_count(10, 12, Some(1)), 0);
        assert_eq!(trove::limited_count(10, 5, Some(3)), 3);
        assert_eq!(trove::limited_count(4, 5, Some(3)), 0);
    }

    #[test]
    fn relations_and_reload() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        let rome = entity_ref(City {
            id: Some(8),
            name: "Rome".into(),
            country: Some(Relation::key("ITA".to_string())),
            ..Default::default()
        });
        driver.push_rows(vec![employee_row(1, "Alice", None), employee_row(2, "Bob", Some(1))]);
        let people = session.children(&rome, Employee::city).unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(driver.state().business()[0].values, [int(8)]);
        assert!(driver.sql()[0].ends_with("WHERE employee.city=?"));

        let key = session
            .read_fk(&*people[1].borrow(), Employee::manager)
            .unwrap()
            .unwrap();
        assert_eq!(key.values(), [int(1)]);
        assert!(session.load_related(&people[0], Employee::manager).unwrap().is_none());

        driver.push_rows(vec![employee_row(2, "Bobby", Some(1))]);
        assert!(session.reload(&people[1]).unwrap());
        assert_eq!(people[1].borrow().name, "Bobby");
        assert!(!session.reload(&people[1]).unwrap(), "The row is gone");
    }

    #[test]
    fn create_ddl() {
        init_logs();
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        session.create_ddl().unwrap();
        let sql = driver.sql();
        assert_eq!(
            sql[0],
            "SELECT column_name FROM information_schema.columns WHERE UPPER(table_name)=UPPER(?)"
        );
        let creates: Vec<&str> = sql
            .iter()
            .filter_map(|v| v.strip_prefix("CREATE TABLE "))
            .map(|v| v.split('\n').next().unwrap_or_default())
            .collect();
        assert_eq!(
            creates,
            [
                "employee",
                "city",
                "country",
                "order_line",
                "shipment",
                "person",
                "customer",
            ]
        );
        let foreign_keys = sql.iter().filter(|v| v.contains("ADD FOREIGN KEY")).count();
        assert_eq!(foreign_keys, 5);
        assert!(sql.contains(&"CREATE INDEX idx_city_name ON city (name)".to_string()));
        assert!(sql.contains(&"CREATE UNIQUE INDEX idx_line_label ON order_line (label)".to_string()));
        assert_eq!(sql[sql.len() - 2], "COMMENT ON TABLE country IS 'Countries'");
        assert_eq!(sql[sql.len() - 1], "COMMENT ON COLUMN country.name IS 'English name'");
        assert_eq!(sql.len(), 17);
        let state = driver.state();
        assert_eq!(state.statements.len(), 18);
        assert!(
            state
                .statements
                .iter()
                .any(|v| v.sql.starts_with("CREATE TABLE trove_pk_support\n\t( id VARCHAR(96) NOT NULL PRIMARY KEY"))
        );
        assert_eq!(state.commits, 1);
        drop(state);
        driver.clear();

        driver.push_rows(vec![vec![text("id")]]);
        session.create_ddl().unwrap();
        assert_eq!(driver.sql().len(), 1, "An initialized database is left alone");
    }

    #[test]
    fn update_ddl() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::new().orm2ddl_policy(DdlPolicy::CreateOrUpdateDdl));
        let mut session = Session::new(handler.clone());
        driver.push_rows(vec![vec![text("id")]]);
        driver.push_rows(vec![
            vec![text("ID")],
            vec![text("NAME")],
            vec![text("salary")],
            vec![text("born")],
        ]);
        session.create_ddl().unwrap();
        let sql = driver.sql();
        assert!(sql.contains(&"ALTER TABLE employee ADD COLUMN manager BIGINT".to_string()));
        assert!(sql.contains(&"ALTER TABLE employee ADD COLUMN city BIGINT".to_string()));
        assert!(!sql.iter().any(|v| v.starts_with("CREATE TABLE employee")));
        assert!(!driver.state().statements.iter().any(|v| v.sql.starts_with("CREATE TABLE trove_pk_support")));
        assert!(sql.iter().any(|v| v.starts_with("CREATE TABLE city")));
        assert!(!sql.iter().any(|v| v.starts_with("ALTER TABLE employee\n\tADD FOREIGN KEY")));

        let handler = handler_with_policy(&driver, DdlPolicy::DoNothing);
        driver.clear();
        Session::new(handler).create_ddl().unwrap();
        assert!(driver.sql().is_empty());
    }

    fn handler_with_policy(driver: &MockDriver, policy: DdlPolicy) -> Arc<OrmHandler> {
        handler(driver, MetaParams::new().orm2ddl_policy(policy))
    }

    #[test]
    fn existing_columns() {
        let driver = MockDriver::new();
        let handler = handler(&driver, MetaParams::default());
        let mut session = Session::new(handler.clone());
        let database = handler.database_by_name("main").unwrap();
        driver.push_rows(vec![vec![text("code")], vec![text("name")]]);
        assert_eq!(
            session.existing_columns(database, "", "country").unwrap(),
            ["code", "name"]
        );
        assert_eq!(driver.state().business()[0].values, [text("country")]);
    }
}
