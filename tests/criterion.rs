#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use trove::{
        Criterion, DatabaseConfig, Entity, ForeignKey, MetaParams, Operator, OrmError, OrmHandler,
        Property, Query, Value,
    };
    use trove_tests::{
        City, Country, Employee, Headcount, MockDriver, OrderLine, Shipment, fixture_handler, init_logs,
    };

    fn handler(params: MetaParams) -> Arc<OrmHandler> {
        fixture_handler(&MockDriver::new(), params).expect("Could not build the fixture handler")
    }

    fn decode<E: Entity>(handler: &Arc<OrmHandler>, criterion: Criterion<E>) -> (String, Vec<Value>) {
        let query = Query::new(handler.clone(), Some(criterion)).expect("Could not create the query");
        let decoder = query.decoder().expect("Could not decode the criterion");
        (decoder.where_text().to_string(), decoder.values())
    }

    fn text(value: &str) -> Value {
        Value::Varchar(Some(value.into()))
    }

    #[test]
    fn comparisons() {
        init_logs();
        let handler = handler(MetaParams::default());
        let (sql, values) = decode(
            &handler,
            Employee::name
                .eq("Bob")
                .or(Employee::name.eq("Alice"))
                .and(Employee::salary.gt(Decimal::new(1000, 0))),
        );
        assert_eq!(sql, "(employee.name=? OR employee.name=?) AND employee.salary>?");
        assert_eq!(
            values,
            [text("Bob"), text("Alice"), Value::Decimal(Some(Decimal::new(1000, 0)))]
        );

        let (sql, values) = decode(
            &handler,
            Employee::id
                .ne(3i64)
                .and(Employee::id.ge(1i64))
                .and(Employee::id.lt(10i64))
                .and(Employee::id.le(9i64)),
        );
        assert_eq!(
            sql,
            "employee.id<>? AND employee.id>=? AND employee.id<? AND employee.id<=?"
        );
        assert_eq!(values.len(), 4);
        assert_eq!(values[0], Value::Int64(Some(3)));
    }

    #[test]
    fn like_wildcards_and_case() {
        let handler = handler(MetaParams::default());
        let cases = [
            (Employee::name.starts_with("Al"), "employee.name LIKE ?", "Al%"),
            (Employee::name.ends_with("ce"), "employee.name LIKE ?", "%ce"),
            (Employee::name.contains("li"), "employee.name LIKE ?", "%li%"),
            (
                Employee::name.starts_with_ignore_case("al"),
                "UPPER(employee.name) LIKE ?",
                "AL%",
            ),
            (
                Employee::name.ends_with_ignore_case("ce"),
                "UPPER(employee.name) LIKE ?",
                "%CE",
            ),
            (
                Employee::name.contains_ignore_case("li"),
                "UPPER(employee.name) LIKE ?",
                "%LI%",
            ),
            (Employee::name.eq_ignore_case("bob"), "UPPER(employee.name)=?", "BOB"),
        ];
        for (criterion, expected, value) in cases {
            let (sql, values) = decode(&handler, criterion);
            assert_eq!(sql, expected);
            assert_eq!(values, [text(value)]);
        }
    }

    #[test]
    fn null_comparisons() {
        let handler = handler(MetaParams::default());
        let (sql, values) = decode(&handler, Employee::salary.is_null());
        assert_eq!(sql, "employee.salary IS NULL");
        assert!(values.is_empty());

        let (sql, _) = decode(&handler, Employee::salary.is_not_null());
        assert_eq!(sql, "employee.salary IS NOT NULL");

        let (sql, _) = decode(&handler, Employee::salary.eq(Option::<Decimal>::None));
        assert_eq!(sql, "employee.salary IS NULL");

        let query = Query::new(handler.clone(), Some(Employee::salary.gt(Option::<Decimal>::None))).unwrap();
        let error = query.decoder().expect_err("Null is not ordered");
        assert!(matches!(
            error.downcast_ref::<OrmError>(),
            Some(OrmError::UnsupportedNullComparison {
                operator: Operator::Gt,
                ..
            })
        ));
    }

    #[test]
    fn in_lists() {
        let handler = handler(MetaParams::new().max_item_count_in(2));
        let (sql, values) = decode(&handler, Employee::id.in_list([1i64, 2, 3]));
        assert_eq!(sql, "(employee.id IN (?, ?) OR employee.id IN (?))");
        assert_eq!(
            values,
            [Value::Int64(Some(1)), Value::Int64(Some(2)), Value::Int64(Some(3))]
        );

        let (sql, _) = decode(&handler, Employee::id.not_in([1i64, 2, 3]));
        assert_eq!(sql, "NOT employee.id IN (?, ?) AND NOT employee.id IN (?)");

        let (sql, _) = decode(&handler, Employee::id.in_list([4i64]));
        assert_eq!(sql, "employee.id IN (?)");

        let (sql, values) = decode(&handler, Employee::id.in_list(Vec::<i64>::new()));
        assert_eq!(sql, "1=0");
        assert!(values.is_empty());

        let (sql, _) = decode(&handler, Employee::id.not_in(Vec::<i64>::new()));
        assert_eq!(sql, "1=1");
    }

    #[test]
    fn composite_foreign_keys() {
        let handler = handler(MetaParams::default());
        let key = ForeignKey::new(vec![Value::Int64(Some(7)), Value::Int32(Some(2))]);
        let (sql, values) = decode(&handler, Shipment::line.eq_key(key.clone()));
        assert_eq!(sql, "shipment.fk_line_order_id=? AND shipment.fk_line_line=?");
        assert_eq!(values, key.values());

        let (sql, _) = decode(&handler, Shipment::line.ne_key(key));
        assert_eq!(sql, "(shipment.fk_line_order_id<>? OR shipment.fk_line_line<>?)");

        let (sql, _) = decode(&handler, Shipment::line.is_null());
        assert_eq!(
            sql,
            "shipment.fk_line_order_id IS NULL AND shipment.fk_line_line IS NULL"
        );

        let (sql, _) = decode(&handler, Shipment::line.is_not_null());
        assert_eq!(
            sql,
            "(shipment.fk_line_order_id IS NOT NULL OR shipment.fk_line_line IS NOT NULL)"
        );

        let line = OrderLine {
            order_id: 9,
            line: 1,
            label: "first".into(),
            ..Default::default()
        };
        let (sql, values) = decode(&handler, Shipment::line.eq_entity(&line).unwrap());
        assert_eq!(sql, "shipment.fk_line_order_id=? AND shipment.fk_line_line=?");
        assert_eq!(values, [Value::Int64(Some(9)), Value::Int32(Some(1))]);

        let query = Query::new(handler.clone(), Some(Shipment::line.eq(7i64))).unwrap();
        assert!(query.decoder().is_err(), "A two columns relation cannot take a single value");
    }

    #[test]
    fn relation_paths() {
        let handler = handler(MetaParams::default());
        let (sql, values) = decode(
            &handler,
            Employee::city
                .then(City::name)
                .eq("Rome")
                .and(Employee::city.then(City::country).then(Country::code).eq("ITA")),
        );
        assert_eq!(
            sql,
            "city.name=? AND country.code=? AND (employee.city = city.id AND city.country = country.code)"
        );
        assert_eq!(values, [text("Rome"), text("ITA")]);
    }

    #[test]
    fn self_join_aliases() {
        let handler = handler(MetaParams::default());
        let query = Query::new(
            handler.clone(),
            Some(Employee::manager.then(Employee::manager).then(Employee::name).eq("Carol")),
        )
        .unwrap();
        let (sql, values) = query.sql().unwrap();
        assert_eq!(
            sql,
            indoc! {"
                SELECT employee.id, employee.name, employee.salary, employee.born, employee.manager, employee.city
                \tFROM employee employee, employee employee_1, employee employee_2
                \tWHERE employee_2.name=? AND (employee.manager = employee_1.id AND employee_1.manager = employee_2.id)"}
        );
        assert_eq!(values, [text("Carol")]);
    }

    #[test]
    fn manager_name_join() {
        let handler = handler(MetaParams::default());
        let (sql, values) = decode(
            &handler,
            Employee::name
                .eq("Alice")
                .and(Employee::manager.then(Employee::name).eq("Bob")),
        );
        assert_eq!(
            sql,
            "employee.name=? AND employee_1.name=? AND (employee.manager = employee_1.id)"
        );
        assert_eq!(values, [text("Alice"), text("Bob")]);
    }

    #[test]
    fn column_comparisons() {
        let handler = handler(MetaParams::default());
        let (sql, values) = decode(
            &handler,
            Employee::name.eq_property(Employee::manager.then(Employee::name)),
        );
        assert_eq!(
            sql,
            "employee.name=employee_1.name AND (employee.manager = employee_1.id)"
        );
        assert!(values.is_empty());

        let (sql, _) = decode(
            &handler,
            Employee::name.compare_property(Operator::EqIgnoreCase, Employee::manager.then(Employee::name)),
        );
        assert_eq!(
            sql,
            "UPPER(employee.name)=UPPER(employee_1.name) AND (employee.manager = employee_1.id)"
        );

        let query = Query::new(
            handler.clone(),
            Some(Employee::name.compare_property(Operator::Contains, Employee::manager.then(Employee::name))),
        )
        .unwrap();
        assert!(query.decoder().is_err(), "LIKE cannot compare two columns");
    }

    #[test]
    fn constant_and_raw_conditions() {
        let handler = handler(MetaParams::default());
        let (sql, _) = decode(&handler, Criterion::<Employee>::constant(false));
        assert_eq!(sql, "1=0");
        let (sql, _) = decode(
            &handler,
            Criterion::<Employee>::constant(true).and(Criterion::sql("employee.salary > 0")),
        );
        assert_eq!(sql, "1=1 AND (employee.salary > 0)");
    }

    #[test]
    fn regular_expressions() {
        let handler = handler(MetaParams::default());
        let query = Query::new(handler.clone(), Some(Employee::name.regexp("^A"))).unwrap();
        let error = query.decoder().expect_err("The generic dialect has no regexp");
        assert!(matches!(
            error.downcast_ref::<OrmError>(),
            Some(OrmError::UnsupportedOperator(..))
        ));

        let mut postgres = OrmHandler::new(MetaParams::default());
        postgres
            .load_database(
                DatabaseConfig::builder("main", "postgres")
                    .entity(Employee::info)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let postgres = postgres.into_shared();
        let (sql, values) = decode(
            &postgres,
            Employee::name.regexp("^A").and(Employee::name.not_regexp("z$")),
        );
        assert_eq!(sql, "employee.name ~ ? AND employee.name !~ ?");
        assert_eq!(values, [text("^A"), text("z$")]);
    }

    #[test]
    fn ordering() {
        let handler = handler(MetaParams::default());
        let query = Query::<Employee>::new(handler.clone(), None)
            .unwrap()
            .order_by([Employee::name.asc(), Employee::city.then(City::name).desc()]);
        let (sql, values) = query.sql().unwrap();
        assert_eq!(
            sql,
            indoc! {"
                SELECT employee.id, employee.name, employee.salary, employee.born, employee.manager, employee.city
                \tFROM employee employee, city city
                \tWHERE employee.city = city.id
                \tORDER BY employee.name, city.name DESC"}
        );
        assert!(values.is_empty());
    }

    #[test]
    fn view_criterion() {
        let handler = handler(MetaParams::default());
        let query = Query::new(handler.clone(), Some(Headcount::city.eq(3i64))).unwrap();
        let (sql, values) = query.sql().unwrap();
        assert_eq!(
            sql,
            indoc! {"
                SELECT city, COUNT(*)
                \tFROM employee
                \tWHERE (manager IS NOT NULL) AND city=?
                \tGROUP BY city
                \tORDER BY city"}
        );
        assert_eq!(values, [Value::Int64(Some(3))]);
    }
}
