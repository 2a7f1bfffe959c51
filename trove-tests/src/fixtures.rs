use crate::MockDriver;
use rust_decimal::Decimal;
use std::sync::Arc;
use time::Date;
use trove::{DatabaseConfig, Entity, EntityState, MetaParams, OrmHandler, Relation, Result};

#[derive(Entity, Default, Debug)]
#[trove(table = "country", comment = "Countries")]
pub struct Country {
    #[trove(primary_key, length = 3)]
    pub code: String,
    #[trove(length = 64, mandatory, comment = "English name")]
    pub name: String,
    pub state: EntityState,
}

#[derive(Entity, Default, Debug)]
#[trove(table = "city")]
pub struct City {
    #[trove(primary_key)]
    pub id: Option<i64>,
    #[trove(length = 64, mandatory, index = "idx_city_name")]
    pub name: String,
    pub country: Option<Relation<Country>>,
    pub state: EntityState,
}

#[derive(Entity, Default, Debug)]
#[trove(table = "employee")]
pub struct Employee {
    #[trove(primary_key)]
    pub id: Option<i64>,
    #[trove(length = 64, mandatory)]
    pub name: String,
    #[trove(precision = 2, length = 10)]
    pub salary: Option<Decimal>,
    pub born: Option<Date>,
    pub manager: Option<Relation<Employee>>,
    pub city: Option<Relation<City>>,
    pub state: EntityState,
}

/// Composite primary key.
#[derive(Entity, Default, Debug)]
#[trove(table = "order_line", alias = "line")]
pub struct OrderLine {
    #[trove(primary_key)]
    pub order_id: i64,
    #[trove(primary_key)]
    pub line: i32,
    #[trove(length = 32, unique_index = "idx_line_label")]
    pub label: String,
    pub state: EntityState,
}

/// Relation to a composite primary key.
#[derive(Entity, Default, Debug)]
#[trove(table = "shipment")]
pub struct Shipment {
    #[trove(primary_key)]
    pub id: Option<i64>,
    pub line: Option<Relation<OrderLine>>,
    pub state: EntityState,
}

#[derive(Entity, Default, Debug)]
#[trove(table = "person")]
pub struct Person {
    #[trove(primary_key)]
    pub id: Option<i64>,
    #[trove(length = 64, mandatory)]
    pub name: String,
    pub state: EntityState,
}

/// Stored in its own table, its key is the key of the parent `Person` row.
#[derive(Entity, Default, Debug)]
#[trove(table = "customer", extends = Person)]
pub struct Customer {
    #[trove(primary_key)]
    pub person: Option<Relation<Person>>,
    #[trove(precision = 2, length = 5)]
    pub discount: Option<Decimal>,
    pub state: EntityState,
}

#[derive(Entity, Default, Debug)]
#[trove(
    alias = "headcount",
    select = "SELECT city, COUNT(*) FROM employee WHERE manager IS NOT NULL GROUP BY city ORDER BY city"
)]
pub struct Headcount {
    pub city: Option<i64>,
    pub total: Option<i64>,
    pub state: EntityState,
}

/// Handler over all the fixture entities, served by `driver`.
pub fn fixture_handler(driver: &MockDriver, params: MetaParams) -> Result<Arc<OrmHandler>> {
    let mut handler = OrmHandler::new(params);
    handler.register_driver(Box::new(driver.clone()))?;
    handler.load_database(
        DatabaseConfig::builder("main", "mock")
            .entity(Employee::info)
            .entity(City::info)
            .entity(Country::info)
            .entity(OrderLine::info)
            .entity(Shipment::info)
            .entity(Person::info)
            .entity(Customer::info)
            .entity(Headcount::info)
            .build()?,
    )?;
    Ok(handler.into_shared())
}
