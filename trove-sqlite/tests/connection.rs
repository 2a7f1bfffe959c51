#[cfg(test)]
mod tests {
    use std::{env, fs, path::PathBuf, sync::Mutex};
    use trove::{Connection, Value};
    use trove_sqlite::{SqliteConnection, SqliteDriver};
    use trove_tests::{init_logs, silent_logs};

    static MUTEX: Mutex<()> = Mutex::new(());

    fn db_path(name: &str) -> PathBuf {
        let path = env::temp_dir().join(name);
        if path.exists() {
            fs::remove_file(&path)
                .expect(format!("Failed to remove the test database {}", path.display()).as_str());
        }
        path
    }

    #[test]
    fn create_database() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let path = db_path("trove_creation.sqlite");
        let connection = SqliteConnection::open(&format!("{}?mode=rwc", path.display()))
            .expect("Could not open the database");
        assert!(path.exists(), "Database file should be created after connection");
        Box::new(connection).close().expect("Could not close the database");
        fs::remove_file(&path).expect("Failed to remove the test database");
        silent_logs! {
            assert!(
                SqliteConnection::open(&format!("{}?mode=ro", path.display())).is_err(),
                "Should not be able to open in read only unexisting database"
            );
        }
    }

    #[test]
    fn wrong_url() {
        silent_logs! {
            assert!(SqliteDriver::location("duckdb://some_value").is_err());
            assert!(SqliteDriver::location("sqlite://").is_err());
        }
        assert_eq!(
            SqliteDriver::location("sqlite:///tmp/db.sqlite?mode=rwc").unwrap(),
            "file:/tmp/db.sqlite?mode=rwc"
        );
    }

    #[test]
    fn lazy_transaction() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let path = db_path("trove_transaction.sqlite");
        let location = format!("{}?mode=rwc", path.display());
        let mut connection = SqliteConnection::open(&location).unwrap();
        assert!(!connection.in_transaction());
        connection
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .unwrap();
        assert!(connection.in_transaction());
        connection.commit().unwrap();
        assert!(!connection.in_transaction());

        let inserted = connection
            .execute(
                "INSERT INTO t (id, name) VALUES (?, ?), (?, ?)",
                &[
                    Value::Int64(Some(1)),
                    Value::Varchar(Some("one".into())),
                    Value::Int32(Some(2)),
                    Value::Null,
                ],
            )
            .unwrap();
        assert_eq!(inserted.rows_affected, 2);
        connection.rollback().unwrap();
        let rows = connection.query("SELECT COUNT(*) FROM t", &[], None, None).unwrap();
        assert_eq!(rows[0].values()[0], Value::Int64(Some(0)));

        connection
            .execute(
                "INSERT INTO t (id, name) VALUES (?, ?), (?, ?), (?, ?)",
                &[
                    Value::Int64(Some(1)),
                    Value::Varchar(Some("one".into())),
                    Value::Int64(Some(2)),
                    Value::Varchar(Some("two".into())),
                    Value::Int64(Some(3)),
                    Value::Null,
                ],
            )
            .unwrap();
        connection.commit().unwrap();
        let rows = connection
            .query("SELECT id, name FROM t ORDER BY id", &[], Some(2), None)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].names(), ["id", "name"]);
        assert_eq!(rows[1].get("NAME"), Some(&Value::Varchar(Some("two".into()))));

        silent_logs! {
            assert!(connection.query("SELECT * FROM missing", &[], None, None).is_err());
            assert!(connection.execute("SELECT 1; SELECT 2", &[]).is_err());
            assert!(connection.execute("DELETE FROM t WHERE id=?", &[]).is_err());
        }
        connection.rollback().unwrap();
        Box::new(connection).close().unwrap();
    }
}
