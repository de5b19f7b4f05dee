//! Rendering tests for the query builder.

use super::*;
use crate::executor::Offline;
use crate::sql::count_placeholders;

fn db() -> Offline {
    Offline
}

#[test]
fn select_defaults_to_star() {
    let db = db();
    let qb = db.table("users");
    assert_eq!(qb.to_sql().unwrap(), "SELECT * FROM users");
    assert!(qb.bindings().unwrap().is_empty());
}

#[test]
fn missing_table_is_a_query_error() {
    let db = db();
    let err = QueryBuilder::new(&db).select("id").render().unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));
}

#[test]
fn single_where() {
    let db = db();
    let qb = db.table("users").where_("email", "a@b.com");
    assert_eq!(qb.to_sql().unwrap(), "SELECT * FROM users WHERE email = ?");
    assert_eq!(qb.bindings().unwrap(), vec![Value::from("a@b.com")]);
}

#[test]
fn second_where_is_promoted_to_and() {
    let db = db();
    let qb = db
        .table("students")
        .where_("class_id", 3)
        .where_("status", "active");
    assert_eq!(
        qb.to_sql().unwrap(),
        "SELECT * FROM students WHERE class_id = ? AND status = ?"
    );
    assert_eq!(
        qb.bindings().unwrap(),
        vec![Value::Int(3), Value::from("active")]
    );
}

#[test]
fn and_or_chain_keeps_binding_order() {
    let db = db();
    let qb = db
        .table("users")
        .where_op("age", Op::Gte, 18)
        .and_where("role", "student")
        .or_where_op("role", Op::Ne, "guest");
    let statement = qb.render().unwrap();
    assert_eq!(
        statement.sql(),
        "SELECT * FROM users WHERE age >= ? AND role = ? OR role != ?"
    );
    assert_eq!(
        statement.params(),
        &[Value::Int(18), Value::from("student"), Value::from("guest")]
    );
}

#[test]
fn or_where_without_predicate_acts_as_where() {
    let db = db();
    let qb = db.table("users").or_where("id", 1);
    assert_eq!(qb.to_sql().unwrap(), "SELECT * FROM users WHERE id = ?");
}

#[test]
fn and_where_without_predicate_acts_as_where() {
    let db = db();
    let qb = db.table("users").and_where("id", 1);
    assert_eq!(qb.to_sql().unwrap(), "SELECT * FROM users WHERE id = ?");
}

#[test]
fn buckets_render_in_sql_order_whatever_the_call_order() {
    let db = db();
    let scrambled = db
        .table("students")
        .limit(10)
        .order_by_desc("students.created_at")
        .where_("students.class_id", 2)
        .inner_join("users", "users.id", Op::Eq, "students.user_id")
        .offset(20)
        .select("students.id, users.name");
    let ordered = db
        .table("students")
        .select("students.id, users.name")
        .inner_join("users", "users.id", Op::Eq, "students.user_id")
        .where_("students.class_id", 2)
        .order_by_desc("students.created_at")
        .limit(10)
        .offset(20);

    let expected = "SELECT students.id, users.name FROM students \
        INNER JOIN users ON users.id = students.user_id \
        WHERE students.class_id = ? \
        ORDER BY students.created_at DESC LIMIT 10 OFFSET 20";
    assert_eq!(scrambled.to_sql().unwrap(), expected);
    assert_eq!(ordered.render().unwrap(), scrambled.render().unwrap());
}

#[test]
fn group_by_and_having() {
    let db = db();
    let qb = db
        .table("attendance")
        .select("student_id, COUNT(*) AS absences")
        .where_("status", "absent")
        .group_by("student_id")
        .having("COUNT(*)", Op::Gt, 3)
        .order_by("absences", Direction::Desc);
    let statement = qb.render().unwrap();
    assert_eq!(
        statement.sql(),
        "SELECT student_id, COUNT(*) AS absences FROM attendance WHERE status = ? \
         GROUP BY student_id HAVING COUNT(*) > ? ORDER BY absences DESC"
    );
    assert_eq!(statement.params(), &[Value::from("absent"), Value::Int(3)]);
}

#[test]
fn left_and_right_joins() {
    let db = db();
    let sql = db
        .table("classes")
        .left_join("teachers", "teachers.id", Op::Eq, "classes.teacher_id")
        .right_join("rooms", "rooms.id", Op::Eq, "classes.room_id")
        .join("terms", "terms.id", Op::Eq, "classes.term_id", JoinKind::Full)
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM classes \
         LEFT JOIN teachers ON teachers.id = classes.teacher_id \
         RIGHT JOIN rooms ON rooms.id = classes.room_id \
         FULL JOIN terms ON terms.id = classes.term_id"
    );
}

#[test]
fn values_renders_insert_in_data_order() {
    let db = db();
    let statement = db.table("t").values([("a", 1), ("b", 2)]).render().unwrap();
    assert_eq!(statement.sql(), "INSERT INTO t (a, b) VALUES (?, ?)");
    assert_eq!(statement.params(), &[Value::Int(1), Value::Int(2)]);
}

#[test]
fn empty_insert_is_rejected() {
    let db = db();
    let empty: Vec<(&str, Value)> = Vec::new();
    assert!(db.table("t").values(empty).render().is_err());
}

#[test]
fn update_binds_set_values_before_where() {
    let db = db();
    let expected_sql = "UPDATE users SET name = ?, email = ? WHERE id = ?";
    let expected_params = vec![Value::from("Ada"), Value::from("ada@example.com"), Value::Int(7)];

    let update_first = db
        .table("users")
        .update([("name", "Ada"), ("email", "ada@example.com")])
        .where_("id", 7);
    let where_first = db
        .table("users")
        .where_("id", 7)
        .update([("name", "Ada"), ("email", "ada@example.com")]);

    for qb in [update_first, where_first] {
        assert_eq!(qb.to_sql().unwrap(), expected_sql);
        assert_eq!(qb.bindings().unwrap(), expected_params);
    }
}

#[test]
fn update_rejects_select_only_clauses() {
    let db = db();
    let err = db
        .table("users")
        .update([("name", "x")])
        .order_by_asc("id")
        .render()
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));
}

#[test]
fn delete_requires_predicate_or_confirmation() {
    let db = db();
    assert!(db.table("sessions").delete().render().is_err());

    let all = db.table("sessions").delete().allow_delete_all();
    assert_eq!(all.to_sql().unwrap(), "DELETE FROM sessions");

    let one = db.table("sessions").delete().where_("id", 5);
    assert_eq!(one.to_sql().unwrap(), "DELETE FROM sessions WHERE id = ?");
}

#[test]
fn null_and_in_predicates() {
    let db = db();
    let qb = db
        .table("students")
        .where_null("deleted_at")
        .where_in("class_id", [1, 2, 3])
        .where_not_null("guardian_id");
    assert_eq!(
        qb.to_sql().unwrap(),
        "SELECT * FROM students WHERE deleted_at IS NULL AND class_id IN (?, ?, ?) \
         AND guardian_id IS NOT NULL"
    );
    assert_eq!(qb.bindings().unwrap().len(), 3);

    let none = db.table("students").where_in("id", Vec::<i64>::new());
    assert_eq!(none.to_sql().unwrap(), "SELECT * FROM students WHERE 1=0");
}

#[test]
fn where_any_groups_columns() {
    let db = db();
    let qb = db
        .table("students")
        .where_("status", "active")
        .where_any(&["first_name", "last_name"], Op::Ilike, "%ann%");
    assert_eq!(
        qb.to_sql().unwrap(),
        "SELECT * FROM students WHERE status = ? AND (first_name ILIKE ? OR last_name ILIKE ?)"
    );
    assert_eq!(
        qb.bindings().unwrap(),
        vec![Value::from("active"), Value::from("%ann%"), Value::from("%ann%")]
    );
}

#[test]
fn paginate_is_one_based_and_clamped() {
    let db = db();
    assert_eq!(
        db.table("users").paginate(3, 25).to_sql().unwrap(),
        "SELECT * FROM users LIMIT 25 OFFSET 50"
    );
    assert_eq!(
        db.table("users").paginate(0, 0).to_sql().unwrap(),
        "SELECT * FROM users LIMIT 1 OFFSET 0"
    );
}

#[test]
fn count_wraps_the_whole_select() {
    let db = db();
    let qb = db
        .table("results")
        .select("student_id")
        .where_("term", "T1")
        .group_by("student_id")
        .limit(5);
    let statement = qb.count_statement().unwrap();
    assert_eq!(
        statement.sql(),
        "SELECT COUNT(*) FROM (SELECT student_id FROM results WHERE term = ? \
         GROUP BY student_id LIMIT 5) AS counted"
    );
    assert_eq!(statement.params(), &[Value::from("T1")]);
}

#[test]
fn count_requires_select() {
    let db = db();
    assert!(db.table("users").delete().where_("id", 1).count_statement().is_err());
}

#[test]
fn placeholders_match_bindings_for_mixed_chains() {
    let db = db();
    let chains = vec![
        db.table("a").where_("x", 1).or_where("y", 2).limit(3),
        db.table("a")
            .inner_join("b", "b.a_id", Op::Eq, "a.id")
            .where_op("b.v", Op::Like, "%q%")
            .and_where("a.k", true)
            .order_by_asc("a.id"),
        db.table("a")
            .group_by("a.k")
            .having("SUM(a.v)", Op::Lt, 10)
            .having("COUNT(*)", Op::Gte, 2)
            .where_in("a.k", ["p", "q"]),
        db.table("a").update([("v", 1), ("w", 2)]).where_("id", 9).or_where("id", 10),
    ];
    for qb in chains {
        let statement = qb.render().unwrap();
        assert_eq!(count_placeholders(statement.sql()), statement.params().len());
    }
}

#[test]
fn statement_new_checks_placeholders() {
    assert!(Statement::new("SELECT * FROM t WHERE a = ?", vec![]).is_err());
    assert!(Statement::new("SELECT '?' FROM t", vec![]).is_ok());
    let statement = Statement::new("UPDATE t SET a = ? WHERE b = ?", vec![1.into(), 2.into()]).unwrap();
    assert_eq!(statement.verb(), "UPDATE");
}

#[test]
fn rendering_twice_is_stable() {
    let db = db();
    let qb = db.table("users").where_("id", 1).limit(1);
    assert_eq!(qb.render().unwrap(), qb.render().unwrap());
    let cloned = qb.clone().where_("active", true);
    assert_eq!(qb.bindings().unwrap().len(), 1);
    assert_eq!(cloned.bindings().unwrap().len(), 2);
}

#[tokio::test]
async fn offline_terminal_calls_fail_with_connection_error() {
    let db = db();
    let qb = db.table("users");
    assert!(matches!(qb.get().await, Err(DbError::Connection(_))));
    assert!(matches!(qb.count().await, Err(DbError::Connection(_))));
    assert!(matches!(qb.first().await, Err(DbError::Connection(_))));
}

#[tokio::test]
async fn get_on_update_chain_is_rejected() {
    let db = db();
    let err = db
        .table("users")
        .update([("a", 1)])
        .get()
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));
}
