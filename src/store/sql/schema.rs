use crate::migrate::{Migration, SqlMigration};

/// The ordered migration list for the relational store. Versions are list
/// positions, so new migrations are only ever appended.
pub fn schema_migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(SqlMigration {
            name: "create_role_table",
            up: r#"
            CREATE TABLE role (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL UNIQUE
            );
            "#,
            down: "DROP TABLE role;",
        }),
        Box::new(SqlMigration {
            name: "create_action_and_permission_tables",
            up: r#"
            CREATE TABLE action (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE permission (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                role_id INTEGER NOT NULL REFERENCES role(id) ON DELETE CASCADE,
                action_id INTEGER NOT NULL REFERENCES action(id),
                resource_pattern TEXT NOT NULL
            );

            CREATE INDEX idx_permission_role ON permission(role_id);
            "#,
            down: r#"
            DROP TABLE permission;
            DROP TABLE action;
            "#,
        }),
        Box::new(SqlMigration {
            name: "create_assignment_table",
            up: r#"
            CREATE TABLE assignment (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                role_id INTEGER NOT NULL REFERENCES role(id) ON DELETE CASCADE,
                actor_id TEXT NOT NULL,
                actor_namespace TEXT NOT NULL,
                UNIQUE (role_id, actor_id, actor_namespace)
            );
            "#,
            down: "DROP TABLE assignment;",
        }),
        Box::new(SqlMigration {
            name: "create_group_assignment_table",
            up: r#"
            CREATE TABLE group_assignment (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                role_id INTEGER NOT NULL REFERENCES role(id) ON DELETE CASCADE,
                group_id TEXT NOT NULL,
                UNIQUE (role_id, group_id)
            );
            "#,
            down: "DROP TABLE group_assignment;",
        }),
        Box::new(SqlMigration {
            name: "create_principal_tables",
            up: r#"
            CREATE TABLE actor (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                actor_id TEXT NOT NULL,
                namespace TEXT NOT NULL,
                UNIQUE (actor_id, namespace)
            );

            CREATE TABLE principal_group (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                group_id TEXT NOT NULL UNIQUE
            );

            INSERT OR IGNORE INTO actor (uuid, actor_id, namespace)
            SELECT lower(hex(randomblob(16))), actor_id, actor_namespace
            FROM assignment GROUP BY actor_id, actor_namespace;

            INSERT OR IGNORE INTO principal_group (uuid, group_id)
            SELECT lower(hex(randomblob(16))), group_id
            FROM group_assignment GROUP BY group_id;
            "#,
            down: r#"
            DROP TABLE principal_group;
            DROP TABLE actor;
            "#,
        }),
        // Drops duplicate grants left by earlier revisions before the unique
        // index can be created.
        Box::new(SqlMigration {
            name: "add_permission_uniqueness",
            up: r#"
            DELETE FROM permission WHERE id NOT IN (
                SELECT MIN(id) FROM permission
                GROUP BY role_id, action_id, resource_pattern
            );

            CREATE UNIQUE INDEX idx_permission_grant
                ON permission(role_id, action_id, resource_pattern);
            "#,
            down: "DROP INDEX idx_permission_grant;",
        }),
        Box::new(SqlMigration {
            name: "add_lookup_indexes",
            up: r#"
            CREATE INDEX idx_assignment_actor ON assignment(actor_id, actor_namespace);
            CREATE INDEX idx_group_assignment_group ON group_assignment(group_id);
            CREATE INDEX idx_permission_action ON permission(action_id, resource_pattern);
            "#,
            down: r#"
            DROP INDEX idx_permission_action;
            DROP INDEX idx_group_assignment_group;
            DROP INDEX idx_assignment_actor;
            "#,
        }),
    ]
}
