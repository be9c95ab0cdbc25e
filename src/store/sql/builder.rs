use rusqlite::types::Value;

/// Composable SELECT statement. Joins and predicates are appended in order,
/// and every `?` placeholder has its value pushed alongside it.
pub struct Select {
    fields: Vec<&'static str>,
    table: &'static str,

    joins: Vec<&'static str>,
    wheres: Vec<String>,

    order_by: Vec<&'static str>,

    values: Vec<Value>,

    distinct: bool,
    count: bool,
}

impl Select {
    pub fn new(fields: Vec<&'static str>, table: &'static str) -> Self {
        Self {
            fields,
            table,
            joins: Vec::new(),
            wheres: Vec::new(),
            order_by: Vec::new(),
            values: Vec::new(),
            distinct: false,
            count: false,
        }
    }

    pub fn count(table: &'static str) -> Self {
        Self {
            fields: vec!["COUNT(1)"],
            table,
            joins: Vec::new(),
            wheres: Vec::new(),
            order_by: Vec::new(),
            values: Vec::new(),
            distinct: false,
            count: true,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn add_join(&mut self, s: &'static str) {
        self.joins.push(s);
    }

    pub fn add_order_by(&mut self, s: &'static str) {
        if self.count {
            return;
        }
        self.order_by.push(s);
    }

    pub fn add_where(&mut self, s: impl ToString, value: Value) {
        self.wheres.push(s.to_string());
        self.values.push(value);
    }

    /// Adds `field IN (?, ?, ...)`. An empty list matches nothing.
    pub fn add_where_in(&mut self, field: &'static str, values: Vec<Value>) {
        if values.is_empty() {
            self.wheres.push(String::from("1 = 0"));
            return;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.wheres.push(format!("{field} IN ({placeholders})"));
        self.values.extend(values);
    }

    pub fn build(self) -> (String, Vec<Value>) {
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        let mut sql = format!(
            "SELECT {distinct}{} FROM {}",
            self.fields.join(", "),
            self.table
        );

        for join in self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        if !self.wheres.is_empty() {
            let where_clause = self.wheres.join(" AND ");
            sql.push_str(&format!(" WHERE {}", where_clause));
        }

        if !self.order_by.is_empty() {
            let order_by = self.order_by.join(", ");
            sql.push_str(&format!(" ORDER BY {}", order_by));
        }

        (sql, self.values)
    }
}

pub struct Insert {
    table: &'static str,

    fields: Vec<&'static str>,
    values: Vec<Value>,

    or_ignore: bool,
}

impl Insert {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            fields: Vec::new(),
            values: Vec::new(),
            or_ignore: false,
        }
    }

    /// Silently skips rows that would violate a uniqueness constraint.
    pub fn or_ignore(mut self) -> Self {
        self.or_ignore = true;
        self
    }

    pub fn add_field(&mut self, field: &'static str, value: Value) {
        self.fields.push(field);
        self.values.push(value);
    }

    pub fn build(self) -> (String, Vec<Value>) {
        let verb = if self.or_ignore {
            "INSERT OR IGNORE"
        } else {
            "INSERT"
        };
        let placeholders = vec!["?"; self.fields.len()].join(", ");
        let sql = format!(
            "{verb} INTO {} ({}) VALUES ({placeholders})",
            self.table,
            self.fields.join(", ")
        );
        (sql, self.values)
    }
}

pub struct Delete {
    table: &'static str,

    wheres: Vec<String>,
    values: Vec<Value>,
}

impl Delete {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            wheres: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn add_where(&mut self, s: impl ToString, value: Value) {
        self.wheres.push(s.to_string());
        self.values.push(value);
    }

    pub fn build(self) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", self.table);
        if !self.wheres.is_empty() {
            let where_clause = self.wheres.join(" AND ");
            sql.push_str(&format!(" WHERE {}", where_clause));
        }
        (sql, self.values)
    }
}

pub fn text(s: impl Into<String>) -> Value {
    Value::Text(s.into())
}
