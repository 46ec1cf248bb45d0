//! Warehouse addressing types

use std::fmt;

/// A dataset inside a project
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetRef {
    /// Project (DuckDB catalog)
    pub project: String,
    /// Dataset (DuckDB schema)
    pub dataset: String,
}

impl DatasetRef {
    /// Create a dataset reference
    pub fn new(project: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
        }
    }

    /// Reference a table of this dataset
    pub fn table(&self, table: impl Into<String>) -> TableRef {
        TableRef {
            project: self.project.clone(),
            dataset: self.dataset.clone(),
            table: table.into(),
        }
    }

    /// Quoted `"project"."dataset"` identifier for SQL
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.project), quote_ident(&self.dataset))
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.dataset)
    }
}

/// A fully qualified table, displayed as `project.dataset.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    /// Project (DuckDB catalog)
    pub project: String,
    /// Dataset (DuckDB schema)
    pub dataset: String,
    /// Table name
    pub table: String,
}

impl TableRef {
    /// Create a table reference
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Dataset holding the table
    pub fn dataset_ref(&self) -> DatasetRef {
        DatasetRef::new(self.project.clone(), self.dataset.clone())
    }

    /// Quoted `"project"."dataset"."table"` identifier for SQL
    pub fn qualified(&self) -> String {
        format!(
            "{}.{}.{}",
            quote_ident(&self.project),
            quote_ident(&self.dataset),
            quote_ident(&self.table)
        )
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Quote an SQL identifier
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
